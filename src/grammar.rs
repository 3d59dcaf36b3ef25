//! Lexical predicates for statement text
//!
//! Date and amount grammars plus the keyword tables used for header,
//! footer and boilerplate recognition. Everything here is a pure function of
//! its input; supporting a new statement layout means extending a table.

use once_cell::sync::Lazy;
use regex::Regex;

const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

fn date_body() -> String {
    format!(
        r"(?:\d{{1,2}}[-/]\d{{1,2}}[-/]\d{{4}}|\d{{4}}[-/]\d{{1,2}}[-/]\d{{1,2}}|\d{{1,2}}[-/ ]{MONTH}[-/ ]\d{{4}})"
    )
}

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^{}$", date_body())).expect("date grammar is a valid regex")
});

static DATE_SEARCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b{}\b", date_body())).expect("date grammar is a valid regex")
});

// Western (15,000.00) and Indian (1,00,000.00) grouping, optional Cr/Dr marker
static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^-?(?:\d{1,3}(?:,\d{2,3})+|\d+)(?:\.\d{1,2})?(?:\s*(?:cr|dr)\.?)?$")
        .expect("amount grammar is a valid regex")
});

static PAGE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bpage\s*(?:no\.?\s*)?\d+").expect("page regex is valid"));

static TOTAL_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:grand\s+|sub\s*)?total\b").expect("total regex is valid"));

/// Keywords that name statement columns (substring match)
pub const HEADER_KEYWORDS: &[&str] = &[
    "date",
    "description",
    "particulars",
    "narration",
    "details",
    "debit",
    "credit",
    "withdrawal",
    "deposit",
    "balance",
    "amount",
    "reference",
    "cheque",
    "transaction",
    "remarks",
    "value",
    "posting",
];

/// Abbreviated header keywords (whole-word match only)
pub const HEADER_ABBREVIATIONS: &[&str] = &["dr", "cr", "ref", "chq", "txn", "amt", "dt"];

/// Rows containing these are never transactions
pub const FOOTER_PATTERNS: &[&str] = &[
    "end of statement",
    "closing balance",
    "opening balance",
    "total debit",
    "total credit",
    "total withdrawal",
    "total deposit",
    "brought forward",
    "carried forward",
    "continued",
    "thank you",
    "regards",
    "signature",
    "terms and conditions",
    "account summary",
];

/// Account metadata terms; only boilerplate when the row is not transaction-shaped
pub const METADATA_PATTERNS: &[&str] = &["ifsc", "branch", "customer", "address"];

/// Transactions whose text matches these are statement metadata
pub const BOILERPLATE_PATTERNS: &[&str] = &[
    "opening balance",
    "closing balance",
    "statement of account",
    "statement period",
    "statement date",
    "account summary",
    "account number",
    "account no",
    "brought forward",
    "carried forward",
];

/// Rows that state the balance the statement starts from
pub const OPENING_BALANCE_PATTERNS: &[&str] =
    &["opening balance", "brought forward", "balance b/f", "balance forward"];

pub const DATE_LABELS: &[&str] = &["date", "txn date", "value date"];
pub const DATE_LABEL_ABBREVIATIONS: &[&str] = &["dt"];
pub const DEBIT_LABELS: &[&str] = &["debit", "withdrawal"];
pub const CREDIT_LABELS: &[&str] = &["credit", "deposit"];
pub const BALANCE_LABELS: &[&str] = &["balance"];
pub const AMOUNT_LABELS: &[&str] = &["amount"];
pub const DEBIT_ABBREVIATIONS: &[&str] = &["dr"];
pub const CREDIT_ABBREVIATIONS: &[&str] = &["cr"];
pub const AMOUNT_ABBREVIATIONS: &[&str] = &["amt"];

/// Footer classification of a row's lowercase text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterMatch {
    None,
    /// Account metadata (branch, address, ...)
    Metadata,
    /// Totals, closing lines, disclaimers, page furniture
    Strict,
}

/// Check if a string is exactly one date in an accepted form
pub fn is_date(s: &str) -> bool {
    DATE_RE.is_match(s.trim())
}

/// Check if a date appears anywhere in the string
pub fn contains_date(s: &str) -> bool {
    DATE_SEARCH_RE.is_match(s)
}

/// Byte range of the first date in the string
pub fn find_date(s: &str) -> Option<(usize, usize)> {
    DATE_SEARCH_RE.find(s).map(|m| (m.start(), m.end()))
}

/// Check if a string is exactly one amount. Dates are never amounts.
pub fn is_amount(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty() && AMOUNT_RE.is_match(s) && !is_date(s)
}

/// Check if the string is an amount or has an amount token in it
pub fn contains_amount(s: &str) -> bool {
    is_amount(s) || amount_tokens(s).next().is_some()
}

/// Amount tokens of a cell, in order
pub fn amount_tokens(s: &str) -> impl Iterator<Item = &str> {
    s.split_whitespace().filter(|t| is_amount(t))
}

/// An amount with an explicit fraction (`500.00`), as opposed to a bare
/// integer that could be a reference number
pub fn is_monetary(s: &str) -> bool {
    is_amount(s) && s.contains('.')
}

/// Numeric value of an amount token, `None` when it isn't one
pub fn parse_amount(s: &str) -> Option<f64> {
    if !is_amount(s) {
        return None;
    }
    let lower = s.trim().to_lowercase();
    let digits: String = lower
        .trim_end_matches('.')
        .trim_end_matches("cr")
        .trim_end_matches("dr")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    digits.parse().ok()
}

/// Check for a whole word in lowercase text
pub fn has_word(lower: &str, word: &str) -> bool {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

/// Check if lowercase text names a column
pub fn is_header_keyword(lower: &str) -> bool {
    HEADER_KEYWORDS.iter().any(|kw| lower.contains(kw))
        || HEADER_ABBREVIATIONS.iter().any(|kw| has_word(lower, kw))
}

/// Classify lowercase row text against the footer tables
pub fn footer_match(lower: &str) -> FooterMatch {
    if FOOTER_PATTERNS.iter().any(|p| lower.contains(p)) || PAGE_NUMBER_RE.is_match(lower) {
        FooterMatch::Strict
    } else if METADATA_PATTERNS.iter().any(|p| lower.contains(p)) {
        FooterMatch::Metadata
    } else {
        FooterMatch::None
    }
}

/// Check if lowercase transaction text is statement metadata
pub fn is_boilerplate(lower: &str) -> bool {
    BOILERPLATE_PATTERNS.iter().any(|p| lower.contains(p)) || TOTAL_PREFIX_RE.is_match(lower)
}

/// Check if lowercase row text announces the starting balance
pub fn is_opening_balance(lower: &str) -> bool {
    OPENING_BALANCE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Check if lowercase row text is a strict footer
pub fn is_strict_footer(lower: &str) -> bool {
    footer_match(lower) == FooterMatch::Strict
}

/// Opening-balance row with no closing or totals marker on the same line
pub fn is_opening_balance_only(lower: &str) -> bool {
    is_opening_balance(lower)
        && !FOOTER_PATTERNS
            .iter()
            .filter(|p| !OPENING_BALANCE_PATTERNS.contains(*p))
            .any(|p| lower.contains(p))
        && !PAGE_NUMBER_RE.is_match(lower)
}
