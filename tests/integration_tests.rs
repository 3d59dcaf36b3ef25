//! Integration tests for statement extraction

use statement_inspector::{
    convert_pdf, convert_pdf_mem, extract_fragments, ColumnType, ConversionResponse, PageFragments,
    ParseOptions, PositionedFragment, StatementError, StatementParser, Transaction,
};
use std::io::Write;

// Helper to create test fragments
fn frag(text: &str, x: f32, y: f32) -> PositionedFragment {
    PositionedFragment::new(text, x, y, text.len() as f32 * 5.0, 10.0)
}

fn header(y: f32) -> Vec<PositionedFragment> {
    vec![
        frag("Date", 0.0, y),
        frag("Description", 80.0, y),
        frag("Withdrawal", 220.0, y),
        frag("Deposit", 300.0, y),
        frag("Balance", 380.0, y),
    ]
}

fn page(number: u32, fragments: Vec<PositionedFragment>) -> PageFragments {
    PageFragments::new(number, fragments)
}

fn parse(pages: &[PageFragments]) -> Result<statement_inspector::ConversionResult, StatementError> {
    StatementParser::default().parse_document(pages)
}

fn field<'a>(txn: &'a Transaction, label: &str) -> &'a str {
    txn.get(label).unwrap_or_else(|| panic!("missing field {}", label))
}

// ============================================================================
// Merge / Boundary Tests
// ============================================================================

#[test]
fn test_wrapped_description_is_merged() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("Salary", 80.0, 680.0),
        frag("5,000.00", 300.0, 680.0),
        frag("15,000.00", 380.0, 680.0),
        frag("credit", 80.0, 668.0),
    ]);

    let result = parse(&[page(1, fragments)]).unwrap();
    assert_eq!(result.transactions.len(), 1);
    let txn = &result.transactions[0];
    assert_eq!(field(txn, "Date"), "01/02/2024");
    assert_eq!(field(txn, "Description"), "Salary credit");
    assert_eq!(field(txn, "Withdrawal"), "");
    assert_eq!(field(txn, "Deposit"), "5,000.00");
    assert_eq!(field(txn, "Balance"), "15,000.00");
}

#[test]
fn test_next_entry_is_not_merged() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("Salary", 80.0, 680.0),
        frag("5,000.00", 300.0, 680.0),
        frag("15,000.00", 380.0, 680.0),
        frag("02/02/2024", 0.0, 668.0),
        frag("ATM", 80.0, 668.0),
        frag("500.00", 220.0, 668.0),
        frag("14,500.00", 380.0, 668.0),
    ]);

    let result = parse(&[page(1, fragments)]).unwrap();
    assert_eq!(result.transactions.len(), 2);
    assert_eq!(field(&result.transactions[0], "Description"), "Salary");
    assert_eq!(field(&result.transactions[1], "Description"), "ATM");
    assert_eq!(field(&result.transactions[1], "Withdrawal"), "500.00");
}

#[test]
fn test_multiple_continuation_lines() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("03/02/2024", 0.0, 680.0),
        frag("NEFT", 80.0, 680.0),
        frag("1,200.00", 220.0, 680.0),
        frag("13,300.00", 380.0, 680.0),
        frag("ACME SUPPLIES", 80.0, 668.0),
        frag("REF 99812", 80.0, 656.0),
    ]);

    let result = parse(&[page(1, fragments)]).unwrap();
    assert_eq!(result.transactions.len(), 1);
    assert_eq!(
        field(&result.transactions[0], "Description"),
        "NEFT ACME SUPPLIES REF 99812"
    );
}

// ============================================================================
// Footer Tests
// ============================================================================

#[test]
fn test_footer_truncates_page() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("ATM", 80.0, 680.0),
        frag("500.00", 220.0, 680.0),
        frag("Closing Balance", 80.0, 668.0),
        frag("14,500.00", 380.0, 668.0),
        frag("02/02/2024", 0.0, 656.0),
        frag("Interest", 80.0, 656.0),
        frag("12.00", 300.0, 656.0),
    ]);

    let result = parse(&[page(1, fragments)]).unwrap();
    assert_eq!(result.transactions.len(), 1);
    assert_eq!(field(&result.transactions[0], "Description"), "ATM");
}

#[test]
fn test_footer_only_ends_its_own_page() {
    let mut first = header(700.0);
    first.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("ATM", 80.0, 680.0),
        frag("500.00", 220.0, 680.0),
        frag("Page 1 of 2", 0.0, 40.0),
    ]);
    let second = vec![
        frag("02/02/2024", 0.0, 760.0),
        frag("Rent", 80.0, 760.0),
        frag("900.00", 220.0, 760.0),
    ];

    let result = parse(&[page(1, first), page(2, second)]).unwrap();
    assert_eq!(result.transactions.len(), 2);
    assert_eq!(result.pages[1].transactions.len(), 1);
}

#[test]
fn test_totals_label_row_truncates_page() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("Salary", 80.0, 680.0),
        frag("5,000.00", 300.0, 680.0),
        frag("Opening Balance", 0.0, 668.0),
        frag("Total Debits", 220.0, 668.0),
        frag("Closing Balance", 380.0, 668.0),
        frag("02/02/2024", 0.0, 656.0),
        frag("ATM", 80.0, 656.0),
        frag("500.00", 220.0, 656.0),
    ]);

    let result = parse(&[page(1, fragments)]).unwrap();
    assert_eq!(result.transactions.len(), 1);
    assert_eq!(field(&result.transactions[0], "Description"), "Salary");
}

#[test]
fn test_closing_balance_before_first_entry_truncates_page() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("Closing Balance", 80.0, 680.0),
        frag("14,500.00", 380.0, 680.0),
        frag("01/02/2024", 0.0, 668.0),
        frag("ATM", 80.0, 668.0),
        frag("500.00", 220.0, 668.0),
    ]);

    assert!(matches!(
        parse(&[page(1, fragments)]),
        Err(StatementError::NoTransactionsFound)
    ));
}

#[test]
fn test_summary_block_above_header_is_not_the_header() {
    let fragments = vec![
        frag("Opening Balance", 0.0, 760.0),
        frag("Total Debits", 120.0, 760.0),
        frag("Total Credits", 240.0, 760.0),
        frag("Closing Balance", 360.0, 760.0),
        frag("10,000.00", 0.0, 748.0),
        frag("500.00", 120.0, 748.0),
        frag("5,000.00", 240.0, 748.0),
        frag("14,500.00", 360.0, 748.0),
        frag("Date", 0.0, 700.0),
        frag("Narration", 80.0, 700.0),
        frag("Amount", 260.0, 700.0),
        frag("Balance", 360.0, 700.0),
        frag("01/02/2024", 0.0, 680.0),
        frag("ATM", 80.0, 680.0),
        frag("500.00", 260.0, 680.0),
        frag("9,500.00", 360.0, 680.0),
    ];

    let result = parse(&[page(1, fragments)]).unwrap();
    assert_eq!(result.headers, vec!["Date", "Narration", "Amount", "Balance"]);
    assert_eq!(result.transactions.len(), 1);
    assert_eq!(field(&result.transactions[0], "Narration"), "ATM");
}

// ============================================================================
// Page Handling Tests
// ============================================================================

#[test]
fn test_empty_page_contributes_nothing() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("ATM", 80.0, 680.0),
        frag("500.00", 220.0, 680.0),
    ]);

    let result = parse(&[page(1, fragments), page(2, Vec::new())]).unwrap();
    assert_eq!(result.pages.len(), 2);
    assert_eq!(result.pages[1].page_number, 2);
    assert!(result.pages[1].transactions.is_empty());
    assert_eq!(result.transactions.len(), 1);
}

#[test]
fn test_repeated_boundary_row_deduplicated() {
    let mut first = header(700.0);
    first.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("ATM", 80.0, 680.0),
        frag("500.00", 220.0, 680.0),
        frag("14,500.00", 380.0, 680.0),
    ]);
    let mut second = header(760.0);
    second.extend([
        frag("01/02/2024", 0.0, 740.0),
        frag("ATM", 80.0, 740.0),
        frag("500.00", 220.0, 740.0),
        frag("14,500.00", 380.0, 740.0),
        frag("02/02/2024", 0.0, 728.0),
        frag("Rent", 80.0, 728.0),
        frag("900.00", 220.0, 728.0),
        frag("13,600.00", 380.0, 728.0),
    ]);

    let result = parse(&[page(1, first), page(2, second)]).unwrap();
    assert_eq!(result.transactions.len(), 2);
    assert_eq!(result.pages[0].transactions.len(), 1);
    assert_eq!(result.pages[1].transactions.len(), 1);
    assert_eq!(field(&result.pages[1].transactions[0], "Description"), "Rent");
}

#[test]
fn test_header_found_on_later_page() {
    let cover = vec![frag("Statement of Account", 0.0, 760.0)];
    let mut fragments = header(700.0);
    fragments.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("ATM", 80.0, 680.0),
        frag("500.00", 220.0, 680.0),
    ]);

    let result = parse(&[page(1, cover), page(2, fragments)]).unwrap();
    assert!(result.pages[0].transactions.is_empty());
    assert_eq!(result.pages[1].transactions.len(), 1);
}

#[test]
fn test_parse_is_idempotent() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("Salary", 80.0, 680.0),
        frag("5,000.00", 300.0, 680.0),
        frag("02/02/2024", 0.0, 668.0),
        frag("ATM", 80.0, 668.0),
        frag("500.00", 220.0, 668.0),
    ]);
    let pages = vec![page(1, fragments)];

    let parser = StatementParser::default();
    let first = parser.parse_document(&pages).unwrap();
    let second = parser.parse_document(&pages).unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Column Inference Tests
// ============================================================================

#[test]
fn test_columns_inferred_without_header() {
    let fragments = vec![
        frag("01/02/2024", 0.0, 700.0),
        frag("ATM", 80.0, 700.0),
        frag("500.00", 300.0, 700.0),
        frag("02/02/2024", 0.0, 688.0),
        frag("Rent", 80.0, 688.0),
        frag("900.00", 300.0, 688.0),
        frag("03/02/2024", 0.0, 676.0),
        frag("Salary", 80.0, 676.0),
        frag("5,000.00", 300.0, 676.0),
    ];

    let result = parse(&[page(1, fragments)]).unwrap();
    assert_eq!(result.headers, vec!["Column 1", "Column 2", "Column 3"]);
    assert_eq!(result.column_types["Column 1"], ColumnType::Date);
    assert_eq!(result.column_types["Column 2"], ColumnType::Text);
    assert_eq!(result.column_types["Column 3"], ColumnType::Amount);
    assert_eq!(result.transactions.len(), 3);
    assert_eq!(field(&result.transactions[1], "Column 2"), "Rent");
}

#[test]
fn test_column_types_from_header() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("ATM", 80.0, 680.0),
        frag("500.00", 220.0, 680.0),
    ]);

    let result = parse(&[page(1, fragments)]).unwrap();
    let types: Vec<ColumnType> = result.column_types.values().copied().collect();
    assert_eq!(
        types,
        vec![
            ColumnType::Date,
            ColumnType::Text,
            ColumnType::Amount,
            ColumnType::Amount,
            ColumnType::Amount
        ]
    );
}

#[test]
fn test_no_structure_is_reported() {
    let fragments = vec![frag("Dear customer,", 0.0, 700.0), frag("Welcome", 0.0, 680.0)];
    let response =
        ConversionResponse::from_result("letter.pdf", parse(&[page(1, fragments)]));
    assert!(!response.success);
    assert!(response.data.is_empty());
    assert!(response.error.is_some());
}

// ============================================================================
// Options Tests
// ============================================================================

#[test]
fn test_continuation_limit_from_options() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("NEFT", 80.0, 680.0),
        frag("500.00", 220.0, 680.0),
        frag("first", 80.0, 668.0),
        frag("second", 80.0, 656.0),
    ]);

    let parser = StatementParser::new(ParseOptions {
        max_continuation_rows: 1,
        ..ParseOptions::default()
    });
    let result = parser.parse_document(&[page(1, fragments)]).unwrap();
    assert_eq!(field(&result.transactions[0], "Description"), "NEFT first");
}

#[test]
fn test_amount_side_resolver_can_be_disabled() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("Transfer 500.00", 80.0, 680.0),
        frag("14,500.00", 380.0, 680.0),
    ]);
    let pages = vec![page(1, fragments)];

    let resolved = StatementParser::default().parse_document(&pages).unwrap();
    assert_eq!(field(&resolved.transactions[0], "Deposit"), "500.00");
    assert_eq!(field(&resolved.transactions[0], "Description"), "Transfer");

    let raw = StatementParser::default()
        .without_amount_side_resolver()
        .parse_document(&pages)
        .unwrap();
    assert_eq!(field(&raw.transactions[0], "Description"), "Transfer 500.00");
    assert_eq!(field(&raw.transactions[0], "Deposit"), "");
}

// ============================================================================
// JSON Contract Tests
// ============================================================================

#[test]
fn test_response_json_shape() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("ATM", 80.0, 680.0),
        frag("500.00", 220.0, 680.0),
    ]);
    let response = ConversionResponse::from_result("march.pdf", parse(&[page(1, fragments)]));
    let json: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["filename"], "march.pdf");
    assert_eq!(json["headers"][0], "Date");
    assert_eq!(json["columnTypes"]["Date"], "date");
    assert_eq!(json["columnTypes"]["Description"], "text");
    assert_eq!(json["columnTypes"]["Balance"], "amount");
    assert_eq!(json["pages"][0]["pageNumber"], 1);
    assert_eq!(json["pages"][0]["transactions"][0]["Description"], "ATM");
    assert_eq!(json["data"][0]["Withdrawal"], "500.00");
    assert_eq!(json["data"][0]["Deposit"], "");
    assert!(json.get("error").is_none());

    // Keys follow header order
    let keys: Vec<&String> = json["data"][0].as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 5);
}

#[test]
fn test_response_round_trips() {
    let mut fragments = header(700.0);
    fragments.extend([
        frag("01/02/2024", 0.0, 680.0),
        frag("ATM", 80.0, 680.0),
        frag("500.00", 220.0, 680.0),
    ]);
    let response = ConversionResponse::from_result("a.pdf", parse(&[page(1, fragments)]));
    let back: ConversionResponse = serde_json::from_str(&response.to_json_pretty().unwrap()).unwrap();
    assert_eq!(back, response);
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_extract_nonexistent_file() {
    let result = extract_fragments("/nonexistent/path/to/file.pdf");
    assert!(result.is_err());
}

#[test]
fn test_convert_nonexistent_file_reports_failure() {
    let response = convert_pdf("/nonexistent/path/to/statement.pdf");
    assert!(!response.success);
    assert_eq!(response.filename, "statement.pdf");
    assert!(response.error.is_some());
}

#[test]
fn test_convert_invalid_pdf_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"%PDF-1.4 this is not really a pdf").unwrap();
    let response = convert_pdf(file.path());
    assert!(!response.success);
    assert!(response.data.is_empty());
}

#[test]
fn test_convert_invalid_buffer() {
    let response = convert_pdf_mem(b"garbage", "upload.pdf");
    assert!(!response.success);
    assert_eq!(response.filename, "upload.pdf");
}
