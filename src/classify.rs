//! Row classification against an established table layout

use crate::columns::{ColumnType, TableLayout};
use crate::fragment::Row;
use crate::grammar::{contains_amount, contains_date, footer_match, FooterMatch};
use crate::header::score_row;

/// What a row contributes to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// A (repeated) column header
    Header,
    /// Totals, closing lines, account metadata, page furniture
    Footer,
    /// Opens a new transaction
    TransactionStart,
    /// Belongs to the preceding transaction
    Continuation,
}

/// A row together with its cells under a layout
#[derive(Debug, Clone)]
pub struct MappedRow<'a> {
    pub row: &'a Row,
    /// One cell per column, fragments joined by single spaces
    pub cells: Vec<String>,
    lower: String,
}

impl<'a> MappedRow<'a> {
    pub fn new(row: &'a Row, layout: &TableLayout) -> Self {
        Self {
            cells: layout.assign_cells(row),
            lower: row.lowercase_text(),
            row,
        }
    }

    /// Joined lowercase text of the row
    pub fn lower_text(&self) -> &str {
        &self.lower
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.trim().is_empty()).count()
    }

    /// Some DATE column holds a date
    pub fn has_date(&self, layout: &TableLayout) -> bool {
        layout
            .indices_of(ColumnType::Date)
            .any(|i| contains_date(&self.cells[i]))
    }

    /// Number of AMOUNT columns holding an amount
    pub fn amount_count(&self, layout: &TableLayout) -> usize {
        layout
            .indices_of(ColumnType::Amount)
            .filter(|&i| contains_amount(&self.cells[i]))
            .count()
    }
}

/// Strategy for deciding what each row is
pub trait RowClassifier: Send + Sync {
    fn classify(&self, row: &MappedRow<'_>, layout: &TableLayout) -> RowKind;

    /// Whether `row` must open a new transaction rather than continue the
    /// current one
    fn starts_new_transaction(&self, row: &MappedRow<'_>, layout: &TableLayout) -> bool;
}

/// Keyword and grammar driven classifier
#[derive(Debug, Clone)]
pub struct KeywordRowClassifier {
    /// Score a repeated header must reach
    pub header_min_score: i32,
    /// Keyword matches a repeated header must have
    pub header_min_keywords: usize,
}

impl Default for KeywordRowClassifier {
    fn default() -> Self {
        Self {
            header_min_score: 3,
            header_min_keywords: 2,
        }
    }
}

impl KeywordRowClassifier {
    pub fn new(header_min_score: i32) -> Self {
        Self {
            header_min_score,
            ..Self::default()
        }
    }

    fn is_header(&self, row: &Row) -> bool {
        let score = score_row(row);
        score.score >= self.header_min_score && score.keyword_matches >= self.header_min_keywords
    }
}

/// At least two cells filled and a date or amount where one is expected
pub fn is_transaction_shaped(row: &MappedRow<'_>, layout: &TableLayout) -> bool {
    row.filled_count() >= 2 && (row.has_date(layout) || row.amount_count(layout) > 0)
}

impl RowClassifier for KeywordRowClassifier {
    fn classify(&self, row: &MappedRow<'_>, layout: &TableLayout) -> RowKind {
        // Totals rows name columns too; the footer test goes first
        let footer = footer_match(row.lower_text());
        if footer == FooterMatch::Strict {
            return RowKind::Footer;
        }
        if self.is_header(row.row) {
            return RowKind::Header;
        }

        let shaped = is_transaction_shaped(row, layout);
        if footer == FooterMatch::Metadata && !shaped {
            return RowKind::Footer;
        }

        if shaped {
            RowKind::TransactionStart
        } else {
            RowKind::Continuation
        }
    }

    fn starts_new_transaction(&self, row: &MappedRow<'_>, layout: &TableLayout) -> bool {
        let amounts = row.amount_count(layout);
        (row.has_date(layout) && amounts > 0) || amounts >= 2
    }
}
