//! Document-level parsing
//!
//! Pages are processed strictly in order. The first page that yields a
//! header (or, failing that, columns inferred from its data) fixes the
//! table layout for the whole document; later pages only locate where their
//! data starts and reuse it.

use indexmap::IndexMap;
use log::{debug, trace, warn};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::assembler::{AmountSideResolver, BalanceDeltaResolver, Transaction, TransactionAssembler};
use crate::classify::{KeywordRowClassifier, MappedRow, RowClassifier, RowKind};
use crate::columns::{anchors_from_header, ColumnModel, ColumnType, GapAwareColumnModel, TableLayout};
use crate::dedup::Deduplicator;
use crate::fragment::{build_rows, PageFragments, Row};
use crate::header::{looks_like_data, HeaderDetector, KeywordHeaderDetector};
use crate::StatementError;

/// Tuning knobs for the parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Row grouping tolerance as a fraction of the line pitch
    pub row_tolerance_factor: f32,
    pub min_row_tolerance: f32,
    pub max_row_tolerance: f32,
    /// Y gaps at or below this are baseline jitter, not line breaks
    pub gap_noise_floor: f32,
    /// Leading rows of a page scanned for a header
    pub header_scan_rows: usize,
    pub header_min_score: i32,
    /// Header fragments closer than this are one label
    pub header_merge_gap: f32,
    /// Data rows sampled to refine column boundaries
    pub column_sample_rows: usize,
    pub column_min_gap: f32,
    pub fallback_sample_rows: usize,
    pub fallback_cluster_gap: f32,
    /// Fraction of sampled rows an inferred column must appear in
    pub fallback_min_support: f32,
    /// Upper bound on rows merged into one transaction
    pub max_continuation_rows: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            row_tolerance_factor: 0.6,
            min_row_tolerance: 2.0,
            max_row_tolerance: 8.0,
            gap_noise_floor: 0.5,
            header_scan_rows: 40,
            header_min_score: 3,
            header_merge_gap: 3.0,
            column_sample_rows: 20,
            column_min_gap: 20.0,
            fallback_sample_rows: 15,
            fallback_cluster_gap: 15.0,
            fallback_min_support: 0.35,
            max_continuation_rows: 8,
        }
    }
}

/// Where a document parse stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePhase {
    /// No layout yet
    SeekHeader,
    /// Layout fixed, collecting transactions
    Collecting,
    /// All pages consumed
    Done,
}

/// State carried across the pages of one document.
///
/// The layout is written once, by the page that establishes it, and is
/// read-only afterwards.
#[derive(Debug, Default)]
pub struct DocumentParseState {
    layout: OnceCell<TableLayout>,
    dedup: Deduplicator,
    last_balance: Option<f64>,
    done: bool,
}

impl DocumentParseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ParsePhase {
        if self.done {
            ParsePhase::Done
        } else if self.layout.get().is_some() {
            ParsePhase::Collecting
        } else {
            ParsePhase::SeekHeader
        }
    }

    pub fn layout(&self) -> Option<&TableLayout> {
        self.layout.get()
    }

    /// Running balance after the last accepted transaction
    pub fn last_balance(&self) -> Option<f64> {
        self.last_balance
    }

    fn finish(&mut self) {
        self.done = true;
    }
}

/// One page of output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_number: u32,
    pub transactions: Vec<Transaction>,
}

/// Everything recovered from one document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    /// All transactions in page order
    pub transactions: Vec<Transaction>,
    pub headers: Vec<String>,
    pub column_types: IndexMap<String, ColumnType>,
    pub pages: Vec<Page>,
}

/// Turns the positioned fragments of a document into transactions
pub struct StatementParser {
    options: ParseOptions,
    header_detector: Box<dyn HeaderDetector>,
    column_model: Box<dyn ColumnModel>,
    classifier: Box<dyn RowClassifier>,
    side_resolver: Option<Box<dyn AmountSideResolver>>,
}

impl Default for StatementParser {
    fn default() -> Self {
        Self::new(ParseOptions::default())
    }
}

impl StatementParser {
    /// Parser with the keyword strategies configured from `options`
    pub fn new(options: ParseOptions) -> Self {
        Self {
            header_detector: Box::new(KeywordHeaderDetector::from_options(&options)),
            column_model: Box::new(GapAwareColumnModel::new(options.column_min_gap)),
            classifier: Box::new(KeywordRowClassifier::new(options.header_min_score)),
            side_resolver: Some(Box::new(BalanceDeltaResolver)),
            options,
        }
    }

    pub fn with_header_detector(mut self, detector: impl HeaderDetector + 'static) -> Self {
        self.header_detector = Box::new(detector);
        self
    }

    pub fn with_column_model(mut self, model: impl ColumnModel + 'static) -> Self {
        self.column_model = Box::new(model);
        self
    }

    pub fn with_classifier(mut self, classifier: impl RowClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn with_amount_side_resolver(mut self, resolver: impl AmountSideResolver + 'static) -> Self {
        self.side_resolver = Some(Box::new(resolver));
        self
    }

    /// Leave unsided amounts where they were found
    pub fn without_amount_side_resolver(mut self) -> Self {
        self.side_resolver = None;
        self
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse all pages of one document, in order
    pub fn parse_document(&self, pages: &[PageFragments]) -> Result<ConversionResult, StatementError> {
        let mut state = DocumentParseState::new();
        let mut out_pages = Vec::with_capacity(pages.len());
        let mut transactions = Vec::new();

        for page in pages {
            let page = self.parse_page(page, &mut state);
            transactions.extend(page.transactions.iter().cloned());
            out_pages.push(page);
        }

        state.finish();
        debug!("phase -> {:?}: {} transactions", state.phase(), transactions.len());

        let Some(layout) = state.layout() else {
            warn!("no header or column structure found in {} pages", pages.len());
            return Err(StatementError::NoColumnsDetected);
        };
        if transactions.is_empty() {
            return Err(StatementError::NoTransactionsFound);
        }

        Ok(ConversionResult {
            transactions,
            headers: layout.headers(),
            column_types: layout.column_types(),
            pages: out_pages,
        })
    }

    /// Parse one page, establishing the layout if it isn't known yet
    pub fn parse_page(&self, page: &PageFragments, state: &mut DocumentParseState) -> Page {
        let rows = build_rows(&page.fragments, &self.options);
        let mut out = Page {
            page_number: page.page_number,
            transactions: Vec::new(),
        };

        let start = match state.layout.get() {
            Some(layout) => self.locate_data_start(&rows, layout),
            None => match self.establish_layout(&rows, page.page_number) {
                Some((layout, start)) => {
                    // Only reached while unset
                    let _ = state.layout.set(layout);
                    debug!("page {}: phase -> {:?}", page.page_number, state.phase());
                    start
                }
                None => {
                    trace!("page {}: no layout yet", page.page_number);
                    return out;
                }
            },
        };
        let Some(layout) = state.layout.get() else {
            return out;
        };

        let mapped: Vec<MappedRow> = rows[start.min(rows.len())..]
            .iter()
            .map(|row| MappedRow::new(row, layout))
            .collect();
        let assembled = TransactionAssembler::new(
            layout,
            self.classifier.as_ref(),
            self.options.max_continuation_rows,
        )
        .with_side_resolver(self.side_resolver.as_deref())
        .assemble(&mapped, &mut state.last_balance);

        out.transactions = state.dedup.retain_new(assembled, layout);
        debug!(
            "page {}: {} rows, {} transactions",
            page.page_number,
            rows.len(),
            out.transactions.len()
        );
        out
    }

    /// Find the header (or infer columns) and build the layout. Returns the
    /// layout and the index of the first data row.
    fn establish_layout(&self, rows: &[Row], page_number: u32) -> Option<(TableLayout, usize)> {
        if let Some(found) = self.header_detector.detect(rows) {
            let header = &rows[found.row_index];
            let anchors = anchors_from_header(header, self.options.header_merge_gap);
            if anchors.len() >= 2 {
                let samples = self.sample_rows(&rows[found.row_index + 1..]);
                if let Some(layout) = TableLayout::new(self.column_model.build_ranges(&anchors, &samples)) {
                    debug!(
                        "page {}: header at row {} (score {}), columns {:?}",
                        page_number,
                        found.row_index,
                        found.score.score,
                        layout.headers()
                    );
                    return Some((layout, found.row_index + 1));
                }
            }
        }

        debug!("page {}: no header row, inferring columns from data", page_number);
        let anchors = self.header_detector.detect_columns_from_data(rows)?;
        let samples = self.sample_rows(rows);
        let layout = TableLayout::new(self.column_model.build_ranges(&anchors, &samples))?;
        debug!("page {}: inferred {} columns", page_number, layout.len());
        Some((layout, 0))
    }

    fn sample_rows(&self, rows: &[Row]) -> Vec<Row> {
        rows.iter()
            .filter(|row| looks_like_data(row))
            .take(self.options.column_sample_rows)
            .cloned()
            .collect()
    }

    /// On pages after the first, data starts after a repeated header if one
    /// appears near the top, otherwise at the first row
    fn locate_data_start(&self, rows: &[Row], layout: &TableLayout) -> usize {
        rows.iter()
            .take(self.options.header_scan_rows)
            .position(|row| {
                self.classifier.classify(&MappedRow::new(row, layout), layout) == RowKind::Header
            })
            .map_or(0, |i| i + 1)
    }
}
