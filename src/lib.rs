//! Bank-statement transaction extraction from positioned PDF text
//!
//! This crate provides:
//! - Row clustering with a tolerance adapted to each page's line pitch
//! - Header detection and column inference, with a data-driven fallback
//! - Multi-line transaction assembly, footer rejection and deduplication
//! - A JSON response contract for UI and export layers

pub mod assembler;
pub mod classify;
pub mod columns;
pub mod dedup;
pub mod extractor;
pub mod fragment;
pub mod grammar;
pub mod header;
pub mod orchestrator;
pub mod output;

pub use assembler::{AmountSide, AmountSideResolver, BalanceDeltaResolver, Transaction};
pub use classify::{KeywordRowClassifier, RowClassifier, RowKind};
pub use columns::{ColumnModel, ColumnRange, ColumnType, GapAwareColumnModel, TableLayout};
pub use extractor::{extract_fragments, extract_fragments_mem};
pub use fragment::{build_rows, PageFragments, PositionedFragment, Row};
pub use header::{HeaderDetector, KeywordHeaderDetector};
pub use orchestrator::{ConversionResult, Page, ParseOptions, StatementParser};
pub use output::ConversionResponse;

use rayon::prelude::*;
use std::path::Path;

/// Convert a PDF file with the default parser
pub fn convert_pdf<P: AsRef<Path>>(path: P) -> ConversionResponse {
    convert_pdf_with(&StatementParser::default(), path)
}

/// Convert a PDF file with a configured parser
pub fn convert_pdf_with<P: AsRef<Path>>(parser: &StatementParser, path: P) -> ConversionResponse {
    let path = path.as_ref();
    let result = extract_fragments(path).and_then(|pages| parser.parse_document(&pages));
    ConversionResponse::from_result(filename_of(path), result)
}

/// Convert a PDF held in memory
pub fn convert_pdf_mem(buffer: &[u8], filename: &str) -> ConversionResponse {
    let parser = StatementParser::default();
    let result = extract_fragments_mem(buffer).and_then(|pages| parser.parse_document(&pages));
    ConversionResponse::from_result(filename, result)
}

/// Convert several PDFs in parallel. Responses are in input order.
pub fn convert_many<P: AsRef<Path> + Sync>(
    parser: &StatementParser,
    paths: &[P],
) -> Vec<ConversionResponse> {
    paths
        .par_iter()
        .map(|path| convert_pdf_with(parser, path))
        .collect()
}

fn filename_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum StatementError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("PDF is encrypted")]
    Encrypted,
    #[error("PDF has no text layer (scanned or image-only)")]
    NoTextLayer,
    #[error("No table columns detected: no header row and no column structure in the data")]
    NoColumnsDetected,
    #[error("No transactions found")]
    NoTransactionsFound,
}

impl From<lopdf::Error> for StatementError {
    fn from(e: lopdf::Error) -> Self {
        StatementError::Parse(e.to_string())
    }
}
