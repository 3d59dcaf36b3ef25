//! JSON response returned to callers

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::assembler::Transaction;
use crate::columns::ColumnType;
use crate::orchestrator::{ConversionResult, Page};
use crate::StatementError;

/// Conversion outcome for one file.
///
/// Failures are reported in-band (`success: false` plus `error`) so a batch
/// of files always produces one response per file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub success: bool,
    /// All transactions, in page order
    pub data: Vec<Transaction>,
    pub pages: Vec<Page>,
    pub headers: Vec<String>,
    pub column_types: IndexMap<String, ColumnType>,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversionResponse {
    pub fn from_result(
        filename: impl Into<String>,
        result: Result<ConversionResult, StatementError>,
    ) -> Self {
        let filename = filename.into();
        match result {
            Ok(result) => Self {
                success: true,
                data: result.transactions,
                pages: result.pages,
                headers: result.headers,
                column_types: result.column_types,
                filename,
                error: None,
            },
            Err(e) => Self::failure(filename, &e),
        }
    }

    pub fn failure(filename: impl Into<String>, error: &StatementError) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            pages: Vec::new(),
            headers: Vec::new(),
            column_types: IndexMap::new(),
            filename: filename.into(),
            error: Some(error.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
