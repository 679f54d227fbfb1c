//! Export functionality
//!
//! Provides renderers for the supported output formats:
//! - Paginated PDF (repeating header/footer, atomic span blocks)
//! - XLSX (literal merged cells, header/alternating-row styling)
//! - CSV (escaped flat text, spans degraded to repeated values)
//!
//! All three consume the same [`crate::grid::Grid`]; the orchestrator in
//! [`service`] validates requests, picks the renderer, and reports a
//! definitive success/failure outcome.

pub mod csv;
pub mod pdf;
pub mod service;
pub mod xlsx;

use serde::{Deserialize, Serialize};

use crate::request::RequestError;

/// Output format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "PDF",
            ExportFormat::Xlsx => "Excel",
            ExportFormat::Csv => "CSV",
        }
    }
}

/// Error during export
#[derive(Debug, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum ExportError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),
    #[error("Delimited output error: {0}")]
    Delimited(String),
    #[error("Render error: {0}")]
    Render(String),
}

impl From<rust_xlsxwriter::XlsxError> for ExportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ExportError::Spreadsheet(err.to_string())
    }
}

impl From<::csv::Error> for ExportError {
    fn from(err: ::csv::Error) -> Self {
        ExportError::Delimited(err.to_string())
    }
}

/// The produced document and its generated filename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Terminal result of an export invocation. Never retried automatically;
/// a failed export must be re-initiated by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[must_use = "export outcomes carry the success flag and artifact"]
pub struct ExportOutcome {
    pub success: bool,
    pub message: String,
    pub artifact: Option<ExportArtifact>,
}

impl ExportOutcome {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            artifact: None,
        }
    }
}

// Re-export for convenience
pub use csv::CsvExporter;
pub use pdf::PdfExporter;
pub use service::ExportService;
pub use xlsx::XlsxExporter;
