//! Export request types and boundary validation.
//!
//! Validation runs before any rendering work begins; a rejected request
//! never produces a partial artifact. Each rule has its own error so the
//! UI layer can show a precise message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::columns::{ColumnSpec, GroupKeySpec};
use crate::grid::Record;

/// Row count above which an export needs explicit confirmation. Very large
/// exports can take several minutes; the confirmation prompt lives in the
/// UI, the policy lives here at the orchestration boundary.
pub const LARGE_DATASET_THRESHOLD: usize = 10_000;

/// Errors raised while validating an [`ExportRequest`].
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum RequestError {
    #[error("a report title is required")]
    MissingTitle,
    #[error("a base filename is required")]
    MissingFilename,
    #[error("there is no data to export")]
    NoData,
    #[error("no columns are configured for this report")]
    NoColumns,
    #[error("the dataset has {0} rows; exports over {LARGE_DATASET_THRESHOLD} require confirmation")]
    LargeDataset(usize),
}

/// Free-text lines printed in the document header/footer and the
/// spreadsheet metadata rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Secondary line under the title (report period, filters applied).
    pub subtitle: Option<String>,
    /// User who requested the export; printed in the page footer.
    pub actor: Option<String>,
    /// Originating department or branch.
    pub department: Option<String>,
}

/// A single export invocation: records, column model, grouping hierarchy.
///
/// Constructed by the calling report screen, validated by the export
/// service, discarded after rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub title: String,
    /// Base filename; a compact timestamp and extension are appended.
    pub filename: String,
    pub data: Vec<Record>,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub group: GroupKeySpec,
    #[serde(default)]
    pub metadata: ReportMetadata,
    /// Caller confirmed a dataset above [`LARGE_DATASET_THRESHOLD`].
    #[serde(default)]
    pub allow_large: bool,
}

impl ExportRequest {
    /// Apply the boundary rules in order; the first violation wins.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.title.trim().is_empty() {
            return Err(RequestError::MissingTitle);
        }
        if self.filename.trim().is_empty() {
            return Err(RequestError::MissingFilename);
        }
        if self.data.is_empty() {
            return Err(RequestError::NoData);
        }
        if self.columns.is_empty() {
            return Err(RequestError::NoColumns);
        }
        if self.data.len() > LARGE_DATASET_THRESHOLD && !self.allow_large {
            return Err(RequestError::LargeDataset(self.data.len()));
        }
        Ok(())
    }
}
