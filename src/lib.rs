//! Report Export SDK - grouped-grid computation and multi-format rendering
//!
//! The export core shared by the console's report screens:
//! - A grouping/row-span engine that compresses a flat, pre-sorted record
//!   list into a grid of spanning cells per grouping level
//! - Three renderers consuming that grid identically: paginated PDF,
//!   styled XLSX with literal cell merges, and escaped CSV
//! - A logo asset pipeline (fetch once, downsample, memoize)
//! - An orchestrator that validates requests and reports a definitive
//!   success/failure outcome
//!
//! Data fetching, form validation, and authentication stay outside this
//! crate; callers hand over already-fetched records plus a declarative
//! column and grouping configuration.
//!
//! ```
//! use report_export_sdk::{
//!     ColumnSpec, ExportFormat, ExportRequest, ExportService, GroupKeySpec, LogoCache, Record,
//!     ReportMetadata,
//! };
//! use std::sync::Arc;
//!
//! let mut record = Record::new();
//! record.insert("canal".to_string(), serde_json::json!("Mayorista"));
//! record.insert("cliente".to_string(), serde_json::json!("Ferretería El Clavo"));
//!
//! let request = ExportRequest {
//!     title: "Ventas por canal".to_string(),
//!     filename: "ventas_canal".to_string(),
//!     data: vec![record],
//!     columns: vec![
//!         ColumnSpec::new("canal", "Canal", 14.0),
//!         ColumnSpec::new("cliente", "Cliente", 24.0),
//!     ],
//!     group: GroupKeySpec::new(["canal"]).with_row_counter(),
//!     metadata: ReportMetadata::default(),
//!     allow_large: false,
//! };
//!
//! let service = ExportService::new(Arc::new(LogoCache::disabled()));
//! let outcome = service.export(&request, ExportFormat::Csv);
//! assert!(outcome.success);
//! ```

pub mod assets;
pub mod columns;
pub mod export;
pub mod grid;
pub mod request;
pub mod sanitize;

// Re-export commonly used types
pub use assets::{Logo, LogoCache, LogoSource};
pub use columns::{Alignment, ColumnSpec, GroupKeySpec};
pub use export::{
    CsvExporter, ExportArtifact, ExportError, ExportFormat, ExportOutcome, ExportService,
    PdfExporter, XlsxExporter,
};
pub use grid::{Cell, Grid, GridRow, Record, compute_grid};
pub use request::{ExportRequest, ReportMetadata, RequestError};
pub use sanitize::{sanitize, sanitize_str};
