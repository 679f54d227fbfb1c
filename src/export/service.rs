//! Export orchestrator.
//!
//! Validates the request, computes the grid once with the selected
//! format's span ceiling, invokes the matching renderer, and reports a
//! definitive success/failure outcome. Render failures are converted into
//! a failure result at this boundary; no partial artifact ever escapes as
//! a success. There is no retry policy and no cancellation once rendering
//! has begun.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::assets::LogoCache;
use crate::export::csv::CsvExporter;
use crate::export::pdf::{PDF_SPAN_CEILING, PdfExporter};
use crate::export::xlsx::XlsxExporter;
use crate::export::{ExportArtifact, ExportError, ExportFormat, ExportOutcome};
use crate::grid::compute_grid;
use crate::request::ExportRequest;

/// Stateless export entry point; the only shared state is the read-only
/// logo memo, so concurrent exports need no coordination.
pub struct ExportService {
    logo: Arc<LogoCache>,
}

impl ExportService {
    pub fn new(logo: Arc<LogoCache>) -> Self {
        Self { logo }
    }

    /// Run one export end to end.
    pub fn export(&self, request: &ExportRequest, format: ExportFormat) -> ExportOutcome {
        if let Err(err) = request.validate() {
            warn!(error = %err, format = format.label(), "export rejected");
            return ExportOutcome::failure(err.to_string());
        }

        let ceiling = span_ceiling(format);
        let grid = compute_grid(&request.data, &request.group, &request.columns, ceiling);
        let filename = timestamped_filename(&request.filename, format);

        let rendered: Result<Vec<u8>, ExportError> = match format {
            ExportFormat::Pdf => PdfExporter::new().render(
                &grid,
                &request.title,
                &request.metadata,
                self.logo.get(),
            ),
            ExportFormat::Xlsx => {
                XlsxExporter::new().render(&grid, &request.title, &request.metadata, None)
            }
            ExportFormat::Csv => CsvExporter::new().render(&grid),
        };

        match rendered {
            Ok(bytes) => {
                info!(
                    format = format.label(),
                    filename = %filename,
                    rows = request.data.len(),
                    "export finished"
                );
                ExportOutcome {
                    success: true,
                    message: format!("{} exported: {}", format.label(), filename),
                    artifact: Some(ExportArtifact { filename, bytes }),
                }
            }
            Err(err) => {
                warn!(error = %err, format = format.label(), "export failed");
                ExportOutcome::failure(format!("{} export failed: {}", format.label(), err))
            }
        }
    }
}

/// Maximum safe span per format. The paginated renderer must keep merged
/// cells clear of page breaks; the other formats have no practical limit.
fn span_ceiling(format: ExportFormat) -> Option<usize> {
    match format {
        ExportFormat::Pdf => Some(PDF_SPAN_CEILING),
        ExportFormat::Xlsx | ExportFormat::Csv => None,
    }
}

/// Append a compact timestamp so repeated exports of the same report
/// never collide.
fn timestamped_filename(base: &str, format: ExportFormat) -> String {
    format!(
        "{}_{}.{}",
        base.trim(),
        Utc::now().format("%Y%m%d%H%M%S"),
        format.extension()
    )
}
