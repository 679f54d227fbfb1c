//! Delimited-text renderer.
//!
//! The simplest output: one escaped, comma-joined line per data row plus a
//! header line. Row spans are intentionally discarded; each row emits its
//! own value for every column via [`Grid::fill_down`]. Fields containing
//! a comma, double quote, or newline are wrapped in double quotes with
//! internal quotes doubled.

use crate::export::ExportError;
use crate::grid::Grid;

/// Flat escaped text output, UTF-8.
#[derive(Debug, Default)]
pub struct CsvExporter;

impl CsvExporter {
    pub fn new() -> Self {
        Self
    }

    /// Render the grid as delimited text with a leading header line.
    pub fn render(&self, grid: &Grid) -> Result<Vec<u8>, ExportError> {
        let mut writer = ::csv::WriterBuilder::new()
            .quote_style(::csv::QuoteStyle::Necessary)
            .from_writer(Vec::new());

        writer.write_record(grid.headers())?;
        for row in grid.fill_down() {
            writer.write_record(&row)?;
        }

        writer
            .into_inner()
            .map_err(|e| ExportError::Delimited(e.to_string()))
    }
}
