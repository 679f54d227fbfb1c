//! Spreadsheet renderer.
//!
//! Emits a single-sheet workbook ("Datos") with literal merged-cell
//! ranges for spanned grid regions, dark-filled header styling, and light
//! gray alternating data rows. A variable number of metadata rows (title,
//! generation timestamp, user, department) sits above the table, so the
//! header row is located by an explicit index from the caller or, when
//! omitted, by scanning for the row whose values match the declared
//! column headers.

use chrono::Utc;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};
use tracing::debug;

use crate::columns::Alignment;
use crate::export::ExportError;
use crate::grid::Grid;
use crate::request::ReportMetadata;

/// Sheet name used for every export.
const SHEET_NAME: &str = "Datos";

const HEADER_FILL: u32 = 0x305496;
const HEADER_FONT: u32 = 0xFFFFFF;
const STRIPE_FILL: u32 = 0xF2F2F2;

/// Styled workbook output via `rust_xlsxwriter`.
#[derive(Debug, Default)]
pub struct XlsxExporter;

impl XlsxExporter {
    pub fn new() -> Self {
        Self
    }

    /// Render the grid into an in-memory workbook.
    ///
    /// `header_row` is the zero-based sheet row of the column-header line;
    /// pass `None` to fall back to content-based detection over the rows
    /// this renderer lays out.
    pub fn render(
        &self,
        grid: &Grid,
        title: &str,
        metadata: &ReportMetadata,
        header_row: Option<usize>,
    ) -> Result<Vec<u8>, ExportError> {
        let headers = grid.headers();
        let meta_rows = metadata_rows(title, metadata);

        // Logical layout: metadata block, one blank row, header, data.
        let mut sheet_rows: Vec<Vec<String>> = meta_rows.clone();
        sheet_rows.push(Vec::new());
        sheet_rows.push(headers.clone());

        let header_idx = match header_row {
            Some(idx) => idx,
            None => detect_header_row(&sheet_rows, &headers).unwrap_or(sheet_rows.len() - 1),
        };

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        let title_format = Format::new().set_bold().set_font_size(14);
        let plain_format = Format::new();
        let header_format = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(HEADER_FILL))
            .set_font_color(Color::RGB(HEADER_FONT))
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Center);

        // Metadata block.
        for (r, line) in meta_rows.iter().enumerate() {
            let format = if r == 0 { &title_format } else { &plain_format };
            if let Some(text) = line.first() {
                worksheet.write_string_with_format(r as u32, 0, text, format)?;
            }
        }

        // Column headers and widths.
        for (c, col) in grid.layout().iter().enumerate() {
            worksheet.write_string_with_format(
                header_idx as u32,
                c as u16,
                &col.header,
                &header_format,
            )?;
            worksheet.set_column_width(c as u16, col.width)?;
        }

        // Data rows. Absorbed cells were already claimed by an earlier
        // merge_range call, so each row only writes its present cells.
        let data_start = header_idx + 1;
        for (r, row) in grid.rows().iter().enumerate() {
            let sheet_row = (data_start + r) as u32;
            let striped = (r + 1) % 2 == 0;
            for cell in &row.cells {
                let col = cell.column as u16;
                if cell.row_span > 1 {
                    let merge_format = cell_format(cell.align, false)
                        .set_align(FormatAlign::VerticalCenter);
                    worksheet.merge_range(
                        sheet_row,
                        col,
                        sheet_row + (cell.row_span as u32) - 1,
                        col,
                        &cell.content,
                        &merge_format,
                    )?;
                } else {
                    let format = cell_format(cell.align, striped);
                    match cell.content.parse::<f64>() {
                        Ok(number) => {
                            worksheet.write_number_with_format(sheet_row, col, number, &format)?
                        }
                        Err(_) => worksheet.write_string_with_format(
                            sheet_row,
                            col,
                            &cell.content,
                            &format,
                        )?,
                    };
                }
            }
        }

        debug!(
            rows = grid.rows().len(),
            header_row = header_idx,
            "worksheet laid out"
        );
        Ok(workbook.save_to_buffer()?)
    }
}

/// Metadata lines injected above the table, one cell each.
fn metadata_rows(title: &str, metadata: &ReportMetadata) -> Vec<Vec<String>> {
    let mut rows = vec![
        vec![title.to_string()],
        vec![format!("Generado: {}", Utc::now().format("%Y-%m-%d %H:%M"))],
    ];
    if let Some(actor) = &metadata.actor {
        rows.push(vec![format!("Usuario: {actor}")]);
    }
    if let Some(department) = &metadata.department {
        rows.push(vec![format!("Departamento: {department}")]);
    }
    if let Some(subtitle) = &metadata.subtitle {
        rows.push(vec![subtitle.clone()]);
    }
    rows
}

/// Find the row whose cell values exactly match the declared headers.
/// Tolerates any number of metadata rows above the table.
pub fn detect_header_row(rows: &[Vec<String>], headers: &[String]) -> Option<usize> {
    rows.iter().position(|row| row.as_slice() == headers)
}

fn cell_format(align: Alignment, striped: bool) -> Format {
    let mut format = Format::new().set_border(FormatBorder::Thin);
    format = match align {
        Alignment::Left => format.set_align(FormatAlign::Left),
        Alignment::Center => format.set_align(FormatAlign::Center),
        Alignment::Right => format.set_align(FormatAlign::Right),
    };
    if striped {
        format = format.set_background_color(Color::RGB(STRIPE_FILL));
    }
    format
}
