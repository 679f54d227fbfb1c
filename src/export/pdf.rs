//! Paginated document renderer.
//!
//! Writes PDF 1.4 by hand: catalog, page tree, one content stream per
//! page, WinAnsi Helvetica fonts, an optional JPEG logo XObject, Info
//! dictionary, xref table, trailer.
//!
//! Layout rules:
//! - The header block (logo, centered title, subtitle, rule) and the
//!   column-header row are redrawn identically on every page.
//! - Rows are partitioned into atomic blocks so that no spanning cell
//!   crosses a page break; the grouping engine's span ceiling
//!   ([`PDF_SPAN_CEILING`]) keeps every block well under a page, and the
//!   renderer only breaks between blocks, never inside one.
//! - Footers carry the generation timestamp, the requesting user, and a
//!   "Página N de TOTAL" counter. The total is only known after layout,
//!   so footers are appended to every page in a second pass.

use std::ops::Range;

use chrono::Utc;

use crate::assets::Logo;
use crate::columns::Alignment;
use crate::export::ExportError;
use crate::grid::{Grid, GridRow};
use crate::request::ReportMetadata;

/// Maximum safe row span for this format. Taller merged cells are hard to
/// read and risk straddling a page break, so the grid is computed with
/// this ceiling.
pub const PDF_SPAN_CEILING: usize = 12;

// A4 portrait, in points.
const PAGE_WIDTH: f64 = 595.28;
const PAGE_HEIGHT: f64 = 841.89;
const MARGIN: f64 = 40.0;
const HEADER_BLOCK: f64 = 56.0;
const FOOTER_BLOCK: f64 = 32.0;
const TABLE_HEADER_HEIGHT: f64 = 18.0;
const ROW_HEIGHT: f64 = 16.0;
const BODY_FONT_SIZE: f64 = 9.0;
const CHAR_WIDTH_FACTOR: f64 = 0.52;
const LOGO_MAX_HEIGHT: f64 = 36.0;
const LOGO_MAX_WIDTH: f64 = 120.0;

/// Hand-written paginated PDF output.
#[derive(Debug, Default)]
pub struct PdfExporter;

impl PdfExporter {
    pub fn new() -> Self {
        Self
    }

    /// Render the grid as a paginated document.
    ///
    /// A missing logo is simply skipped; it never fails the export.
    pub fn render(
        &self,
        grid: &Grid,
        title: &str,
        metadata: &ReportMetadata,
        logo: Option<&Logo>,
    ) -> Result<Vec<u8>, ExportError> {
        let widths = scaled_widths(grid);
        let rows_per_page = ((PAGE_HEIGHT
            - 2.0 * MARGIN
            - HEADER_BLOCK
            - TABLE_HEADER_HEIGHT
            - FOOTER_BLOCK)
            / ROW_HEIGHT) as usize;

        let mut pages: Vec<Range<usize>> = Vec::new();
        let mut start = 0usize;
        let mut used = 0usize;
        for block in atomic_blocks(grid.rows()) {
            let len = block.end - block.start;
            if len > rows_per_page {
                return Err(ExportError::Render(format!(
                    "a merged block of {} rows does not fit on one page",
                    len
                )));
            }
            if used + len > rows_per_page {
                pages.push(start..block.start);
                start = block.start;
                used = 0;
            }
            used += len;
        }
        pages.push(start..grid.rows().len());

        // First pass: header and body per page.
        let mut streams: Vec<String> = Vec::new();
        for page_rows in &pages {
            let mut stream = String::new();
            draw_page_header(&mut stream, title, metadata, logo);
            draw_table(&mut stream, grid, &widths, page_rows.clone());
            streams.push(stream);
        }

        // Second pass: the footer needs the total page count.
        let total = streams.len();
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M").to_string();
        let actor = metadata.actor.as_deref().unwrap_or("-");
        for (idx, stream) in streams.iter_mut().enumerate() {
            draw_page_footer(stream, &timestamp, actor, idx + 1, total);
        }

        Ok(assemble_document(&streams, title, logo))
    }
}

/// Partition rows into the smallest ranges no spanning cell crosses.
/// Page breaks may only fall between ranges.
fn atomic_blocks(rows: &[GridRow]) -> Vec<Range<usize>> {
    let mut blocks = Vec::new();
    let mut start = 0usize;
    let mut open_until = 0usize;
    for (r, row) in rows.iter().enumerate() {
        let span_end = row
            .cells
            .iter()
            .map(|c| r + c.row_span)
            .max()
            .unwrap_or(r + 1);
        open_until = open_until.max(span_end);
        if r + 1 >= open_until {
            blocks.push(start..r + 1);
            start = r + 1;
        }
    }
    blocks
}

/// Column widths scaled proportionally to fill the content width.
fn scaled_widths(grid: &Grid) -> Vec<f64> {
    let content_width = PAGE_WIDTH - 2.0 * MARGIN;
    let total: f64 = grid.layout().iter().map(|c| c.width).sum();
    if total <= 0.0 {
        let even = content_width / grid.total_columns().max(1) as f64;
        return vec![even; grid.total_columns()];
    }
    grid.layout()
        .iter()
        .map(|c| c.width / total * content_width)
        .collect()
}

fn draw_page_header(stream: &mut String, title: &str, metadata: &ReportMetadata, logo: Option<&Logo>) {
    let top = PAGE_HEIGHT - MARGIN;

    if let Some(logo) = logo {
        // Fit the downsampled image into the reserved corner box.
        let scale = (LOGO_MAX_HEIGHT / logo.height as f64).min(LOGO_MAX_WIDTH / logo.width as f64);
        let w = logo.width as f64 * scale;
        let h = logo.height as f64 * scale;
        stream.push_str("q\n");
        stream.push_str(&format!("{:.2} 0 0 {:.2} {:.2} {:.2} cm\n", w, h, MARGIN, top - h - 4.0));
        stream.push_str("/Im1 Do\n");
        stream.push_str("Q\n");
    }

    // Centered title.
    let title_size = 14.0;
    let title_x = (PAGE_WIDTH - text_width(title, title_size)) / 2.0;
    stream.push_str("BT\n");
    stream.push_str(&format!("/F2 {:.1} Tf\n", title_size));
    stream.push_str("0 0 0 rg\n");
    stream.push_str(&format!("1 0 0 1 {:.2} {:.2} Tm\n", title_x, top - 18.0));
    stream.push_str(&format!("({}) Tj\n", escape_pdf_string(title)));
    stream.push_str("ET\n");

    // Subtitle line: report period and/or department.
    let mut subtitle_parts: Vec<&str> = Vec::new();
    if let Some(subtitle) = &metadata.subtitle {
        subtitle_parts.push(subtitle);
    }
    if let Some(department) = &metadata.department {
        subtitle_parts.push(department);
    }
    if !subtitle_parts.is_empty() {
        let subtitle = subtitle_parts.join(" - ");
        let x = (PAGE_WIDTH - text_width(&subtitle, BODY_FONT_SIZE)) / 2.0;
        stream.push_str("BT\n");
        stream.push_str(&format!("/F1 {:.1} Tf\n", BODY_FONT_SIZE));
        stream.push_str("0.3 0.3 0.3 rg\n");
        stream.push_str(&format!("1 0 0 1 {:.2} {:.2} Tm\n", x, top - 34.0));
        stream.push_str(&format!("({}) Tj\n", escape_pdf_string(&subtitle)));
        stream.push_str("ET\n");
    }

    // Rule under the header block.
    let rule_y = top - HEADER_BLOCK + 8.0;
    stream.push_str(&format!(
        "q\n0.6 G\n{:.2} {:.2} m\n{:.2} {:.2} l\nS\nQ\n",
        MARGIN,
        rule_y,
        PAGE_WIDTH - MARGIN,
        rule_y
    ));
}

fn draw_table(stream: &mut String, grid: &Grid, widths: &[f64], page_rows: Range<usize>) {
    let table_top = PAGE_HEIGHT - MARGIN - HEADER_BLOCK;

    // Column-header row: dark fill, light bold text, repeated per page.
    stream.push_str("q\n");
    stream.push_str("0.19 0.33 0.59 rg\n");
    stream.push_str(&format!(
        "{:.2} {:.2} {:.2} {:.2} re f\n",
        MARGIN,
        table_top - TABLE_HEADER_HEIGHT,
        PAGE_WIDTH - 2.0 * MARGIN,
        TABLE_HEADER_HEIGHT
    ));
    stream.push_str("Q\n");

    let mut x = MARGIN;
    for (col, width) in grid.layout().iter().zip(widths) {
        let text = clip_text(&col.header, *width);
        let tx = x + (width - text_width(&text, BODY_FONT_SIZE)).max(0.0) / 2.0;
        stream.push_str("BT\n");
        stream.push_str(&format!("/F2 {:.1} Tf\n", BODY_FONT_SIZE));
        stream.push_str("1 1 1 rg\n");
        stream.push_str(&format!(
            "1 0 0 1 {:.2} {:.2} Tm\n",
            tx,
            table_top - TABLE_HEADER_HEIGHT + 5.5
        ));
        stream.push_str(&format!("({}) Tj\n", escape_pdf_string(&text)));
        stream.push_str("ET\n");
        x += width;
    }

    // Data rows. Each present cell draws its own border rectangle over
    // the full span, so absorbed rows need no drawing at all.
    let data_top = table_top - TABLE_HEADER_HEIGHT;
    for r in page_rows.clone() {
        let row = &grid.rows()[r];
        let row_top = data_top - (r - page_rows.start) as f64 * ROW_HEIGHT;
        for cell in &row.cells {
            let cell_x: f64 = MARGIN + widths[..cell.column].iter().sum::<f64>();
            let width = widths[cell.column];
            let height = cell.row_span as f64 * ROW_HEIGHT;

            stream.push_str(&format!(
                "q\n0.75 G\n{:.2} {:.2} {:.2} {:.2} re S\nQ\n",
                cell_x,
                row_top - height,
                width,
                height
            ));

            let text = clip_text(&cell.content, width);
            if !text.is_empty() {
                let tw = text_width(&text, BODY_FONT_SIZE);
                let tx = match cell.align {
                    Alignment::Left => cell_x + 3.0,
                    Alignment::Center => cell_x + (width - tw).max(0.0) / 2.0,
                    Alignment::Right => cell_x + (width - tw - 3.0).max(0.0),
                };
                stream.push_str("BT\n");
                stream.push_str(&format!("/F1 {:.1} Tf\n", BODY_FONT_SIZE));
                stream.push_str("0 0 0 rg\n");
                stream.push_str(&format!(
                    "1 0 0 1 {:.2} {:.2} Tm\n",
                    tx,
                    row_top - ROW_HEIGHT + 4.5
                ));
                stream.push_str(&format!("({}) Tj\n", escape_pdf_string(&text)));
                stream.push_str("ET\n");
            }
        }
    }
}

fn draw_page_footer(stream: &mut String, timestamp: &str, actor: &str, page: usize, total: usize) {
    let line_y = MARGIN + FOOTER_BLOCK - 12.0;
    stream.push_str(&format!(
        "q\n0.6 G\n{:.2} {:.2} m\n{:.2} {:.2} l\nS\nQ\n",
        MARGIN,
        line_y,
        PAGE_WIDTH - MARGIN,
        line_y
    ));

    let footer_y = MARGIN + 8.0;
    let size = 8.0;

    let mut text_at = |x: f64, text: &str| {
        stream.push_str("BT\n");
        stream.push_str(&format!("/F1 {:.1} Tf\n", size));
        stream.push_str("0.2 0.2 0.2 rg\n");
        stream.push_str(&format!("1 0 0 1 {:.2} {:.2} Tm\n", x, footer_y));
        stream.push_str(&format!("({}) Tj\n", escape_pdf_string(text)));
        stream.push_str("ET\n");
    };

    text_at(MARGIN, &format!("Generado: {}", timestamp));

    let actor_text = format!("Usuario: {}", actor);
    text_at((PAGE_WIDTH - text_width(&actor_text, size)) / 2.0, &actor_text);

    let counter = format!("Página {} de {}", page, total);
    text_at(PAGE_WIDTH - MARGIN - text_width(&counter, size), &counter);
}

/// Assemble the final document from finished page streams.
fn assemble_document(streams: &[String], title: &str, logo: Option<&Logo>) -> Vec<u8> {
    let page_count = streams.len();
    let font_obj_start = 3 + page_count * 2;
    let logo_obj = logo.map(|_| font_obj_start + 2);
    let info_obj = font_obj_start + 2 + usize::from(logo.is_some());

    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n");
    pdf.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut xref_positions: Vec<usize> = Vec::new();

    // Object 1: Catalog
    xref_positions.push(pdf.len());
    pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    // Object 2: Pages - position patched once the kids are known.
    let pages_obj_position = xref_positions.len();
    xref_positions.push(0);

    let xobject = match logo_obj {
        Some(id) => format!(" /XObject << /Im1 {} 0 R >>", id),
        None => String::new(),
    };

    let mut page_obj_ids: Vec<usize> = Vec::new();
    for (page_idx, content_stream) in streams.iter().enumerate() {
        let page_obj_id = 3 + page_idx * 2;
        let content_obj_id = page_obj_id + 1;
        page_obj_ids.push(page_obj_id);

        xref_positions.push(pdf.len());
        let page_obj = format!(
            "{} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] /Contents {} 0 R /Resources << /Font << /F1 {} 0 R /F2 {} 0 R >>{} >> >>\nendobj\n",
            page_obj_id,
            PAGE_WIDTH,
            PAGE_HEIGHT,
            content_obj_id,
            font_obj_start,
            font_obj_start + 1,
            xobject
        );
        pdf.extend_from_slice(page_obj.as_bytes());

        xref_positions.push(pdf.len());
        let content_obj = format!(
            "{} 0 obj\n<< /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            content_obj_id,
            content_stream.len(),
            content_stream
        );
        pdf.extend_from_slice(content_obj.as_bytes());
    }

    let pages_position = pdf.len();
    let kids_list: Vec<String> = page_obj_ids.iter().map(|id| format!("{} 0 R", id)).collect();
    let pages_obj = format!(
        "2 0 obj\n<< /Type /Pages /Kids [{}] /Count {} >>\nendobj\n",
        kids_list.join(" "),
        page_count
    );
    pdf.extend_from_slice(pages_obj.as_bytes());
    xref_positions[pages_obj_position] = pages_position;

    // Font objects
    xref_positions.push(pdf.len());
    let font1_obj = format!(
        "{} 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>\nendobj\n",
        font_obj_start
    );
    pdf.extend_from_slice(font1_obj.as_bytes());

    xref_positions.push(pdf.len());
    let font2_obj = format!(
        "{} 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>\nendobj\n",
        font_obj_start + 1
    );
    pdf.extend_from_slice(font2_obj.as_bytes());

    // Logo image XObject (JPEG passthrough, DCTDecode).
    if let (Some(id), Some(logo)) = (logo_obj, logo) {
        xref_positions.push(pdf.len());
        let image_header = format!(
            "{} 0 obj\n<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode /Length {} >>\nstream\n",
            id,
            logo.width,
            logo.height,
            logo.jpeg.len()
        );
        pdf.extend_from_slice(image_header.as_bytes());
        pdf.extend_from_slice(&logo.jpeg);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");
    }

    // Info dictionary
    xref_positions.push(pdf.len());
    let creation = Utc::now().format("D:%Y%m%d%H%M%S").to_string();
    let info = format!(
        "{} 0 obj\n<< /Title ({}) /Producer (Report Export SDK) /CreationDate ({}) >>\nendobj\n",
        info_obj,
        escape_pdf_string(title),
        creation
    );
    pdf.extend_from_slice(info.as_bytes());

    // Cross-reference table
    let xref_start = pdf.len();
    pdf.extend_from_slice(b"xref\n");
    pdf.extend_from_slice(format!("0 {}\n", xref_positions.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for pos in &xref_positions {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", pos).as_bytes());
    }

    // Trailer
    pdf.extend_from_slice(b"trailer\n");
    pdf.extend_from_slice(
        format!(
            "<< /Size {} /Root 1 0 R /Info {} 0 R >>\n",
            xref_positions.len() + 1,
            info_obj
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(b"startxref\n");
    pdf.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    pdf.extend_from_slice(b"%%EOF\n");

    pdf
}

/// Approximate Helvetica text width in points.
fn text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * CHAR_WIDTH_FACTOR
}

/// Truncate text to what fits the column, appending no ellipsis; the
/// sanitizer already capped field length upstream.
fn clip_text(text: &str, width: f64) -> String {
    let max_chars = ((width - 6.0) / (BODY_FONT_SIZE * CHAR_WIDTH_FACTOR)).max(1.0) as usize;
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Escape special characters for PDF strings. Latin-1 characters are
/// emitted as octal WinAnsi escapes; anything outside degrades to '?'.
fn escape_pdf_string(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '(' => result.push_str("\\("),
            ')' => result.push_str("\\)"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ if c.is_ascii() => result.push(c),
            _ if (c as u32) <= 0xFF => result.push_str(&format!("\\{:03o}", c as u32)),
            _ => result.push('?'),
        }
    }
    result
}
