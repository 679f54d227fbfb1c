//! Hierarchical grouping / row-span engine.
//!
//! Turns a flat, pre-sorted record list into a [`Grid`]: a compressed
//! tabular representation where each grouping column carries a span count
//! and ungrouped columns repeat per row. The grid is the single
//! format-agnostic input consumed by every renderer.
//!
//! # Ordering precondition
//!
//! Records must already be sorted so that for every prefix of the grouping
//! hierarchy, equal-key records are contiguous. Sorting is an explicit
//! pre-step on the caller's side; debug builds assert the precondition,
//! release builds silently produce fragmented groups for mis-ordered
//! input.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::columns::{Alignment, ColumnSpec, GroupKeySpec};
use crate::sanitize::sanitize;

/// A single report record: field name to scalar value.
pub type Record = serde_json::Map<String, Value>;

/// Synthetic field key of the leading ordinal column.
pub const ORDINAL_KEY: &str = "nro";

/// One rendered cell of the grid.
///
/// `row_span == 1` is an ordinary repeating cell; `row_span > 1` means the
/// cell visually covers the next `row_span - 1` rows for its column. Rows
/// absorbed into a span do not carry a cell for that column at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Layout column this cell occupies.
    pub column: usize,
    /// Sanitized display text.
    pub content: String,
    /// Number of consecutive rows this cell covers (>= 1).
    pub row_span: usize,
    /// Alignment hint inherited from the column.
    pub align: Alignment,
}

/// One grid row. Cells appear in ascending column order but need not be
/// contiguous: a grouping column whose span started on an earlier row is
/// omitted, while the ordinal column can still open a fresh span at column
/// zero when only an inner level restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridRow {
    pub cells: Vec<Cell>,
}

/// Immutable grouped representation of a report, produced once per export
/// and consumed by exactly one renderer invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grid {
    layout: Vec<ColumnSpec>,
    group_columns: usize,
    rows: Vec<GridRow>,
}

impl Grid {
    /// Effective output columns: optional ordinal column, grouping columns
    /// in hierarchy order, then the remaining declared columns.
    pub fn layout(&self) -> &[ColumnSpec] {
        &self.layout
    }

    /// Number of leading columns that may carry spans (ordinal included).
    pub fn group_columns(&self) -> usize {
        self.group_columns
    }

    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    pub fn total_columns(&self) -> usize {
        self.layout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header labels in layout order.
    pub fn headers(&self) -> Vec<String> {
        self.layout.iter().map(|c| c.header.clone()).collect()
    }

    /// Flatten the grid back into a full value matrix, repeating each
    /// spanning cell's content across the rows it covers. Used by the
    /// delimited-text renderer, which discards merge information.
    pub fn fill_down(&self) -> Vec<Vec<String>> {
        let cols = self.total_columns();
        let mut matrix = vec![vec![String::new(); cols]; self.rows.len()];
        for (r, row) in self.rows.iter().enumerate() {
            for cell in &row.cells {
                for covered in matrix.iter_mut().skip(r).take(cell.row_span) {
                    covered[cell.column] = cell.content.clone();
                }
            }
        }
        matrix
    }
}

/// Compute the grouped grid for a sorted record sequence.
///
/// A new span starts at level `i`, row `r`, when `r == 0` or when any
/// level `j <= i` changed against row `r - 1`; a parent boundary (natural
/// or ceiling-induced) always restarts every descendant level. Missing
/// fields extract as `Null` and group together with other `Null`s.
///
/// `span_ceiling` is the format's maximum safe span: raw runs longer than
/// the ceiling split into consecutive chunks of at most that length, each
/// chunk its own spanning cell. The ordinal column, when enabled, takes
/// the next running number on every chunk of the innermost level, so an
/// over-long group becomes several separately numbered blocks of the same
/// group value.
///
/// Empty input yields an empty grid, never an error.
pub fn compute_grid(
    records: &[Record],
    group: &GroupKeySpec,
    columns: &[ColumnSpec],
    span_ceiling: Option<usize>,
) -> Grid {
    debug_assert!(
        is_grouped(records, &group.keys),
        "records are not sorted by the grouping hierarchy"
    );

    let layout = build_layout(group, columns);
    let group_columns = group.depth() + usize::from(group.row_counter);
    let n = records.len();
    if n == 0 {
        return Grid {
            layout,
            group_columns,
            rows: Vec::new(),
        };
    }

    let ceiling = span_ceiling.unwrap_or(usize::MAX).max(1);
    let depth = group.depth();

    // Extracted key values per level, row-major.
    let keys: Vec<Vec<&Value>> = group
        .keys
        .iter()
        .map(|key| records.iter().map(|r| field(r, key)).collect())
        .collect();

    let mut rows: Vec<GridRow> = vec![GridRow::default(); n];
    // Rows where the enclosing level started a chunk; level 0 inherits
    // only the natural value boundaries.
    let mut parent_starts = vec![false; n];
    let mut innermost_starts: Vec<(usize, usize)> = Vec::new();
    let mut chunk_splits = 0usize;

    for (level, level_keys) in keys.iter().enumerate() {
        let mut starts = vec![false; n];
        let mut r = 0;
        while r < n {
            // Scan the raw run: rows where this level and all parents stay
            // put. A parent chunk start cuts the run even when the value
            // repeats.
            let mut end = r + 1;
            while end < n && !parent_starts[end] && level_keys[end] == level_keys[r] {
                end += 1;
            }
            let run_len = end - r;
            if run_len > ceiling {
                chunk_splits += 1;
            }

            let content = sanitize(level_keys[r]);
            let column = usize::from(group.row_counter) + level;
            let align = layout[column].align;
            let mut chunk_start = r;
            while chunk_start < end {
                let span = ceiling.min(end - chunk_start);
                starts[chunk_start] = true;
                rows[chunk_start].cells.push(Cell {
                    column,
                    content: content.clone(),
                    row_span: span,
                    align,
                });
                if level == depth - 1 {
                    innermost_starts.push((chunk_start, span));
                }
                chunk_start += span;
            }
            r = end;
        }
        parent_starts = starts;
    }

    // Ordinal column spans like the innermost level; without grouping it
    // numbers every row individually.
    if group.row_counter {
        if depth == 0 {
            innermost_starts = (0..n).map(|r| (r, 1)).collect();
        }
        for (counter, (start, span)) in innermost_starts.iter().enumerate() {
            rows[*start].cells.insert(
                0,
                Cell {
                    column: 0,
                    content: (counter + 1).to_string(),
                    row_span: *span,
                    align: Alignment::Center,
                },
            );
        }
    }

    // Ungrouped columns repeat on every row and never merge.
    let data_columns: Vec<&ColumnSpec> = columns
        .iter()
        .filter(|c| !group.keys.contains(&c.key))
        .collect();
    for (r, row) in rows.iter_mut().enumerate() {
        for (d, col) in data_columns.iter().enumerate() {
            row.cells.push(Cell {
                column: group_columns + d,
                content: sanitize(field(&records[r], &col.key)),
                row_span: 1,
                align: col.align,
            });
        }
    }

    debug!(
        rows = n,
        levels = depth,
        chunk_splits,
        columns = layout.len(),
        "computed export grid"
    );

    Grid {
        layout,
        group_columns,
        rows,
    }
}

/// Effective output column layout for a grouping configuration.
fn build_layout(group: &GroupKeySpec, columns: &[ColumnSpec]) -> Vec<ColumnSpec> {
    let mut layout = Vec::with_capacity(columns.len() + 1);
    if group.row_counter {
        layout.push(ColumnSpec {
            key: ORDINAL_KEY.to_string(),
            header: "N°".to_string(),
            width: 6.0,
            align: Alignment::Center,
        });
    }
    for key in &group.keys {
        match columns.iter().find(|c| &c.key == key) {
            Some(spec) => layout.push(spec.clone()),
            None => layout.push(ColumnSpec::new(key, key, 18.0)),
        }
    }
    for col in columns {
        if !group.keys.contains(&col.key) {
            layout.push(col.clone());
        }
    }
    layout
}

fn field<'a>(record: &'a Record, key: &str) -> &'a Value {
    record.get(key).unwrap_or(&Value::Null)
}

/// Check that equal key prefixes are contiguous: once a group closes, its
/// key combination never reappears later in the sequence.
pub fn is_grouped(records: &[Record], keys: &[String]) -> bool {
    for prefix_len in 1..=keys.len() {
        let prefix = &keys[..prefix_len];
        let mut closed: HashSet<String> = HashSet::new();
        let mut current: Option<String> = None;
        for record in records {
            let values: Vec<&Value> = prefix.iter().map(|k| field(record, k)).collect();
            let fingerprint = serde_json::to_string(&values).unwrap_or_default();
            if current.as_ref() != Some(&fingerprint) {
                if let Some(previous) = current.take() {
                    closed.insert(previous);
                }
                if closed.contains(&fingerprint) {
                    return false;
                }
                current = Some(fingerprint);
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn sales_rows() -> Vec<Record> {
        vec![
            record(&[("canal", json!("A")), ("cliente", json!("X"))]),
            record(&[("canal", json!("A")), ("cliente", json!("Y"))]),
            record(&[("canal", json!("B")), ("cliente", json!("Z"))]),
        ]
    }

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("canal", "Canal", 14.0),
            ColumnSpec::new("cliente", "Cliente", 24.0),
        ]
    }

    #[test]
    fn test_empty_input_yields_empty_grid() {
        let grid = compute_grid(&[], &GroupKeySpec::new(["canal"]), &columns(), None);
        assert!(grid.is_empty());
        assert_eq!(grid.total_columns(), 2);
    }

    #[test]
    fn test_single_level_grouping() {
        let grid = compute_grid(&sales_rows(), &GroupKeySpec::new(["canal"]), &columns(), None);
        assert_eq!(grid.rows().len(), 3);

        // Row 0: canal spans two rows, cliente repeats.
        let row0 = &grid.rows()[0];
        assert_eq!(row0.cells.len(), 2);
        assert_eq!(row0.cells[0].content, "A");
        assert_eq!(row0.cells[0].row_span, 2);
        assert_eq!(row0.cells[1].content, "X");
        assert_eq!(row0.cells[1].row_span, 1);

        // Row 1 is absorbed: no independent canal cell.
        let row1 = &grid.rows()[1];
        assert_eq!(row1.cells.len(), 1);
        assert_eq!(row1.cells[0].content, "Y");

        let row2 = &grid.rows()[2];
        assert_eq!(row2.cells.len(), 2);
        assert_eq!(row2.cells[0].content, "B");
        assert_eq!(row2.cells[0].row_span, 1);
    }

    #[test]
    fn test_span_sums_equal_row_count() {
        let records: Vec<Record> = (0..9)
            .map(|i| {
                record(&[
                    ("canal", json!(if i < 5 { "A" } else { "B" })),
                    ("cliente", json!(format!("C{}", i / 2))),
                    ("monto", json!(i * 10)),
                ])
            })
            .collect();
        let cols = vec![
            ColumnSpec::new("canal", "Canal", 14.0),
            ColumnSpec::new("cliente", "Cliente", 24.0),
            ColumnSpec::new("monto", "Monto", 12.0),
        ];
        let grid = compute_grid(
            &records,
            &GroupKeySpec::new(["canal", "cliente"]),
            &cols,
            Some(12),
        );

        for col in 0..grid.group_columns() {
            let total: usize = grid
                .rows()
                .iter()
                .flat_map(|row| &row.cells)
                .filter(|c| c.column == col)
                .map(|c| c.row_span)
                .sum();
            assert_eq!(total, records.len(), "column {} span sum", col);
        }
    }

    #[test]
    fn test_ordinal_with_nested_grouping() {
        // The outer level keeps spanning while the inner level restarts,
        // so the ordinal cell opens at column zero next to a gap.
        let records = vec![
            record(&[("canal", json!("A")), ("cliente", json!("X")), ("monto", json!(10))]),
            record(&[("canal", json!("A")), ("cliente", json!("X")), ("monto", json!(20))]),
            record(&[("canal", json!("A")), ("cliente", json!("Y")), ("monto", json!(30))]),
            record(&[("canal", json!("A")), ("cliente", json!("Y")), ("monto", json!(40))]),
        ];
        let cols = vec![
            ColumnSpec::new("canal", "Canal", 14.0),
            ColumnSpec::new("cliente", "Cliente", 24.0),
            ColumnSpec::new("monto", "Monto", 12.0),
        ];
        let group = GroupKeySpec::new(["canal", "cliente"]).with_row_counter();
        let grid = compute_grid(&records, &group, &cols, None);

        // Row 2: ordinal and cliente restart, canal is still covered.
        let row2 = &grid.rows()[2];
        let columns_present: Vec<usize> = row2.cells.iter().map(|c| c.column).collect();
        assert_eq!(columns_present, vec![0, 2, 3]);
        assert_eq!(row2.cells[0].content, "2");
        assert_eq!(row2.cells[0].row_span, 2);

        let matrix = grid.fill_down();
        assert_eq!(matrix[0], vec!["1", "A", "X", "10"]);
        assert_eq!(matrix[1], vec!["1", "A", "X", "20"]);
        assert_eq!(matrix[2], vec!["2", "A", "Y", "30"]);
        assert_eq!(matrix[3], vec!["2", "A", "Y", "40"]);
    }

    #[test]
    fn test_parent_boundary_forces_child_restart() {
        // cliente "X" repeats across the canal boundary but must not span it.
        let records = vec![
            record(&[("canal", json!("A")), ("cliente", json!("X"))]),
            record(&[("canal", json!("B")), ("cliente", json!("X"))]),
        ];
        let grid = compute_grid(
            &records,
            &GroupKeySpec::new(["canal", "cliente"]),
            &columns(),
            None,
        );
        let row1 = &grid.rows()[1];
        assert_eq!(row1.cells.len(), 2);
        assert_eq!(row1.cells[1].content, "X");
        assert_eq!(row1.cells[1].row_span, 1);
    }

    #[test]
    fn test_ceiling_chunks_long_runs() {
        let records: Vec<Record> = (0..5)
            .map(|i| record(&[("canal", json!("A")), ("cliente", json!(format!("C{i}")))]))
            .collect();
        let grid = compute_grid(
            &records,
            &GroupKeySpec::new(["canal"]),
            &columns(),
            Some(2),
        );

        let spans: Vec<usize> = grid
            .rows()
            .iter()
            .filter(|row| row.cells.len() == 2)
            .map(|row| row.cells[0].row_span)
            .collect();
        assert_eq!(spans, vec![2, 2, 1]);
    }

    #[test]
    fn test_chunk_count_matches_ceil_division() {
        let run = 40usize;
        let ceiling = 12usize;
        let records: Vec<Record> = (0..run)
            .map(|i| record(&[("canal", json!("A")), ("cliente", json!(i))]))
            .collect();
        let grid = compute_grid(
            &records,
            &GroupKeySpec::new(["canal"]),
            &columns(),
            Some(ceiling),
        );

        let chunks: Vec<usize> = grid
            .rows()
            .iter()
            .filter(|row| row.cells.len() == 2)
            .map(|row| row.cells[0].row_span)
            .collect();
        assert_eq!(chunks.len(), run.div_ceil(ceiling));
        assert!(chunks.iter().all(|s| *s <= ceiling));
        assert_eq!(chunks.iter().sum::<usize>(), run);
    }

    #[test]
    fn test_row_counter_numbers_chunks() {
        let records: Vec<Record> = (0..5)
            .map(|i| record(&[("canal", json!("A")), ("cliente", json!(format!("C{i}")))]))
            .collect();
        let group = GroupKeySpec::new(["canal"]).with_row_counter();
        let grid = compute_grid(&records, &group, &columns(), Some(2));

        assert_eq!(grid.headers()[0], "N°");
        let ordinals: Vec<(String, usize)> = grid
            .rows()
            .iter()
            .filter(|row| row.cells.len() == 3)
            .map(|row| (row.cells[0].content.clone(), row.cells[0].row_span))
            .collect();
        // Three chunks of the same group value, separately numbered.
        assert_eq!(
            ordinals,
            vec![
                ("1".to_string(), 2),
                ("2".to_string(), 2),
                ("3".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_missing_field_groups_as_null() {
        let records = vec![
            record(&[("cliente", json!("X"))]),
            record(&[("cliente", json!("Y"))]),
            record(&[("canal", json!("B")), ("cliente", json!("Z"))]),
        ];
        let grid = compute_grid(&records, &GroupKeySpec::new(["canal"]), &columns(), None);
        let row0 = &grid.rows()[0];
        assert_eq!(row0.cells[0].content, "");
        assert_eq!(row0.cells[0].row_span, 2);
    }

    #[test]
    fn test_fill_down_repeats_span_values() {
        let grid = compute_grid(&sales_rows(), &GroupKeySpec::new(["canal"]), &columns(), None);
        let matrix = grid.fill_down();
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix[0], vec!["A", "X"]);
        assert_eq!(matrix[1], vec!["A", "Y"]);
        assert_eq!(matrix[2], vec!["B", "Z"]);
    }

    #[test]
    fn test_is_grouped_detects_reopened_group() {
        let sorted = sales_rows();
        assert!(is_grouped(&sorted, &["canal".to_string()]));

        let shuffled = vec![
            record(&[("canal", json!("A")), ("cliente", json!("X"))]),
            record(&[("canal", json!("B")), ("cliente", json!("Z"))]),
            record(&[("canal", json!("A")), ("cliente", json!("Y"))]),
        ];
        assert!(!is_grouped(&shuffled, &["canal".to_string()]));
    }

    #[test]
    fn test_deep_hierarchy_layout_order() {
        let cols = vec![
            ColumnSpec::new("fecha", "Fecha", 12.0),
            ColumnSpec::new("sucursal", "Sucursal", 16.0),
            ColumnSpec::new("vendedor", "Vendedor", 18.0),
            ColumnSpec::new("negocio", "Negocio", 18.0),
            ColumnSpec::new("cliente", "Cliente", 24.0),
            ColumnSpec::new("monto", "Monto", 12.0),
        ];
        let group = GroupKeySpec::new(["fecha", "sucursal", "vendedor", "negocio", "cliente"])
            .with_row_counter();
        let records = vec![record(&[
            ("fecha", json!("2026-08-01")),
            ("sucursal", json!("Centro")),
            ("vendedor", json!("Diaz")),
            ("negocio", json!("Mayorista")),
            ("cliente", json!("X")),
            ("monto", json!(150)),
        ])];
        let grid = compute_grid(&records, &group, &cols, Some(12));
        assert_eq!(
            grid.headers(),
            vec!["N°", "Fecha", "Sucursal", "Vendedor", "Negocio", "Cliente", "Monto"]
        );
        assert_eq!(grid.group_columns(), 6);
        assert_eq!(grid.rows()[0].cells.len(), 7);
    }
}
