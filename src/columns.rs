//! Declarative column and grouping configuration for report exports.
//!
//! A report screen describes its exportable fields as an ordered list of
//! [`ColumnSpec`] values and, optionally, a [`GroupKeySpec`] naming the
//! fields that form the grouping hierarchy (outermost first). Both are
//! plain data: the engine never mutates them and per-report mapping stays
//! a small pure function on the caller's side.

use serde::{Deserialize, Serialize};

/// Horizontal alignment hint for a rendered column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Description of a single exportable field.
///
/// The order of a `&[ColumnSpec]` slice defines both extraction order and
/// rendering order across every output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Field name looked up in each record.
    pub key: String,
    /// Display label for the header row.
    pub header: String,
    /// Preferred width hint. Interpreted as Excel character units by the
    /// spreadsheet renderer and as a relative weight by the PDF renderer.
    pub width: f64,
    /// Horizontal alignment of data cells.
    #[serde(default)]
    pub align: Alignment,
}

impl ColumnSpec {
    /// Create a left-aligned column.
    pub fn new(key: &str, header: &str, width: f64) -> Self {
        Self {
            key: key.to_string(),
            header: header.to_string(),
            width,
            align: Alignment::Left,
        }
    }

    /// Set the alignment hint.
    pub fn with_align(mut self, align: Alignment) -> Self {
        self.align = align;
        self
    }
}

/// Ordered grouping hierarchy for the row-span engine.
///
/// Position `i` may only start a new visual group when its own value
/// changes or any level `j < i` already changed; a parent boundary always
/// restarts every descendant level.
///
/// # Precondition
///
/// Records handed to [`crate::grid::compute_grid`] must already be sorted
/// by `keys` so that equal key prefixes are contiguous. The engine does
/// not sort; out-of-order input fragments what should be one group into
/// several disjoint spans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupKeySpec {
    /// Field names, outermost level first.
    pub keys: Vec<String>,
    /// Prepend an ordinal column ("N°") that spans like the innermost
    /// grouping level and takes the next running number on every chunk.
    #[serde(default)]
    pub row_counter: bool,
}

impl GroupKeySpec {
    /// Grouping over the given fields, without an ordinal column.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            row_counter: false,
        }
    }

    /// Enable the leading ordinal column.
    pub fn with_row_counter(mut self) -> Self {
        self.row_counter = true;
        self
    }

    /// Number of grouping levels (ordinal column excluded).
    pub fn depth(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_spec_builder() {
        let col = ColumnSpec::new("cliente", "Cliente", 24.0).with_align(Alignment::Right);
        assert_eq!(col.key, "cliente");
        assert_eq!(col.header, "Cliente");
        assert_eq!(col.align, Alignment::Right);
    }

    #[test]
    fn test_group_key_spec() {
        let group = GroupKeySpec::new(["canal", "cliente"]).with_row_counter();
        assert_eq!(group.depth(), 2);
        assert!(group.row_counter);
    }

    #[test]
    fn test_alignment_serde_lowercase() {
        let json = serde_json::to_string(&Alignment::Right).unwrap();
        assert_eq!(json, "\"right\"");
    }
}
