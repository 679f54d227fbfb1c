//! Normalization of raw field values into export-safe strings.
//!
//! Domain text arrives from free-form CRUD fields and may carry control
//! characters, embedded markup, or spreadsheet-formula triggers. The
//! sanitizer is conservative: it keeps word characters, spaces, and a
//! fixed punctuation set, collapses whitespace runs, and caps the length.
//! Everything that leaves the grouping engine has passed through here.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Maximum sanitized length, in characters.
pub const MAX_FIELD_LENGTH: usize = 150;

/// Punctuation allowed in addition to word characters and spaces.
const ALLOWED_PUNCTUATION: &[char] = &['-', '.', ',', ';', ':', '(', ')', '[', ']'];

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Convert an arbitrary record value into an export-safe string.
///
/// `Null` becomes the empty string, booleans render as "Sí"/"No", numbers
/// use their canonical display, and composite values fall back to compact
/// JSON before text sanitization.
pub fn sanitize(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "Sí".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => sanitize_str(s),
        other => sanitize_str(&other.to_string()),
    }
}

/// Sanitize a raw string: strip disallowed characters, collapse whitespace
/// runs to a single space, trim, and truncate to [`MAX_FIELD_LENGTH`]
/// characters without splitting a multibyte character.
///
/// Idempotent: `sanitize_str(sanitize_str(x)) == sanitize_str(x)`.
pub fn sanitize_str(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| {
            c.is_alphanumeric() || *c == '_' || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(c)
        })
        .collect();

    let collapsed = WHITESPACE_RUN.replace_all(&filtered, " ");
    let trimmed = collapsed.trim();

    if trimmed.chars().count() <= MAX_FIELD_LENGTH {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(MAX_FIELD_LENGTH).collect();
    truncated.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_and_bool_values() {
        assert_eq!(sanitize(&Value::Null), "");
        assert_eq!(sanitize(&json!(true)), "Sí");
        assert_eq!(sanitize(&json!(false)), "No");
    }

    #[test]
    fn test_numbers_keep_canonical_display() {
        assert_eq!(sanitize(&json!(42)), "42");
        assert_eq!(sanitize(&json!(3.5)), "3.5");
        assert_eq!(sanitize(&json!(-7)), "-7");
    }

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(sanitize_str("  Ferretería   El  Clavo \n S.A. "), "Ferretería El Clavo S.A.");
    }

    #[test]
    fn test_strips_disallowed_characters() {
        assert_eq!(sanitize_str("=SUM(A1)\u{0007}!"), "SUM(A1)");
        assert_eq!(sanitize_str("<b>Cliente</b>"), "bClienteb");
        assert_eq!(sanitize_str("a \u{0001} b"), "a b");
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        let long = "á".repeat(200);
        let out = sanitize_str(&long);
        assert_eq!(out.chars().count(), MAX_FIELD_LENGTH);
        assert!(out.chars().all(|c| c == 'á'));
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "  hola   mundo  ",
            "a \u{0001} b",
            "Smith, Inc.",
            &"x y".repeat(120),
            "",
        ];
        for s in samples {
            let once = sanitize_str(s);
            assert_eq!(sanitize_str(&once), once, "not idempotent for {:?}", s);
        }
    }
}
