//! Code classification and extraction of codes from table cells

use serde::Deserialize;
use serde_json::Value;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeKind {
    Fund,
    Stock,
    Invalid,
}

impl Display for CodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CodeKind::Fund => "Fund",
                CodeKind::Stock => "Stock",
                CodeKind::Invalid => "Invalid",
            }
        )
    }
}

/// Classifies a code by its characters alone.
///
/// All ASCII digits is a fund code (e.g. `161725`). Anything else carrying at
/// least one alphanumeric character is a stock ticker. Empty input and
/// symbol-only input such as `--` are `Invalid`.
pub fn classify(code: &str) -> CodeKind {
    if code.is_empty() || !code.chars().any(char::is_alphanumeric) {
        CodeKind::Invalid
    } else if code.chars().all(|c| c.is_ascii_digit()) {
        CodeKind::Fund
    } else {
        CodeKind::Stock
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TextSegment {
    #[serde(default)]
    pub text: Option<String>,
}

/// Accepted shapes of the code column.
///
/// Bitable returns text columns either as a plain string or as a list of
/// rich-text segments, one per value.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CodeCell {
    Text(String),
    Segments(Vec<TextSegment>),
}

impl CodeCell {
    /// Resolves a raw cell value, returning `None` for unsupported shapes.
    pub fn from_value(value: &Value) -> Option<Self> {
        CodeCell::deserialize(value).ok()
    }

    /// Trimmed, non-empty codes in cell order.
    pub fn codes(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            CodeCell::Text(text) => vec![text.as_str()],
            CodeCell::Segments(segments) => segments
                .iter()
                .filter_map(|s| s.text.as_deref())
                .collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// A unique code found in the table, with the exchange read from its first row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTarget {
    pub code: String,
    pub exchange: Option<String>,
}

impl CodeTarget {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            exchange: None,
        }
    }

    pub fn kind(&self) -> CodeKind {
        classify(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify() {
        assert_eq!(classify("000001"), CodeKind::Fund);
        assert_eq!(classify("600519"), CodeKind::Fund);
        assert_eq!(classify("AAPL"), CodeKind::Stock);
        assert_eq!(classify("BRK.B"), CodeKind::Stock);
        assert_eq!(classify("00700A"), CodeKind::Stock);
        assert_eq!(classify(""), CodeKind::Invalid);
        assert_eq!(classify("--"), CodeKind::Invalid);
        assert_eq!(classify(" . "), CodeKind::Invalid);
    }

    #[test]
    fn test_classify_non_ascii_digits_are_not_funds() {
        // Full-width digits are alphanumeric but not ASCII digits
        assert_eq!(classify("１２３"), CodeKind::Stock);
    }

    #[test]
    fn test_cell_from_scalar() {
        let cell = CodeCell::from_value(&json!("TSLA")).unwrap();
        assert_eq!(cell, CodeCell::Text("TSLA".to_string()));
        assert_eq!(cell.codes(), vec!["TSLA"]);
    }

    #[test]
    fn test_cell_from_segments() {
        let cell =
            CodeCell::from_value(&json!([{"text": "600519", "type": "text"}, {"text": " AAPL "}]))
                .unwrap();
        assert_eq!(cell.codes(), vec!["600519", "AAPL"]);
    }

    #[test]
    fn test_cell_drops_empty_segments() {
        let cell = CodeCell::from_value(&json!([{"text": ""}, {"type": "mention"}, {"text": "  "}]))
            .unwrap();
        assert!(cell.codes().is_empty());
    }

    #[test]
    fn test_cell_rejects_unsupported_shapes() {
        assert!(CodeCell::from_value(&json!(600519)).is_none());
        assert!(CodeCell::from_value(&json!({"text": "AAPL"})).is_none());
        assert!(CodeCell::from_value(&json!(null)).is_none());
    }
}
