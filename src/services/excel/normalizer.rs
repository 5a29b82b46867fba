use calamine::Data;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::CellValue;

static DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?\d*\.?\d+$").expect("valid decimal pattern")
});

/// A cell as it comes out of the sheet reader, before normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawCell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

pub type RawRow = Vec<RawCell>;

impl From<&Data> for RawCell {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Int(i) => RawCell::Number(*i as f64),
            Data::Float(f) => RawCell::Number(*f),
            Data::String(s) => RawCell::Text(s.clone()),
            Data::Bool(b) => RawCell::Bool(*b),
            // Date cells keep their serial number, same as an unformatted read.
            Data::DateTime(dt) => RawCell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
            Data::Error(_) | Data::Empty => RawCell::Empty,
        }
    }
}

impl From<&str> for RawCell {
    fn from(s: &str) -> Self {
        RawCell::Text(s.to_string())
    }
}

fn is_sentinel(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s == "-" || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null")
}

/// Classifies a raw cell as null, number or text. Total: every input has an output.
pub fn normalize(cell: &RawCell) -> CellValue {
    match cell {
        RawCell::Empty => CellValue::Null,
        RawCell::Number(n) if n.is_finite() => CellValue::Number(*n),
        RawCell::Number(_) => CellValue::Null,
        RawCell::Bool(b) => CellValue::Text(b.to_string()),
        RawCell::Text(s) if is_sentinel(s) => CellValue::Null,
        RawCell::Text(s) => normalize_str(s.trim()),
    }
}

fn normalize_str(trimmed: &str) -> CellValue {
    let stripped = trimmed.replace(',', "");
    if DECIMAL.is_match(&stripped) {
        if let Ok(n) = stripped.parse::<f64>() {
            return CellValue::Number(n);
        }
    }
    CellValue::Text(trimmed.to_string())
}

/// Note-column variant: sentinels become `None`, everything else is trimmed text.
pub fn normalize_text(cell: &RawCell) -> Option<String> {
    match cell {
        RawCell::Empty => None,
        RawCell::Number(n) if n.is_finite() => Some(n.to_string()),
        RawCell::Number(_) => None,
        RawCell::Bool(b) => Some(b.to_string()),
        RawCell::Text(s) if is_sentinel(s) => None,
        RawCell::Text(s) => Some(s.trim().to_string()),
    }
}
