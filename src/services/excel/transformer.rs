use rayon::prelude::*;

use super::normalizer::{normalize, normalize_text, RawCell, RawRow};
use super::schema;
use super::SheetLayout;
use crate::error::AppError;
use crate::models::Record;

/// Maps one positional row onto the schema. Every schema key is populated,
/// missing or malformed cells degrade to null or text.
pub fn transform_row(raw: &RawRow, layout: &SheetLayout) -> Record {
    static EMPTY: RawCell = RawCell::Empty;
    let cell = |pos: usize| raw.get(layout.leading_columns + pos).unwrap_or(&EMPTY);
    let columns = schema::columns();

    let fields = columns
        .iter()
        .enumerate()
        .map(|(pos, col)| (col.key.to_string(), normalize(cell(pos))))
        .collect();

    Record {
        id: None,
        fields,
        note: normalize_text(cell(columns.len())),
    }
}

/// Transforms a whole file, preserving row order.
pub fn transform_rows(rows: Vec<RawRow>, layout: &SheetLayout) -> Result<Vec<Record>, AppError> {
    if rows.is_empty() {
        return Err(AppError::EmptyInput("The uploaded file is empty".to_string()));
    }

    Ok(rows.par_iter().map(|row| transform_row(row, layout)).collect())
}
