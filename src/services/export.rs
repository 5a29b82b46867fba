use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::AppError;
use crate::models::{CellValue, Record};
use crate::services::excel::{schema, SheetLayout};
use crate::services::excel::utils::clean_file_stem;

pub const ROW_NUMBER_HEADER: &str = "No.";
pub const NOTE_HEADER: &str = "Note";
pub const NULL_PLACEHOLDER: &str = "-";
pub const SHEET_NAME: &str = "Impedance";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExportCell {
    Empty,
    Number(f64),
    Text(String),
}

pub type FlatRow = Vec<ExportCell>;

/// Human-labelled rows ready to be written to a sheet. Every row is aligned with `headers`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<FlatRow>,
    /// Sheet row of the first record. Headers sit on the row above, or are omitted at zero.
    pub data_start: u32,
}

impl From<&CellValue> for ExportCell {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Null => ExportCell::Text(NULL_PLACEHOLDER.to_string()),
            CellValue::Number(n) => ExportCell::Number(*n),
            CellValue::Text(s) => ExportCell::Text(s.clone()),
        }
    }
}

/// Flattens records into labelled rows, optionally restricted to a set of product codes.
///
/// The layout matches what the importer reads with the same `SheetLayout`:
/// the reserved leading columns (the first one numbers the rows), one column
/// per schema field in schema order, then the note.
pub fn project(
    records: &[Record],
    selected: &[String],
    layout: &SheetLayout,
) -> Result<ExportTable, AppError> {
    if records.is_empty() {
        return Err(AppError::EmptyInput("There are no records to export".to_string()));
    }

    let wanted: HashSet<&str> = selected.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    let survivors: Vec<&Record> = if wanted.is_empty() {
        records.iter().collect()
    } else {
        records
            .iter()
            .filter(|r| r.product_code().map_or(false, |code| wanted.contains(code.as_str())))
            .collect()
    };

    if survivors.is_empty() {
        return Err(AppError::EmptySelection(format!(
            "No records match product codes: {}",
            selected.join(", ")
        )));
    }

    let columns = schema::columns();
    let leading = layout.leading_columns;
    let mut headers = Vec::with_capacity(leading + columns.len() + 1);
    headers.extend((0..leading).map(|i| (if i == 0 { ROW_NUMBER_HEADER } else { "" }).to_string()));
    headers.extend(columns.iter().map(|col| col.header_label()));
    headers.push(NOTE_HEADER.to_string());

    let rows = survivors
        .iter()
        .enumerate()
        .map(|(idx, record)| {
            let mut row = Vec::with_capacity(headers.len());
            row.extend((0..leading).map(|i| {
                if i == 0 { ExportCell::Number((idx + 1) as f64) } else { ExportCell::Empty }
            }));
            row.extend(columns.iter().map(|col| ExportCell::from(record.get(col.key))));
            row.push(match &record.note {
                Some(note) if !note.trim().is_empty() => ExportCell::Text(note.clone()),
                _ => ExportCell::Text(NULL_PLACEHOLDER.to_string()),
            });
            row
        })
        .collect();

    tracing::debug!(
        "Projected {} of {} records for export",
        survivors.len(),
        records.len()
    );
    let data_start = u32::try_from(layout.header_rows)
        .map_err(|_| AppError::Export(format!("Too many header rows: {}", layout.header_rows)))?;
    Ok(ExportTable { headers, rows, data_start })
}

/// Download name: the selected product codes when present, otherwise a dated default.
pub fn export_filename(selected: &[String], today: NaiveDate) -> String {
    let codes: Vec<String> = selected
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(clean_file_stem)
        .collect();

    if codes.is_empty() {
        format!("impedance_records_{}.xlsx", today.format("%Y%m%d"))
    } else {
        format!("impedance_{}.xlsx", codes.join("_"))
    }
}
