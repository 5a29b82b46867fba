use std::io::Cursor;

use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};

use super::normalizer::{RawCell, RawRow};
use super::schema;
use super::SheetLayout;
use crate::error::AppError;

/// Decodes the first worksheet of an uploaded workbook into positional rows.
///
/// Header rows are dropped and rows with nothing past the reserved leading
/// columns are skipped, so a pre-numbered template row counts as blank.
/// Cells keep their absolute column position even when the sheet's used
/// range does not start at column A.
pub fn read_sheet(file_data: Bytes, layout: &SheetLayout) -> Result<Vec<RawRow>, AppError> {
    let start = std::time::Instant::now();
    let cursor = Cursor::new(file_data);

    let mut workbook: Sheets<_> = open_workbook_auto_from_rs(cursor)
        .map_err(|e| {
            tracing::error!("Failed to open workbook: {}", e);
            AppError::MalformedFile(format!("Failed to open workbook: {}", e))
        })?;

    let sheet_name = workbook.sheet_names().first().cloned()
        .ok_or_else(|| AppError::MalformedFile("No sheets found in workbook".to_string()))?;

    let range = workbook.worksheet_range(&sheet_name)
        .map_err(|e| AppError::MalformedFile(format!("Failed to read worksheet {}: {}", sheet_name, e)))?;

    let misplaced = misplaced_headers(&range, layout);
    if misplaced > 0 {
        tracing::warn!(
            "Sheet {} has {} known column headers out of schema order; values are read by position",
            sheet_name,
            misplaced
        );
    }

    let rows = range_to_rows(&range, layout);
    tracing::debug!(
        "Read {} data rows from sheet {} in {:?}",
        rows.len(),
        sheet_name,
        start.elapsed()
    );
    Ok(rows)
}

fn range_to_rows(range: &Range<Data>, layout: &SheetLayout) -> Vec<RawRow> {
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let skip_leading = layout.leading_columns.saturating_sub(first_col as usize);

    range.rows()
        .enumerate()
        .filter(|(idx, _)| first_row as usize + idx >= layout.header_rows)
        .map(|(_, row)| row)
        .filter(|row| row.iter().skip(skip_leading).any(|cell| !is_blank(cell)))
        .map(|row| {
            let mut raw: RawRow = vec![RawCell::Empty; first_col as usize];
            raw.extend(row.iter().map(RawCell::from));
            raw
        })
        .collect()
}

/// Counts header cells naming a schema column other than the one at their position.
fn misplaced_headers(range: &Range<Data>, layout: &SheetLayout) -> usize {
    if layout.header_rows == 0 {
        return 0;
    }
    let header_row = (layout.header_rows - 1) as u32;
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let Some(row) = header_row.checked_sub(first_row).and_then(|r| range.rows().nth(r as usize)) else {
        return 0;
    };

    let columns = schema::columns();
    row.iter()
        .enumerate()
        .filter_map(|(idx, cell)| {
            let label = match cell {
                Data::String(s) => s,
                _ => return None,
            };
            let key = schema::key_for_header(label)?;
            let pos = (first_col as usize + idx).checked_sub(layout.leading_columns);
            let expected = pos.and_then(|p| columns.get(p)).map(|col| col.key);
            (expected != Some(key)).then_some(key)
        })
        .count()
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
