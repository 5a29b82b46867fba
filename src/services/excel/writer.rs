use rust_xlsxwriter::{Format, Workbook};

use crate::error::AppError;
use crate::services::export::{ExportCell, ExportTable};

/// Writes an export table as a single-sheet workbook and returns the file bytes.
pub fn write_workbook(table: &ExportTable, sheet_name: &str) -> Result<Vec<u8>, AppError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    if let Some(header_row) = table.data_start.checked_sub(1) {
        for (col, header) in table.headers.iter().enumerate() {
            if !header.is_empty() {
                worksheet.write_string_with_format(header_row, col as u16, header, &header_format)?;
            }
        }
        worksheet.set_freeze_panes(table.data_start, 0)?;
    }

    for (idx, row) in table.rows.iter().enumerate() {
        let row_num = table.data_start + idx as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                ExportCell::Empty => continue,
                ExportCell::Number(n) => worksheet.write_number(row_num, col as u16, *n)?,
                ExportCell::Text(s) => worksheet.write_string(row_num, col as u16, s)?,
            };
        }
    }

    let buffer = workbook.save_to_buffer()?;
    tracing::debug!(
        "Wrote workbook with {} rows x {} columns ({} bytes)",
        table.rows.len(),
        table.headers.len(),
        buffer.len()
    );
    Ok(buffer)
}
