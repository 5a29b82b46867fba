pub mod normalizer;
pub mod reader;
pub mod schema;
pub mod transformer;
pub mod utils;
pub mod writer;

use serde::{Deserialize, Serialize};

pub use normalizer::{normalize, normalize_text, RawCell, RawRow};
pub use reader::read_sheet;
pub use transformer::{transform_row, transform_rows};
pub use writer::write_workbook;

/// Fixed conventions of the upload format; the sheet is not self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    /// Rows above the data, skipped on import.
    pub header_rows: usize,
    /// Reserved columns before the first schema column (the row number).
    pub leading_columns: usize,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self { header_rows: 1, leading_columns: 1 }
    }
}
