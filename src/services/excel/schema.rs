//! The impedance record schema.
//!
//! Column order here defines the positional layout of uploaded sheets, the
//! live table and exported workbooks alike. Reordering columns is a breaking
//! change for every file already in circulation.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Separator between group path segments and the label in flat headers.
pub const GROUP_SEPARATOR: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Text,
    Number,
}

/// Columns that carry business meaning beyond their value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Plain,
    /// Identifier used to filter exports and name the exported file.
    ProductCode,
    /// When set, the backend applies the row to every record with the same product code.
    BulkUpdateFlag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    pub key: &'static str,
    pub label: &'static str,
    pub group_path: &'static [&'static str],
    pub value_kind: ValueKind,
    pub role: ColumnRole,
}

impl ColumnDefinition {
    /// Flat header text, e.g. `Impedance/Line 2/Target (ohm)`.
    pub fn header_label(&self) -> String {
        let mut parts: Vec<&str> = self.group_path.to_vec();
        parts.push(self.label);
        parts.join(GROUP_SEPARATOR)
    }
}

const fn text(key: &'static str, label: &'static str, group_path: &'static [&'static str]) -> ColumnDefinition {
    ColumnDefinition { key, label, group_path, value_kind: ValueKind::Text, role: ColumnRole::Plain }
}

const fn num(key: &'static str, label: &'static str, group_path: &'static [&'static str]) -> ColumnDefinition {
    ColumnDefinition { key, label, group_path, value_kind: ValueKind::Number, role: ColumnRole::Plain }
}

const fn with_role(mut col: ColumnDefinition, role: ColumnRole) -> ColumnDefinition {
    col.role = role;
    col
}

const GENERAL: &[&str] = &["General"];
const BOARD: &[&str] = &["Board"];
const MATERIAL: &[&str] = &["Material"];
const PROCESS: &[&str] = &["Process"];
const ENGINEERING: &[&str] = &["Engineering"];

const GENERAL_COLUMNS: [ColumnDefinition; 23] = [
    text("job_no", "Job No.", GENERAL),
    with_role(text("product_code", "Product Code", GENERAL), ColumnRole::ProductCode),
    text("revision", "Revision", GENERAL),
    num("layer_count", "Layers", GENERAL),
    text("customer", "Customer", GENERAL),
    text("customer_part_no", "Customer P/N", GENERAL),
    text("order_type", "Order Type", GENERAL),
    num("board_thickness", "Thickness (mm)", BOARD),
    text("thickness_tolerance", "Thickness Tolerance", BOARD),
    num("outer_copper", "Outer Copper (oz)", BOARD),
    num("inner_copper", "Inner Copper (oz)", BOARD),
    text("material_vendor", "Vendor", MATERIAL),
    text("material_grade", "Grade", MATERIAL),
    num("tg", "Tg (C)", MATERIAL),
    num("dk", "Dk", MATERIAL),
    num("df", "Df", MATERIAL),
    text("surface_finish", "Surface Finish", PROCESS),
    text("solder_mask_color", "Solder Mask", PROCESS),
    num("min_trace", "Min Trace (mil)", PROCESS),
    num("min_space", "Min Space (mil)", PROCESS),
    text("engineer", "Engineer", ENGINEERING),
    text("review_date", "Review Date", ENGINEERING),
    with_role(text("bulk_update_by_code", "Update All By Code", ENGINEERING), ColumnRole::BulkUpdateFlag),
];

macro_rules! dielectric {
    ($n:literal) => {
        [
            text(concat!("d", $n, "_material"), "Material", &["Stack-up", concat!("Dielectric ", $n)]),
            text(concat!("d", $n, "_construction"), "Construction", &["Stack-up", concat!("Dielectric ", $n)]),
            num(concat!("d", $n, "_resin_content"), "Resin (%)", &["Stack-up", concat!("Dielectric ", $n)]),
            num(concat!("d", $n, "_thickness"), "Thickness (mil)", &["Stack-up", concat!("Dielectric ", $n)]),
        ]
    };
}

macro_rules! impedance_line {
    ($n:literal) => {
        [
            text(concat!("imp", $n, "_layer"), "Signal Layer", &["Impedance", concat!("Line ", $n)]),
            text(concat!("imp", $n, "_reference"), "Reference Layers", &["Impedance", concat!("Line ", $n)]),
            text(concat!("imp", $n, "_structure"), "Structure", &["Impedance", concat!("Line ", $n)]),
            num(concat!("imp", $n, "_target_ohm"), "Target (ohm)", &["Impedance", concat!("Line ", $n)]),
            num(concat!("imp", $n, "_tolerance_pct"), "Tolerance (%)", &["Impedance", concat!("Line ", $n)]),
            num(concat!("imp", $n, "_design_width"), "Design Width (mil)", &["Impedance", concat!("Line ", $n)]),
            num(concat!("imp", $n, "_design_spacing"), "Design Spacing (mil)", &["Impedance", concat!("Line ", $n)]),
            num(concat!("imp", $n, "_coplanar_gap"), "Coplanar Gap (mil)", &["Impedance", concat!("Line ", $n)]),
            num(concat!("imp", $n, "_adjusted_width"), "Adjusted Width (mil)", &["Impedance", concat!("Line ", $n)]),
            num(concat!("imp", $n, "_adjusted_spacing"), "Adjusted Spacing (mil)", &["Impedance", concat!("Line ", $n)]),
            num(concat!("imp", $n, "_calculated_ohm"), "Calculated (ohm)", &["Impedance", concat!("Line ", $n)]),
            num(concat!("imp", $n, "_measured_ohm"), "Measured (ohm)", &["Impedance", concat!("Line ", $n)]),
        ]
    };
}

const STACKUP_COLUMNS: [[ColumnDefinition; 4]; 4] = [dielectric!("1"), dielectric!("2"), dielectric!("3"), dielectric!("4")];

const IMPEDANCE_COLUMNS: [[ColumnDefinition; 12]; 8] = [
    impedance_line!("1"),
    impedance_line!("2"),
    impedance_line!("3"),
    impedance_line!("4"),
    impedance_line!("5"),
    impedance_line!("6"),
    impedance_line!("7"),
    impedance_line!("8"),
];

static COLUMNS: Lazy<Vec<ColumnDefinition>> = Lazy::new(|| {
    GENERAL_COLUMNS
        .iter()
        .chain(STACKUP_COLUMNS.iter().flatten())
        .chain(IMPEDANCE_COLUMNS.iter().flatten())
        .copied()
        .collect()
});

static HEADER_INDEX: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    columns().iter().map(|col| (col.header_label(), col.key)).collect()
});

/// The ordered column list shared by import, the live table and export.
pub fn columns() -> &'static [ColumnDefinition] {
    &COLUMNS
}

pub fn keys() -> impl Iterator<Item = &'static str> {
    columns().iter().map(|col| col.key)
}

fn column_with_role(role: ColumnRole) -> &'static ColumnDefinition {
    columns()
        .iter()
        .find(|col| col.role == role)
        .expect("schema defines every special column role")
}

pub fn product_code_column() -> &'static ColumnDefinition {
    column_with_role(ColumnRole::ProductCode)
}

pub fn bulk_update_column() -> &'static ColumnDefinition {
    column_with_role(ColumnRole::BulkUpdateFlag)
}

/// Inverse of [`ColumnDefinition::header_label`].
pub fn key_for_header(header: &str) -> Option<&'static str> {
    HEADER_INDEX.get(header.trim()).copied()
}
