use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::services::excel::schema;

/// A normalized cell. Encoded on the wire as `null`, a JSON number or a JSON string.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Display form used for filtering and filenames; numbers print without a trailing `.0`.
    pub fn to_display(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Text(s) => Some(s.clone()),
        }
    }

    fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => CellValue::Null,
            JsonValue::Number(n) => n.as_f64().map_or(CellValue::Null, CellValue::Number),
            JsonValue::String(s) => CellValue::Text(s),
            JsonValue::Bool(b) => CellValue::Text(b.to_string()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(CellValue::from_json)
    }
}

/// One row of impedance data keyed by schema field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Backend identity, opaque to this service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonValue>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, CellValue>,
    #[serde(default, deserialize_with = "note_from_cell")]
    pub note: Option<String>,
}

/// Backends are loose about the note type; numbers and booleans are kept as their text.
fn note_from_cell<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    CellValue::deserialize(deserializer).map(|cell| cell.to_display())
}

impl Record {
    /// A record with every schema key present and set to null.
    pub fn empty() -> Self {
        let fields = schema::keys()
            .map(|key| (key.to_string(), CellValue::Null))
            .collect();
        Self { id: None, fields, note: None }
    }

    pub fn get(&self, key: &str) -> &CellValue {
        static NULL: CellValue = CellValue::Null;
        self.fields.get(key).unwrap_or(&NULL)
    }

    pub fn product_code(&self) -> Option<String> {
        self.get(schema::product_code_column().key).to_display()
    }

    /// Whether the row asks the backend to apply its values to every record sharing its product code.
    pub fn is_bulk_update(&self) -> bool {
        match self.get(schema::bulk_update_column().key) {
            CellValue::Null => false,
            CellValue::Number(n) => *n != 0.0,
            CellValue::Text(s) => {
                let s = s.trim().to_ascii_lowercase();
                matches!(s.as_str(), "y" | "yes" | "true" | "1" | "x" | "是")
            }
        }
    }

    /// Restricts the field map to exactly the schema key set; unknown keys are dropped.
    pub fn conform(mut self) -> Self {
        let mut fields = BTreeMap::new();
        for col in schema::columns() {
            let value = self.fields.remove(col.key).unwrap_or_default();
            fields.insert(col.key.to_string(), value);
        }
        self.fields = fields;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResult {
    pub success: bool,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
}
