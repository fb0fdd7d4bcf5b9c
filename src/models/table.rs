use serde::{Deserialize, Serialize};

use super::null_to_default;
use crate::engine::Row;

/// Column mode as BigQuery reports it. Nullable unless stated otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

impl FieldMode {
    /// Repeated fields ignore the required flag.
    pub fn from_flags(repeated: bool, required: bool) -> Self {
        if repeated {
            FieldMode::Repeated
        } else if required {
            FieldMode::Required
        } else {
            FieldMode::Nullable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(default, deserialize_with = "null_to_default")]
    pub mode: FieldMode,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub table_id: String,
    pub cols: Vec<String>,
    pub schemas: Vec<TableSchema>,
}

/// One row of a namespace's `AAA_tableschema` table.
#[derive(Debug, Clone, Deserialize)]
pub struct TableRaw {
    pub table_id: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub table_cols: Vec<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub table_schema: String,
}

impl TableRaw {
    pub fn from_row(row: Row) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(row))
    }
}

impl Table {
    /// Decodes the embedded column schema JSON. An empty schema string
    /// yields a table without field entries.
    pub fn from_raw(raw: TableRaw) -> Result<Self, serde_json::Error> {
        let schemas = if raw.table_schema.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str::<Vec<TableSchema>>(&raw.table_schema)?
        };

        Ok(Self {
            table_id: raw.table_id,
            cols: raw.table_cols,
            schemas,
        })
    }
}
