use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Name of the reserved column carried by conditional-write responses.
pub const APPLIED_COLUMN: &str = "[applied]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValue {
    Text(String),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Blob(Vec<u8>),
    Uuid(Uuid),
    Timestamp(i64),
    List(Vec<ColumnValue>),
    Map(HashMap<String, ColumnValue>),
    Null,
}

impl ColumnValue {
    /// CQL-ish name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnValue::Text(_) => "text",
            ColumnValue::Int(_) => "int",
            ColumnValue::BigInt(_) => "bigint",
            ColumnValue::Float(_) => "float",
            ColumnValue::Double(_) => "double",
            ColumnValue::Boolean(_) => "boolean",
            ColumnValue::Blob(_) => "blob",
            ColumnValue::Uuid(_) => "uuid",
            ColumnValue::Timestamp(_) => "timestamp",
            ColumnValue::List(_) => "list",
            ColumnValue::Map(_) => "map",
            ColumnValue::Null => "null",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            ColumnValue::Text(s) => Value::String(s.clone()),
            ColumnValue::Int(i) => Value::from(*i),
            ColumnValue::BigInt(i) | ColumnValue::Timestamp(i) => Value::from(*i),
            ColumnValue::Float(f) => Value::from(*f),
            ColumnValue::Double(f) => Value::from(*f),
            ColumnValue::Boolean(b) => Value::Bool(*b),
            ColumnValue::Blob(bytes) => Value::from(bytes.clone()),
            ColumnValue::Uuid(id) => Value::String(id.to_string()),
            ColumnValue::List(items) => Value::Array(items.iter().map(ColumnValue::to_json).collect()),
            ColumnValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            ColumnValue::Null => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub type_name: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Column metadata of a result, shared by every row of that result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinitions {
    pub columns: Vec<ColumnSpec>,
}

impl ColumnDefinitions {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<ColumnDefinitions>,
    values: Vec<ColumnValue>,
}

impl Row {
    pub fn new(columns: Arc<ColumnDefinitions>, values: Vec<ColumnValue>) -> Self {
        Self { columns, values }
    }

    pub fn column_definitions(&self) -> &ColumnDefinitions {
        &self.columns
    }

    pub fn values(&self) -> &[ColumnValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_by_index(&self, index: usize) -> Option<&ColumnValue> {
        self.values.get(index)
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// The conditional-write flag, if this row carries one.
    pub fn applied(&self) -> Option<bool> {
        match self.get(APPLIED_COLUMN) {
            Some(ColumnValue::Boolean(applied)) => Some(*applied),
            _ => None,
        }
    }

    /// True when the row is a conditional-write response holding nothing
    /// but the `[applied]` column.
    pub fn is_applied_only(&self) -> bool {
        self.columns.len() == 1 && self.columns.columns[0].name == APPLIED_COLUMN
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.columns
                .columns
                .iter()
                .zip(self.values.iter())
                .map(|(spec, value)| (spec.name.clone(), value.to_json()))
                .collect(),
        )
    }
}

/// Per-page execution metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionInfo {
    pub page: u32,
    pub tracing_id: Option<Uuid>,
    pub warnings: Vec<String>,
    pub has_more_pages: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub query: String,
    pub values: Vec<ColumnValue>,
    pub page_size: Option<u32>,
    pub tracing: bool,
}

impl Statement {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            values: Vec::new(),
            page_size: None,
            tracing: false,
        }
    }

    pub fn with_values(mut self, values: Vec<ColumnValue>) -> Self {
        self.values = values;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }
}
