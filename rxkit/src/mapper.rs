use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ReactiveError;
use crate::types::{ColumnValue, Row};

/// Converts result rows into domain entities.
pub trait EntityMapper<E>: Send + Sync {
    fn map_row(&self, row: &Row) -> Result<E, ReactiveError>;
}

impl<E, F> EntityMapper<E> for F
where
    F: Fn(&Row) -> Result<E, ReactiveError> + Send + Sync,
{
    fn map_row(&self, row: &Row) -> Result<E, ReactiveError> {
        self(row)
    }
}

/// Maps `row` unless it is a bare conditional-write acknowledgement, which
/// carries no entity.
pub fn map_entity<E>(mapper: &dyn EntityMapper<E>, row: &Row) -> Result<Option<E>, ReactiveError> {
    if row.is_applied_only() {
        return Ok(None);
    }
    mapper.map_row(row).map(Some)
}

/// Graph query result node.
///
/// Graph queries return either a single text column holding a serialized
/// JSON value, or ordinary columns which are folded into a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub value: Value,
}

impl GraphNode {
    pub fn from_row(row: &Row) -> Result<Self, ReactiveError> {
        if let [ColumnValue::Text(json)] = row.values() {
            let value = serde_json::from_str(json)?;
            return Ok(Self { value });
        }
        Ok(Self {
            value: row.to_json(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}
