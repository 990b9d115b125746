// Conversions between ColumnValue and the driver's CqlValue.

use std::collections::HashMap;

use scylla::frame::response::result::{ColumnType, CqlValue};
use scylla::frame::value::CqlTimestamp;

use crate::errors::DriverError;
use crate::types::ColumnValue;

/// Bind value for the driver. `Null` binds as an unset-to-null `None`.
pub fn to_cql_value(value: &ColumnValue) -> Result<Option<CqlValue>, DriverError> {
    let cql = match value {
        ColumnValue::Text(s) => CqlValue::Text(s.clone()),
        ColumnValue::Int(i) => CqlValue::Int(*i),
        ColumnValue::BigInt(i) => CqlValue::BigInt(*i),
        ColumnValue::Float(f) => CqlValue::Float(*f),
        ColumnValue::Double(f) => CqlValue::Double(*f),
        ColumnValue::Boolean(b) => CqlValue::Boolean(*b),
        ColumnValue::Blob(bytes) => CqlValue::Blob(bytes.clone()),
        ColumnValue::Uuid(id) => CqlValue::Uuid(*id),
        ColumnValue::Timestamp(millis) => CqlValue::Timestamp(CqlTimestamp(*millis)),
        ColumnValue::List(items) => CqlValue::List(
            items
                .iter()
                .map(|item| {
                    to_cql_value(item)?.ok_or_else(|| {
                        DriverError::Validation("Null element in list value".to_string())
                    })
                })
                .collect::<Result<_, _>>()?,
        ),
        ColumnValue::Map(entries) => CqlValue::Map(
            entries
                .iter()
                .map(|(key, item)| {
                    let item = to_cql_value(item)?.ok_or_else(|| {
                        DriverError::Validation(format!("Null value for map key '{}'", key))
                    })?;
                    Ok((CqlValue::Text(key.clone()), item))
                })
                .collect::<Result<_, DriverError>>()?,
        ),
        ColumnValue::Null => return Ok(None),
    };
    Ok(Some(cql))
}

/// Result value from the driver. Types without a dedicated variant are
/// rendered as text.
pub fn from_cql_value(value: Option<CqlValue>) -> ColumnValue {
    let Some(value) = value else {
        return ColumnValue::Null;
    };
    match value {
        CqlValue::Ascii(s) | CqlValue::Text(s) => ColumnValue::Text(s),
        CqlValue::Boolean(b) => ColumnValue::Boolean(b),
        CqlValue::Blob(bytes) => ColumnValue::Blob(bytes),
        CqlValue::Counter(counter) => ColumnValue::BigInt(counter.0),
        CqlValue::Double(f) => ColumnValue::Double(f),
        CqlValue::Float(f) => ColumnValue::Float(f),
        CqlValue::Int(i) => ColumnValue::Int(i),
        CqlValue::BigInt(i) => ColumnValue::BigInt(i),
        CqlValue::SmallInt(i) => ColumnValue::Int(i32::from(i)),
        CqlValue::TinyInt(i) => ColumnValue::Int(i32::from(i)),
        CqlValue::Timestamp(ts) => ColumnValue::Timestamp(ts.0),
        CqlValue::Uuid(id) => ColumnValue::Uuid(id),
        CqlValue::List(items) | CqlValue::Set(items) => {
            ColumnValue::List(items.into_iter().map(|item| from_cql_value(Some(item))).collect())
        }
        CqlValue::Map(entries) => ColumnValue::Map(
            entries
                .into_iter()
                .map(|(key, item)| (map_key(key), from_cql_value(Some(item))))
                .collect::<HashMap<_, _>>(),
        ),
        CqlValue::Empty => ColumnValue::Null,
        other => ColumnValue::Text(format!("{:?}", other)),
    }
}

fn map_key(key: CqlValue) -> String {
    match from_cql_value(Some(key)) {
        ColumnValue::Text(s) => s,
        other => other.to_json().to_string(),
    }
}

/// Lower-case CQL name of a column type.
pub(crate) fn column_type_name(typ: &ColumnType) -> String {
    match typ {
        ColumnType::List(_) => "list".to_string(),
        ColumnType::Set(_) => "set".to_string(),
        ColumnType::Map(_, _) => "map".to_string(),
        ColumnType::Tuple(_) => "tuple".to_string(),
        ColumnType::UserDefinedType { type_name, .. } => type_name.clone(),
        other => format!("{:?}", other).to_lowercase(),
    }
}
