//! Column type inference from a sample record
//!
//! The sample is flattened, optionally filtered by an allow-list, and each
//! leaf is mapped to a column type. Kinds with no column type abort the
//! whole inference.

use super::Schema;
use crate::error::{IngestError, Result};
use crate::flatten::flatten;
use crate::types::{AttributeRecord, Column, ColumnKind, Value, PARTITION_COLUMN};
use std::collections::HashSet;
use tracing::warn;

/// Infer a table schema from one sample record
///
/// # Arguments
/// * `sample` - Decoded record representative of the whole database
/// * `key` - Leading key column, chosen by the table's role
/// * `allow_list` - Flattened paths to keep; `None` or empty keeps every leaf
///
/// # Returns
/// `key, inferred..., partition` in flattened (sorted-key) order, or
/// [`IngestError::Schema`] naming the first leaf with an unsupported kind.
pub fn infer_schema(
    sample: &AttributeRecord,
    key: Column,
    allow_list: Option<&HashSet<String>>,
) -> Result<Schema> {
    let allow_list = allow_list.filter(|set| !set.is_empty());
    let leaves = flatten(sample);

    let mut names: HashSet<&str> = HashSet::from([key.name.as_str(), PARTITION_COLUMN]);
    let mut columns = Vec::with_capacity(leaves.len() + 2);
    for (path, value) in &leaves {
        if let Some(allowed) = allow_list {
            if !allowed.contains(path) {
                continue;
            }
        }
        if !names.insert(path.as_str()) {
            return Err(IngestError::DuplicateColumn { path: path.clone() });
        }
        let kind = kind_of(value).ok_or_else(|| IngestError::Schema {
            path: path.clone(),
            kind: value.kind_name(),
        })?;
        columns.push(Column::new(path.clone(), kind));
    }
    columns.insert(0, key);
    columns.push(Column::partition());

    if let Some(allowed) = allow_list {
        let mut unknown: Vec<&String> = allowed
            .iter()
            .filter(|name| !leaves.iter().any(|(path, _)| path == *name))
            .collect();
        unknown.sort();
        for name in unknown {
            warn!("Column {} is not present in the sample record", name);
        }
    }

    Ok(Schema::from_columns(columns))
}

/// Column type for a leaf value, or `None` for kinds that have no column type
pub fn kind_of(value: &Value) -> Option<ColumnKind> {
    match value {
        Value::Bool(_) => Some(ColumnKind::Boolean),
        Value::Bytes(_) => Some(ColumnKind::String),
        Value::Text(_) => Some(ColumnKind::String),
        Value::U16(_) => Some(ColumnKind::UInt16),
        Value::U32(_) => Some(ColumnKind::UInt32),
        Value::I32(_) => Some(ColumnKind::Int32),
        Value::U64(_) => Some(ColumnKind::UInt64),
        Value::U128(_) => Some(ColumnKind::UInt128),
        Value::F32(_) => Some(ColumnKind::Float32),
        Value::F64(_) => Some(ColumnKind::Float64),
        Value::Map(_) | Value::Array(_) => None,
    }
}
