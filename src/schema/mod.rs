//! Column schemas for the ingested tables
//!
//! A schema is always `key, inferred columns..., partition`. The key column
//! is chosen by the table's role; the middle columns come from
//! [`infer_schema`] run over a sample record.

pub mod inference;

pub use inference::{infer_schema, kind_of};

use crate::types::Column;
use serde::Serialize;

/// Ordered, name-unique list of columns for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub(crate) fn from_columns(columns: Vec<Column>) -> Self {
        Schema { columns }
    }

    /// Same inferred columns under a different key column
    pub fn with_key(&self, key: Column) -> Self {
        let mut columns = Vec::with_capacity(self.columns.len());
        columns.push(key);
        columns.extend(self.value_columns().iter().cloned());
        columns.push(Column::partition());
        Schema { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn key(&self) -> &Column {
        &self.columns[0]
    }

    /// The inferred columns, without the key and the trailing partition
    pub fn value_columns(&self) -> &[Column] {
        let end = self.columns.len().saturating_sub(1).max(1);
        &self.columns[1..end]
    }

    /// Render as a column list for `CREATE TABLE` / `CREATE DICTIONARY`
    pub fn to_sql(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("`{}` {}", c.name, c.kind))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Two-column schema of the network table in the deduplicated layout
pub fn network_schema() -> Schema {
    Schema::from_columns(vec![Column::network(), Column::pointer(), Column::partition()])
}
