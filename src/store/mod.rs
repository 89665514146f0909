//! Column store access
//!
//! The pipeline only talks to [`Store`] and [`BatchHandle`]. [`ClickHouse`]
//! implements them over the HTTP interface.

pub mod clickhouse;
#[cfg(test)]
pub(crate) mod memory;

pub use clickhouse::{ClickHouse, Endpoint};

use crate::error::Result;
use crate::types::Value;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};

/// One cell of an output row
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Network(String),
    Pointer(u64),
    Value(Value),
    Partition(NaiveDate),
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Cell::Network(s) => serializer.serialize_str(s),
            Cell::Pointer(p) => serializer.serialize_u64(*p),
            Cell::Value(v) => v.serialize(serializer),
            Cell::Partition(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
        }
    }
}

/// Row tuple, in the column order of the target table's schema
pub type Row = Vec<Cell>;

/// Named query parameter, bound to a `{name:Type}` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Param {
    pub fn named(name: &str, value: impl ToString) -> Self {
        Param {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

pub trait Store {
    /// Run a statement that returns no rows
    fn execute(&self, sql: &str, params: &[Param]) -> Result<()>;

    /// Start an insert batch for `table`
    fn prepare_batch(&self, table: &str) -> Result<Box<dyn BatchHandle + '_>>;

    /// Run a query returning a single value, as text
    fn query_scalar(&self, sql: &str) -> Result<String>;
}

/// Rows staged for one insert into one table
pub trait BatchHandle {
    fn append(&mut self, row: Row) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert the staged rows, consuming the batch
    fn send(self: Box<Self>) -> Result<()>;
}
