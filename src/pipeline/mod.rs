//! Network enumeration into batched table inserts
//!
//! The pipeline walks every network of the source once. In the deduplicated
//! layout each network becomes a `(network, pointer, partition)` row and
//! each distinct payload a `(pointer, attributes..., partition)` row; in the
//! inline layout each network carries its attributes directly.
//!
//! Both batches are flushed together every `batch_size` networks and once
//! more when the enumeration ends.

pub mod batch;

pub use batch::Batch;

use crate::dedupe::PointerIndex;
use crate::error::{IngestError, Result};
use crate::flatten::flatten;
use crate::mmdb::Source;
use crate::schema::Schema;
use crate::store::{Cell, Row, Store};
use crate::types::{AttributeRecord, Column, Value};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::info;

/// Row counts of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Rows sent to the network table
    pub networks: u64,
    /// Rows sent to the value table (distinct payloads)
    pub values: u64,
    /// Number of flushes, the final one included
    pub flushes: u64,
}

pub struct BatchPipeline<'a> {
    source: &'a dyn Source,
    store: &'a dyn Store,
    partition: NaiveDate,
    batch_size: u64,
}

impl<'a> BatchPipeline<'a> {
    pub fn new(
        source: &'a dyn Source,
        store: &'a dyn Store,
        partition: NaiveDate,
        batch_size: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(IngestError::Config("batch size must be positive".to_string()));
        }
        Ok(BatchPipeline {
            source,
            store,
            partition,
            batch_size: batch_size as u64,
        })
    }

    /// Load the network and value tables.
    ///
    /// Returns the run's pointer index alongside the counts so callers can
    /// check individual assignments after the load.
    pub fn run_deduplicated(
        &self,
        network_table: &str,
        value_table: &str,
        value_schema: &Schema,
    ) -> Result<(IngestStats, PointerIndex)> {
        let mut index = PointerIndex::new();
        let mut stats = IngestStats::default();
        let mut networks = Batch::new(self.store, network_table)?;
        let mut values = Batch::new(self.store, value_table)?;

        let mut cursor = self.source.networks(true)?;
        while let Some(network) = cursor.next() {
            let (pointer, is_new) = index.resolve(network.offset);
            if is_new {
                let record = cursor.record()?;
                let mut row = Vec::with_capacity(value_schema.len());
                row.push(Cell::Pointer(pointer));
                row.extend(project(&record, value_schema.value_columns())?);
                row.push(Cell::Partition(self.partition));
                values.append(row)?;
                stats.values += 1;
            }

            networks.append(vec![
                Cell::Network(network.prefix.to_string()),
                Cell::Pointer(pointer),
                Cell::Partition(self.partition),
            ])?;
            stats.networks += 1;

            if stats.networks % self.batch_size == 0 {
                // Values first: a stored network row never points at an unsent value
                values.flush()?;
                networks.flush()?;
                stats.flushes += 1;
                info!("Inserted {} networks and {} values", stats.networks, stats.values);
            }
        }
        cursor.finish()?;

        values.finish()?;
        networks.finish()?;
        stats.flushes += 1;
        info!("Inserted {} networks and {} values", stats.networks, stats.values);

        Ok((stats, index))
    }

    /// Load a single table with the attributes inlined on every network row
    pub fn run_inline(&self, table: &str, schema: &Schema) -> Result<IngestStats> {
        let mut stats = IngestStats::default();
        let mut rows = Batch::new(self.store, table)?;

        let mut cursor = self.source.networks(true)?;
        while let Some(network) = cursor.next() {
            let record = cursor.record()?;
            let mut row = Vec::with_capacity(schema.len());
            row.push(Cell::Network(network.prefix.to_string()));
            row.extend(project(&record, schema.value_columns())?);
            row.push(Cell::Partition(self.partition));
            rows.append(row)?;
            stats.networks += 1;

            if stats.networks % self.batch_size == 0 {
                rows.flush()?;
                stats.flushes += 1;
                info!("Inserted {} rows", stats.networks);
            }
        }
        cursor.finish()?;

        rows.finish()?;
        stats.flushes += 1;
        info!("Inserted {} rows", stats.networks);

        Ok(stats)
    }
}

/// Pull `columns` out of a record by flattened name, in column order
pub fn project(record: &AttributeRecord, columns: &[Column]) -> Result<Row> {
    let mut flat: HashMap<String, &Value> = HashMap::new();
    for (path, value) in flatten(record) {
        if flat.contains_key(&path) && columns.iter().any(|c| c.name == path) {
            return Err(IngestError::DuplicateColumn { path });
        }
        flat.insert(path, value);
    }
    columns
        .iter()
        .map(|column| {
            flat.get(&column.name)
                .map(|value| Cell::Value((*value).clone()))
                .ok_or_else(|| IngestError::Projection {
                    column: column.name.clone(),
                })
        })
        .collect()
}
