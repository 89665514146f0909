//! In-memory store that records every statement and sent batch

use super::{BatchHandle, Cell, Param, Row, Store};
use crate::error::{IngestError, Result};
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Default)]
pub(crate) struct MemoryStore {
    pub executed: RefCell<Vec<(String, Vec<Param>)>>,
    /// Every send, in order: (table, rows)
    pub sent: RefCell<Vec<(String, Vec<Row>)>>,
    /// Canned answers for `query_scalar`, matched by substring
    pub answers: HashMap<String, String>,
    /// Fail the n-th send (0-based)
    pub fail_send: Option<usize>,
    /// Rows currently held per table; `DROP PARTITION` removes them
    pub tables: RefCell<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn rows_for(&self, table: &str) -> Vec<Row> {
        self.sent
            .borrow()
            .iter()
            .filter(|(t, _)| t == table)
            .flat_map(|(_, rows)| rows.clone())
            .collect()
    }

    pub fn sends_for(&self, table: &str) -> Vec<usize> {
        self.sent
            .borrow()
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, rows)| rows.len())
            .collect()
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed.borrow().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn stored(&self, table: &str) -> Vec<Row> {
        self.tables.borrow().get(table).cloned().unwrap_or_default()
    }

    fn drop_partition(&self, params: &[Param]) {
        let param = |name: &str| params.iter().find(|p| p.name == name).map(|p| p.value.clone());
        let (Some(table), Some(partition)) = (param("name"), param("partition")) else {
            return;
        };
        let Ok(partition) = NaiveDate::parse_from_str(&partition, "%Y-%m-%d") else {
            return;
        };
        if let Some(rows) = self.tables.borrow_mut().get_mut(&table) {
            rows.retain(|row| row.last() != Some(&Cell::Partition(partition)));
        }
    }
}

impl Store for MemoryStore {
    fn execute(&self, sql: &str, params: &[Param]) -> Result<()> {
        if sql.contains("DROP PARTITION") {
            self.drop_partition(params);
        }
        self.executed
            .borrow_mut()
            .push((sql.to_string(), params.to_vec()));
        Ok(())
    }

    fn prepare_batch(&self, table: &str) -> Result<Box<dyn BatchHandle + '_>> {
        Ok(Box::new(MemoryBatch {
            store: self,
            table: table.to_string(),
            rows: Vec::new(),
        }))
    }

    fn query_scalar(&self, sql: &str) -> Result<String> {
        self.answers
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, answer)| answer.clone())
            .ok_or_else(|| IngestError::Storage(format!("no answer for {}", sql)))
    }
}

struct MemoryBatch<'a> {
    store: &'a MemoryStore,
    table: String,
    rows: Vec<Row>,
}

impl BatchHandle for MemoryBatch<'_> {
    fn append(&mut self, row: Row) -> Result<()> {
        self.rows.push(row);
        Ok(())
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn send(self: Box<Self>) -> Result<()> {
        let MemoryBatch { store, table, rows } = *self;
        let mut sent = store.sent.borrow_mut();
        if store.fail_send == Some(sent.len()) {
            return Err(IngestError::Storage("send refused".to_string()));
        }
        store
            .tables
            .borrow_mut()
            .entry(table.clone())
            .or_default()
            .extend(rows.iter().cloned());
        sent.push((table, rows));
        Ok(())
    }
}
