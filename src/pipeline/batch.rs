use crate::error::{IngestError, Result};
use crate::store::{BatchHandle, Row, Store};
use tracing::debug;

/// Rows staged for one table between two flushes.
///
/// A flush sends everything staged so far and starts over with a fresh,
/// empty batch, so no row is ever held across a flush.
pub struct Batch<'s> {
    store: &'s dyn Store,
    table: String,
    handle: Option<Box<dyn BatchHandle + 's>>,
}

impl<'s> Batch<'s> {
    pub fn new(store: &'s dyn Store, table: &str) -> Result<Self> {
        Ok(Batch {
            store,
            table: table.to_string(),
            handle: Some(store.prepare_batch(table)?),
        })
    }

    pub fn append(&mut self, row: Row) -> Result<()> {
        self.handle
            .as_mut()
            .ok_or_else(|| IngestError::Storage(format!("batch for {} was already sent", self.table)))?
            .append(row)
    }

    /// Send the staged rows and start a fresh batch
    pub fn flush(&mut self) -> Result<()> {
        self.send_staged()?;
        self.handle = Some(self.store.prepare_batch(&self.table)?);
        Ok(())
    }

    /// Send the staged rows, even if there are none
    pub fn finish(mut self) -> Result<()> {
        self.send_staged()
    }

    fn send_staged(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            let rows = handle.len();
            handle.send()?;
            debug!("Sent {} rows to {}", rows, self.table);
        }
        Ok(())
    }
}
