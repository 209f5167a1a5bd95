//! Counter accessor: the three statements the scenario issues
//!
//! Visibility is entirely the store's business; this layer only turns
//! "no row" into [`Error::CounterNotFound`] and commits initialization.

use tally_core::{CommitOutcome, CounterName, Error, Result, StoreConnection};
use tracing::debug;

/// Accessor for one named counter row
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Counter {
    name: CounterName,
}

impl Counter {
    /// Accessor for the row named `name`
    pub fn new(name: CounterName) -> Self {
        Counter { name }
    }

    /// Row name
    pub fn name(&self) -> &CounterName {
        &self.name
    }

    /// Ensure the row exists and equals `baseline`, committed as its own unit of work
    ///
    /// Idempotent: running it twice leaves the row at `baseline`.
    pub fn initialize<C: StoreConnection>(&self, conn: &mut C, baseline: i64) -> Result<i64> {
        let stored = conn.upsert(&self.name, baseline)?;
        match conn.commit()? {
            CommitOutcome::Committed => {
                debug!(counter = %self.name, value = stored, "counter initialized");
                Ok(stored)
            }
            CommitOutcome::RolledBack => Err(Error::InvalidOperation(format!(
                "initialization of counter '{}' was rolled back",
                self.name
            ))),
        }
    }

    /// Value visible to the connection's transaction
    pub fn read<C: StoreConnection>(&self, conn: &mut C) -> Result<i64> {
        conn.read(&self.name)?
            .ok_or_else(|| Error::CounterNotFound(self.name.to_string()))
    }

    /// Write `value` inside the connection's transaction, returning the stored value
    pub fn update<C: StoreConnection>(&self, conn: &mut C, value: i64) -> Result<i64> {
        conn.update(&self.name, value)?
            .ok_or_else(|| Error::CounterNotFound(self.name.to_string()))
    }
}
