//! Warehouse access behind a small trait pair.
//!
//! A [`Warehouse`] hands out sessions; a [`Session`] runs SQL and
//! materializes the result. Callers go through [`ScopedSession`], which
//! releases the session when it goes out of scope on every exit path.

pub mod bigquery;
pub mod credentials;
pub mod memory;

pub use bigquery::BigQueryWarehouse;
pub use credentials::{EnvToken, ServiceAccountKey, StaticToken, TokenSource};
pub use memory::InMemoryWarehouse;

use crate::domain::RawDataset;
use crate::error::GridError;
use tracing::debug;

/// Source of warehouse sessions.
///
/// Implementations are constructed explicitly and passed in by the caller;
/// there is no process-wide connection.
pub trait Warehouse: Send + Sync {
    /// Human-readable name of this warehouse.
    fn name(&self) -> &str;

    /// Open a new session.
    fn connect(&self) -> Result<Box<dyn Session + '_>, GridError>;
}

/// One open connection to a warehouse.
pub trait Session {
    /// Run a query and materialize every result row in memory.
    fn query(&mut self, sql: &str) -> Result<RawDataset, GridError>;

    /// Release the session. Called exactly once by [`ScopedSession`].
    fn release(&mut self);
}

/// A session that is released when dropped.
pub struct ScopedSession<'a> {
    inner: Box<dyn Session + 'a>,
    warehouse: &'a str,
}

impl<'a> ScopedSession<'a> {
    pub fn open(warehouse: &'a dyn Warehouse) -> Result<Self, GridError> {
        let inner = warehouse.connect()?;
        debug!(warehouse = warehouse.name(), "session opened");
        Ok(Self {
            inner,
            warehouse: warehouse.name(),
        })
    }

    pub fn query(&mut self, sql: &str) -> Result<RawDataset, GridError> {
        self.inner.query(sql)
    }
}

impl Drop for ScopedSession<'_> {
    fn drop(&mut self) {
        self.inner.release();
        debug!(warehouse = self.warehouse, "session released");
    }
}
