//! A warehouse backed by datasets held in memory.
//!
//! Serves pre-loaded datasets instead of executing SQL: a query is answered
//! with the table whose reference appears in the query text, or with the
//! fallback dataset. Used for local files and for tests.

use super::{Session, Warehouse};
use crate::domain::RawDataset;
use crate::error::GridError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
enum Failure {
    Connect(String),
    Query(String),
}

/// In-memory warehouse with session accounting.
#[derive(Debug, Default)]
pub struct InMemoryWarehouse {
    tables: BTreeMap<String, RawDataset>,
    fallback: Option<RawDataset>,
    failure: Option<Failure>,
    opened: AtomicUsize,
    released: AtomicUsize,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// A warehouse that answers every query with `dataset`.
    pub fn serving(dataset: RawDataset) -> Self {
        Self {
            fallback: Some(dataset),
            ..Self::default()
        }
    }

    /// Register a dataset under a table reference such as `project.dataset.table`.
    pub fn with_table(mut self, table_ref: impl Into<String>, dataset: RawDataset) -> Self {
        self.tables.insert(table_ref.into(), dataset);
        self
    }

    /// A warehouse whose sessions cannot be opened.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(Failure::Connect(reason.into())),
            ..Self::default()
        }
    }

    /// A warehouse whose queries always fail after the session opens.
    pub fn failing_queries(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(Failure::Query(reason.into())),
            ..Self::default()
        }
    }

    /// Number of sessions opened so far.
    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of sessions opened but not yet released.
    pub fn open_sessions(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }

    fn resolve(&self, sql: &str) -> Option<&RawDataset> {
        self.tables
            .iter()
            .find(|(table_ref, _)| sql.contains(table_ref.as_str()))
            .map(|(_, ds)| ds)
            .or(self.fallback.as_ref())
    }
}

impl Warehouse for InMemoryWarehouse {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn connect(&self) -> Result<Box<dyn Session + '_>, GridError> {
        if let Some(Failure::Connect(reason)) = &self.failure {
            return Err(GridError::Connection(reason.clone()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemorySession {
            warehouse: self,
            released: false,
        }))
    }
}

struct InMemorySession<'a> {
    warehouse: &'a InMemoryWarehouse,
    released: bool,
}

impl Session for InMemorySession<'_> {
    fn query(&mut self, sql: &str) -> Result<RawDataset, GridError> {
        if let Some(Failure::Query(reason)) = &self.warehouse.failure {
            return Err(GridError::Query(reason.clone()));
        }
        self.warehouse
            .resolve(sql)
            .cloned()
            .ok_or_else(|| GridError::Query(format!("no table matches query: {}", sql.trim())))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.warehouse.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}
