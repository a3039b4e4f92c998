//! Gridfeed Core: warehouse fetches and daily summary tables for spreadsheet cells.
//!
//! This crate contains:
//! - Domain types (cells, raw datasets, output grids)
//! - Warehouse access with scoped sessions (BigQuery REST, in-memory)
//! - The fixed fetch queries and the layoffs report
//! - The real-estate aggregator that builds wide daily summary tables
//! - Local CSV/Parquet ingest and TOML configuration

pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod layoffs;
pub mod summary;
pub mod warehouse;

pub use config::GridfeedConfig;
pub use data::Metric;
pub use domain::{Cell, CellOutput, Grid, RawDataset};
pub use error::{ErrorKind, GridError};
pub use fetch::{fetch, QueryName};
pub use summary::{summarize, SummaryTable};
pub use warehouse::{ScopedSession, Session, Warehouse};
