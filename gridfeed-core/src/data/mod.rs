//! Raw feed ingestion, validation, and daily alignment

pub mod align;
pub mod canonicalize;
pub mod ingest;
pub mod schema;

pub use align::{DailySeries, AVERAGE, MAX_SPAN_DAYS};
pub use canonicalize::{Canonicalizer, Observation};
pub use ingest::{dataframe_to_dataset, DataIngestor};
pub use schema::{Metric, RealEstateSchema, SchemaError};
