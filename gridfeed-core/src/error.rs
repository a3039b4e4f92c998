//! Structured error types shared by the fetcher, the aggregator, and the
//! function registry.
//!
//! Every variant renders to a readable one-line message because at the host
//! boundary each error is shown as text in the calling cell.

use crate::data::schema::SchemaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("query '{query}' returned no rows")]
    EmptyResult { query: String },

    #[error("unexpected warehouse response: {0}")]
    ResponseFormat(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("no rows to summarize")]
    EmptyInput,

    #[error("transform failed: {0}")]
    Transform(String),

    #[error("ingest failed: {0}")]
    Ingest(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("output failed: {0}")]
    Output(String),
}

/// Coarse failure taxonomy: where in the pipeline an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectionFailure,
    QueryFailure,
    TransformFailure,
}

impl GridError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GridError::Connection(_) | GridError::Authentication(_) | GridError::Config(_) => {
                ErrorKind::ConnectionFailure
            }
            GridError::Query(_) | GridError::EmptyResult { .. } | GridError::ResponseFormat(_) => {
                ErrorKind::QueryFailure
            }
            GridError::Schema(_)
            | GridError::EmptyInput
            | GridError::Transform(_)
            | GridError::Ingest(_)
            | GridError::Argument(_)
            | GridError::UnknownFunction { .. }
            | GridError::Output(_) => ErrorKind::TransformFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_pipeline_stage() {
        assert_eq!(
            GridError::Connection("refused".into()).kind(),
            ErrorKind::ConnectionFailure
        );
        assert_eq!(
            GridError::EmptyResult { query: "layoffs".into() }.kind(),
            ErrorKind::QueryFailure
        );
        assert_eq!(GridError::EmptyInput.kind(), ErrorKind::TransformFailure);
    }

    #[test]
    fn messages_carry_the_cause() {
        let e = GridError::Connection("dns lookup failed for bigquery.googleapis.com".into());
        assert_eq!(
            e.to_string(),
            "connection failed: dns lookup failed for bigquery.googleapis.com"
        );
        let e = GridError::Schema(SchemaError::MissingColumn("avg_usd_yr".into()));
        assert!(e.to_string().contains("avg_usd_yr"));
    }
}
