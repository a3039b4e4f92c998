use crate::domain::{Cell, RawDataset};
use crate::error::GridError;
use chrono::{DateTime, NaiveDate};
use polars::prelude::*;
use std::path::Path;

/// Loads raw datasets from local CSV and Parquet exports of warehouse tables.
pub struct DataIngestor;

impl DataIngestor {
    /// Ingest a file, choosing the reader from its extension.
    pub fn ingest_path(path: &Path) -> Result<RawDataset, GridError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("parquet") => Self::ingest_parquet(path),
            Some("csv") | Some("txt") => Self::ingest_csv(path),
            other => Err(GridError::Ingest(format!(
                "unsupported file extension {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }

    /// Ingest CSV file
    pub fn ingest_csv(path: &Path) -> Result<RawDataset, GridError> {
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_try_parse_dates(true)
            .finish()
            .and_then(|lf| lf.collect())
            .map_err(|e| GridError::Ingest(format!("{}: {e}", path.display())))?;
        dataframe_to_dataset(&df)
    }

    /// Ingest Parquet file
    pub fn ingest_parquet(path: &Path) -> Result<RawDataset, GridError> {
        let df = LazyFrame::scan_parquet(path, Default::default())
            .and_then(|lf| lf.collect())
            .map_err(|e| GridError::Ingest(format!("{}: {e}", path.display())))?;
        dataframe_to_dataset(&df)
    }
}

/// Convert a Polars DataFrame to a raw dataset, column by column.
pub fn dataframe_to_dataset(df: &DataFrame) -> Result<RawDataset, GridError> {
    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    let mut cells_by_column = Vec::with_capacity(columns.len());
    for column in df.get_columns() {
        cells_by_column.push(column_cells(column)?);
    }

    let rows: Vec<Vec<Cell>> = (0..df.height())
        .map(|i| cells_by_column.iter().map(|col| col[i].clone()).collect())
        .collect();

    RawDataset::from_rows(columns, rows).map_err(GridError::Ingest)
}

fn column_cells(column: &Column) -> Result<Vec<Cell>, GridError> {
    let name = column.name().to_string();
    let err = |e: PolarsError| GridError::Ingest(format!("column '{name}': {e}"));

    let cells = match column.dtype() {
        DataType::Boolean => column
            .bool()
            .map_err(err)?
            .into_iter()
            .map(|v| v.map(Cell::Bool).unwrap_or(Cell::Null))
            .collect(),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => column
            .cast(&DataType::Int64)
            .map_err(err)?
            .i64()
            .map_err(err)?
            .into_iter()
            .map(|v| v.map(Cell::Int).unwrap_or(Cell::Null))
            .collect(),
        DataType::UInt64 | DataType::Float32 | DataType::Float64 => column
            .cast(&DataType::Float64)
            .map_err(err)?
            .f64()
            .map_err(err)?
            .into_iter()
            .map(Cell::from_f64)
            .collect(),
        DataType::Date => {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
            column
                .cast(&DataType::Int32)
                .map_err(err)?
                .i32()
                .map_err(err)?
                .into_iter()
                .map(|v| {
                    v.map(|days| Cell::Date(epoch + chrono::Duration::days(days as i64)))
                        .unwrap_or(Cell::Null)
                })
                .collect()
        }
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            column
                .cast(&DataType::Int64)
                .map_err(err)?
                .i64()
                .map_err(err)?
                .into_iter()
                .map(|v| {
                    v.and_then(|raw| {
                        let micros = match unit {
                            TimeUnit::Nanoseconds => raw / 1_000,
                            TimeUnit::Microseconds => raw,
                            TimeUnit::Milliseconds => raw * 1_000,
                        };
                        DateTime::from_timestamp_micros(micros).map(|t| Cell::Timestamp(t.naive_utc()))
                    })
                    .unwrap_or(Cell::Null)
                })
                .collect()
        }
        _ => column
            .cast(&DataType::String)
            .map_err(err)?
            .str()
            .map_err(err)?
            .into_iter()
            .map(|v| v.map(|s| Cell::Text(s.to_string())).unwrap_or(Cell::Null))
            .collect(),
    };
    Ok(cells)
}
