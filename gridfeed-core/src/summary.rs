//! Daily summary of a real-estate metric across properties.
//!
//! `summarize` turns the denormalized snapshot feed into a wide table: one
//! row per property (plus the cross-property `average`), one column per
//! calendar day, and a trailing `diff` between the last and first day.
//!
//! Pipeline, in order:
//! 1. sanitize metric columns (zero → missing)
//! 2. normalize load times to calendar dates
//! 3. drop exact duplicate rows
//! 4. collapse to the last value per `(address, date)`
//! 5. pivot and resample to a gap-free daily axis
//! 6. add the `average` column
//! 7. backward-fill gaps
//! 8. transpose, drop incomplete rows, round, sort, and append `diff`

use crate::data::{Canonicalizer, DailySeries, Metric, RealEstateSchema};
use crate::domain::{Cell, Grid, RawDataset};
use crate::error::GridError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{debug, warn};

/// Name of the index column in the rendered table.
pub const INDEX_COLUMN: &str = "address";
/// Name of the trailing last-minus-first column.
pub const DIFF_COLUMN: &str = "diff";

/// One property's complete daily history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub address: String,
    /// One value per date column, rounded to 2 decimals.
    pub values: Vec<f64>,
    pub diff: f64,
}

/// Wide, gap-free, sorted summary of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryTable {
    pub metric: Metric,
    /// Date columns, ascending.
    pub dates: Vec<NaiveDate>,
    /// Rows sorted descending by the most recent date's value.
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, address: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.address == address)
    }

    /// Value for a property on a date, if both exist in the table.
    pub fn value(&self, address: &str, date: NaiveDate) -> Option<f64> {
        let d = self.dates.iter().position(|x| *x == date)?;
        self.row(address).map(|r| r.values[d])
    }

    /// Column headers: `address`, each date as `YYYY-MM-DD`, then `diff`.
    pub fn header(&self) -> Vec<String> {
        std::iter::once(INDEX_COLUMN.to_string())
            .chain(self.dates.iter().map(|d| d.format("%Y-%m-%d").to_string()))
            .chain(std::iter::once(DIFF_COLUMN.to_string()))
            .collect()
    }

    pub fn to_grid(&self) -> Grid {
        let rows = self
            .rows
            .iter()
            .map(|r| {
                std::iter::once(Cell::Text(r.address.clone()))
                    .chain(r.values.iter().map(|v| Cell::Float(*v)))
                    .chain(std::iter::once(Cell::Float(r.diff)))
                    .collect()
            })
            .collect();
        Grid::with_header(self.header(), rows)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), GridError> {
        self.to_grid().write_csv(writer)
    }
}

impl From<SummaryTable> for Grid {
    fn from(table: SummaryTable) -> Self {
        table.to_grid()
    }
}

/// Round to 2 decimals, breaking exact ties to the even neighbour.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Build the daily summary table of `metric` from a raw snapshot feed.
pub fn summarize(raw: &RawDataset, metric: Metric) -> Result<SummaryTable, GridError> {
    if raw.is_empty() {
        return Err(GridError::EmptyInput);
    }
    RealEstateSchema::validate(raw, metric)?;

    let mut ds = raw.clone();
    Canonicalizer::sanitize(&mut ds).map_err(GridError::Transform)?;
    Canonicalizer::normalize_dates(&mut ds).map_err(GridError::Transform)?;
    Canonicalizer::dedupe(&mut ds).map_err(GridError::Transform)?;

    let observations = Canonicalizer::collapse(&ds, metric).map_err(GridError::Transform)?;
    debug!(%metric, groups = observations.len(), "collapsed to last value per address and day");

    let mut series = DailySeries::pivot(&observations)
        .map_err(GridError::Transform)?
        .ok_or(GridError::EmptyInput)?;
    series.add_average();
    series.backfill();
    debug!(
        days = series.dates.len(),
        columns = series.entities.len(),
        "resampled to daily frequency"
    );

    let mut rows: Vec<SummaryRow> = Vec::with_capacity(series.entities.len());
    let mut dropped = 0usize;
    for (entity, column) in series.entities.iter().zip(&series.values) {
        let Some(values) = column.iter().copied().collect::<Option<Vec<f64>>>() else {
            dropped += 1;
            continue;
        };
        let values: Vec<f64> = values.into_iter().map(round2).collect();
        let diff = match (values.first(), values.last()) {
            (Some(first), Some(last)) => round2(last - first),
            _ => 0.0,
        };
        rows.push(SummaryRow {
            address: entity.clone(),
            values,
            diff,
        });
    }
    if dropped > 0 {
        warn!(%metric, dropped, kept = rows.len(), "dropped addresses with incomplete history");
    }

    // Stable, so ties keep address order.
    rows.sort_by(|a, b| {
        let a_last = a.values.last().copied().unwrap_or(f64::NEG_INFINITY);
        let b_last = b.values.last().copied().unwrap_or(f64::NEG_INFINITY);
        b_last.total_cmp(&a_last)
    });

    Ok(SummaryTable {
        metric,
        dates: series.dates,
        rows,
    })
}
