//! Row-level cleanup of a raw feed: numeric sanitizing, date normalization,
//! exact-duplicate removal, and last-value-per-group collapse.

use super::schema::{Metric, RealEstateSchema};
use crate::domain::{Cell, RawDataset};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::debug;

const ROW_INDEX: &str = "__row";

/// One collapsed `(entity, date)` observation of the selected metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub entity: String,
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Canonicalizer for raw real-estate rows
pub struct Canonicalizer;

impl Canonicalizer {
    /// Coerce every known metric column to float and turn exact zeros into
    /// missing values.
    pub fn sanitize(ds: &mut RawDataset) -> Result<(), String> {
        for metric in Metric::ALL {
            if !ds.has_column(metric.column()) {
                continue;
            }
            ds.map_column(metric.column(), |cell| {
                let value = cell.to_f64()?;
                Ok(Cell::from_f64(value.filter(|v| *v != 0.0)))
            })?;
        }
        Ok(())
    }

    /// Replace the load-time column with calendar dates.
    pub fn normalize_dates(ds: &mut RawDataset) -> Result<(), String> {
        ds.map_column(RealEstateSchema::LOAD_TIME, |cell| {
            cell.to_date().map(Cell::from)
        })
    }

    /// Drop rows that repeat an earlier row in every column.
    ///
    /// The first occurrence is kept and row order is preserved. Each cell is
    /// keyed by its typed BLAKE3 digest so mixed-type columns compare exactly,
    /// and the keep-first pass runs through polars `unique_stable`.
    pub fn dedupe(ds: &mut RawDataset) -> Result<(), String> {
        let before = ds.len();
        if before == 0 {
            return Ok(());
        }

        let keys: Vec<String> = (0..ds.columns().len()).map(|j| format!("k{j}")).collect();
        let mut columns = Vec::with_capacity(keys.len() + 1);
        columns.push(Column::new(ROW_INDEX.into(), (0..before as u64).collect::<Vec<u64>>()));
        for (j, key) in keys.iter().enumerate() {
            let digests: Vec<String> = ds.rows().iter().map(|row| cell_key(&row[j])).collect();
            columns.push(Column::new(key.as_str().into(), digests));
        }

        let map_err = |e: PolarsError| format!("dedupe: {e}");
        let kept = DataFrame::new(columns)
            .map_err(map_err)?
            .lazy()
            .unique_stable(
                Some(keys.iter().map(|k| k.as_str().into()).collect()),
                UniqueKeepStrategy::First,
            )
            .select([col(ROW_INDEX)])
            .collect()
            .map_err(map_err)?;
        let kept: HashSet<u64> = kept
            .column(ROW_INDEX)
            .map_err(map_err)?
            .u64()
            .map_err(map_err)?
            .into_no_null_iter()
            .collect();

        let mut idx = 0u64;
        ds.retain_rows(|_| {
            let keep = kept.contains(&idx);
            idx += 1;
            keep
        });
        debug!(before, after = ds.len(), "dropped exact duplicate rows");
        Ok(())
    }

    /// Collapse rows to one observation per `(entity, date)`.
    ///
    /// The value of a group is the last non-missing metric value in row
    /// order; a group with no such value is kept as missing. Rows without an
    /// entity or a date are skipped. Groups are returned in order of first
    /// appearance.
    pub fn collapse(ds: &RawDataset, metric: Metric) -> Result<Vec<Observation>, String> {
        let entity_idx = index_of(ds, RealEstateSchema::ENTITY)?;
        let date_idx = index_of(ds, RealEstateSchema::LOAD_TIME)?;
        let value_idx = index_of(ds, metric.column())?;

        let mut groups: HashMap<(String, NaiveDate), usize> = HashMap::new();
        let mut out: Vec<Observation> = Vec::new();

        for row in ds.rows() {
            let Some(entity) = row[entity_idx].to_key() else {
                continue;
            };
            let Some(date) = row[date_idx].to_date()? else {
                continue;
            };
            let value = row[value_idx].to_f64()?;

            let slot = *groups.entry((entity.clone(), date)).or_insert_with(|| {
                out.push(Observation {
                    entity,
                    date,
                    value: None,
                });
                out.len() - 1
            });
            if value.is_some() {
                out[slot].value = value;
            }
        }

        Ok(out)
    }
}

fn cell_key(cell: &Cell) -> String {
    let mut hasher = blake3::Hasher::new();
    cell.hash_into(&mut hasher);
    hasher.finalize().to_hex().to_string()
}

fn index_of(ds: &RawDataset, name: &str) -> Result<usize, String> {
    ds.column_index(name)
        .ok_or_else(|| format!("missing column '{name}'"))
}
