//! Daily alignment of collapsed observations.
//!
//! Pivots `(entity, date)` observations onto a consecutive calendar-day axis,
//! adds the cross-entity `average` column, and backward-fills gaps.

use super::canonicalize::Observation;
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

/// Name of the synthetic cross-entity column.
pub const AVERAGE: &str = "average";

/// Longest date axis a pivot will build, first to last day inclusive.
pub const MAX_SPAN_DAYS: i64 = 36_525;

/// Wide daily table: one column per entity over a gap-free date axis.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    /// Every calendar day from the first to the last observation, ascending.
    pub dates: Vec<NaiveDate>,
    /// Column names, sorted ascending. Includes [`AVERAGE`] once added.
    pub entities: Vec<String>,
    /// `values[e][d]` is the value of `entities[e]` on `dates[d]`.
    pub values: Vec<Vec<Option<f64>>>,
}

impl DailySeries {
    /// Pivot observations to dates × entities and resample to daily frequency.
    ///
    /// Days between the first and last date with no observation become
    /// all-missing rows. Returns `Ok(None)` when there are no observations
    /// and `Err` when the axis would be longer than [`MAX_SPAN_DAYS`].
    pub fn pivot(observations: &[Observation]) -> Result<Option<Self>, String> {
        let (Some(first), Some(last)) = (
            observations.iter().map(|o| o.date).min(),
            observations.iter().map(|o| o.date).max(),
        ) else {
            return Ok(None);
        };
        let span = (last - first).num_days() + 1;
        if span > MAX_SPAN_DAYS {
            return Err(format!(
                "dates from {first} to {last} span {span} days, more than the {MAX_SPAN_DAYS} day limit"
            ));
        }

        let dates: Vec<NaiveDate> = (0..=(last - first).num_days())
            .map(|offset| first + Duration::days(offset))
            .collect();

        let entities: Vec<String> = observations
            .iter()
            .map(|o| o.entity.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let entity_pos: BTreeMap<&str, usize> = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.as_str(), i))
            .collect();

        let mut values = vec![vec![None; dates.len()]; entities.len()];
        for obs in observations {
            let e = entity_pos[obs.entity.as_str()];
            let d = (obs.date - first).num_days() as usize;
            values[e][d] = obs.value;
        }

        Ok(Some(Self {
            dates,
            entities,
            values,
        }))
    }

    /// Add the `average` column: the per-day mean of every entity's value,
    /// ignoring missing values. A day where every entity is missing has a
    /// missing average. An entity already named `average` is replaced.
    pub fn add_average(&mut self) {
        let average: Vec<Option<f64>> = (0..self.dates.len())
            .map(|d| {
                let (sum, count) = self
                    .values
                    .iter()
                    .filter_map(|col| col[d])
                    .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                (count > 0).then(|| sum / count as f64)
            })
            .collect();

        match self.entities.binary_search_by(|e| e.as_str().cmp(AVERAGE)) {
            Ok(i) => self.values[i] = average,
            Err(i) => {
                self.entities.insert(i, AVERAGE.to_string());
                self.values.insert(i, average);
            }
        }
    }

    /// Fill each missing value with the nearest later value in its column.
    ///
    /// Trailing gaps have no later value and stay missing.
    pub fn backfill(&mut self) {
        for col in &mut self.values {
            let mut next: Option<f64> = None;
            for cell in col.iter_mut().rev() {
                match cell {
                    Some(v) => next = Some(*v),
                    None => *cell = next,
                }
            }
        }
    }

    /// Values of one column by name.
    pub fn column(&self, entity: &str) -> Option<&[Option<f64>]> {
        self.entities
            .iter()
            .position(|e| e == entity)
            .map(|i| self.values[i].as_slice())
    }
}
