use crate::domain::{Cell, RawDataset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column layout of the commercial real-estate aggregate feed.
pub struct RealEstateSchema;

impl RealEstateSchema {
    pub const ENTITY: &'static str = "formatted_address";
    pub const LOAD_TIME: &'static str = "datamachine_load_time";

    /// Columns every real-estate dataset must carry.
    pub fn required_columns() -> [&'static str; 2] {
        [Self::ENTITY, Self::LOAD_TIME]
    }

    /// Validate a raw dataset for summarizing `metric`.
    ///
    /// Checks that the entity, load-time and metric columns exist, and that
    /// no cell in them holds a value of an impossible kind.
    pub fn validate(ds: &RawDataset, metric: Metric) -> Result<(), SchemaError> {
        for name in Self::required_columns()
            .into_iter()
            .chain(std::iter::once(metric.column()))
        {
            if !ds.has_column(name) {
                return Err(SchemaError::MissingColumn(name.to_string()));
            }
        }

        check_kinds(ds, Self::LOAD_TIME, "timestamp", |c| {
            !matches!(c, Cell::Bool(_))
        })?;
        for m in Metric::ALL {
            if ds.has_column(m.column()) {
                check_kinds(ds, m.column(), "numeric", |c| {
                    !matches!(c, Cell::Date(_) | Cell::Timestamp(_))
                })?;
            }
        }
        Ok(())
    }
}

fn check_kinds(
    ds: &RawDataset,
    column: &str,
    expected: &'static str,
    accepts: impl Fn(&Cell) -> bool,
) -> Result<(), SchemaError> {
    let Some(cells) = ds.column(column) else {
        return Ok(());
    };
    for cell in cells {
        if !accepts(cell) {
            return Err(SchemaError::TypeMismatch {
                column: column.to_string(),
                expected,
                actual: cell_kind(cell),
            });
        }
    }
    Ok(())
}

fn cell_kind(cell: &Cell) -> &'static str {
    match cell {
        Cell::Null => "null",
        Cell::Bool(_) => "bool",
        Cell::Int(_) => "int",
        Cell::Float(_) => "float",
        Cell::Text(_) => "text",
        Cell::Date(_) => "date",
        Cell::Timestamp(_) => "timestamp",
    }
}

/// Numeric metric columns of the real-estate feed.
///
/// Zero is never a real value for any of these; it marks absent data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Average asking rent in USD per square foot per year.
    UsdPerSqftYear,
    /// Summed minimum available size in square feet.
    MinSizeSqft,
    /// Average asking rent in USD per year.
    UsdPerYear,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::MinSizeSqft, Metric::UsdPerSqftYear, Metric::UsdPerYear];

    pub fn column(self) -> &'static str {
        match self {
            Metric::UsdPerSqftYear => "avg_usd_sqft_yr",
            Metric::MinSizeSqft => "sum_min_size_sqft",
            Metric::UsdPerYear => "avg_usd_yr",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg_usd_sqft_yr" | "usd_per_sqft_year" | "usd-sqft" => Ok(Metric::UsdPerSqftYear),
            "sum_min_size_sqft" | "min_size_sqft" | "sqft" => Ok(Metric::MinSizeSqft),
            "avg_usd_yr" | "usd_per_year" | "usd" => Ok(Metric::UsdPerYear),
            other => Err(format!(
                "unknown metric '{other}' (expected avg_usd_sqft_yr, sum_min_size_sqft or avg_usd_yr)"
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },
}
