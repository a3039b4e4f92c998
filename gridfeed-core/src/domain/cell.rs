//! A single spreadsheet-compatible value.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Day zero of the spreadsheet serial date system.
fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("valid serial epoch")
}

/// One cell in a raw dataset or an output grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Build a float cell, mapping `None` and NaN to `Null`.
    pub fn from_f64(value: Option<f64>) -> Self {
        match value {
            Some(v) if !v.is_nan() => Cell::Float(v),
            _ => Cell::Null,
        }
    }

    /// Numeric view of the cell.
    ///
    /// Returns `Ok(None)` for missing values and `Err` with a description when
    /// the cell holds something that cannot be read as a number.
    pub fn to_f64(&self) -> Result<Option<f64>, String> {
        match self {
            Cell::Null => Ok(None),
            Cell::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
            Cell::Int(i) => Ok(Some(*i as f64)),
            Cell::Float(f) if f.is_nan() => Ok(None),
            Cell::Float(f) => Ok(Some(*f)),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<f64>()
                    .map(|v| if v.is_nan() { None } else { Some(v) })
                    .map_err(|_| format!("could not convert string to float: '{s}'"))
            }
            Cell::Date(d) => Err(format!("could not convert date {d} to float")),
            Cell::Timestamp(t) => Err(format!("could not convert timestamp {t} to float")),
        }
    }

    /// Calendar date view of the cell, dropping any time of day.
    ///
    /// Accepts dates, timestamps, ISO-8601 text and spreadsheet serial numbers.
    pub fn to_date(&self) -> Result<Option<NaiveDate>, String> {
        match self {
            Cell::Null => Ok(None),
            Cell::Date(d) => Ok(Some(*d)),
            Cell::Timestamp(t) => Ok(Some(t.date())),
            Cell::Int(i) => serial_to_date(*i as f64).map(Some),
            Cell::Float(f) if f.is_nan() => Ok(None),
            Cell::Float(f) => serial_to_date(*f).map(Some),
            Cell::Text(s) => parse_date_text(s).map(Some),
            Cell::Bool(b) => Err(format!("could not convert {b} to a date")),
        }
    }

    /// Text view used when a cell is an identifier such as an address.
    pub fn to_key(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Float(f) if f.is_nan() => None,
            Cell::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Feed a canonical byte encoding of the cell into a hasher.
    ///
    /// Two cells hash equal exactly when they compare equal, with every NaN
    /// treated as the same value.
    pub fn hash_into(&self, hasher: &mut blake3::Hasher) {
        match self {
            Cell::Null => {
                hasher.update(&[0]);
            }
            Cell::Bool(b) => {
                hasher.update(&[1, *b as u8]);
            }
            Cell::Int(i) => {
                hasher.update(&[2]);
                hasher.update(&i.to_le_bytes());
            }
            Cell::Float(f) => {
                hasher.update(&[3]);
                let bits = if f.is_nan() {
                    f64::NAN.to_bits()
                } else if *f == 0.0 {
                    0.0f64.to_bits()
                } else {
                    f.to_bits()
                };
                hasher.update(&bits.to_le_bytes());
            }
            Cell::Text(s) => {
                hasher.update(&[4]);
                hasher.update(&(s.len() as u64).to_le_bytes());
                hasher.update(s.as_bytes());
            }
            Cell::Date(d) => {
                hasher.update(&[5]);
                hasher.update(&d.num_days_from_ce().to_le_bytes());
            }
            Cell::Timestamp(t) => {
                hasher.update(&[6]);
                hasher.update(&t.and_utc().timestamp_micros().to_le_bytes());
            }
        }
    }
}

fn serial_to_date(serial: f64) -> Result<NaiveDate, String> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_465.0 {
        return Err(format!("{serial} is not a valid date serial number"));
    }
    Ok(serial_epoch() + Duration::days(serial.floor() as i64))
}

fn parse_date_text(s: &str) -> Result<NaiveDate, String> {
    let trimmed = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(d);
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
    ] {
        if let Ok(t) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(t.date());
        }
    }
    if let Ok(t) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Ok(t.naive_utc().date());
    }
    // BigQuery renders UTC timestamps as "2024-01-02 03:04:05.123456 UTC".
    if let Some(stripped) = trimmed.strip_suffix(" UTC") {
        return parse_date_text(stripped);
    }
    Err(format!("could not parse '{s}' as a date"))
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::from_f64(Some(v))
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<NaiveDate> for Cell {
    fn from(v: NaiveDate) -> Self {
        Cell::Date(v)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(v: NaiveDateTime) -> Self {
        Cell::Timestamp(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Null)
    }
}
