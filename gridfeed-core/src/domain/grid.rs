//! Output shape handed back to the spreadsheet host.

use super::cell::Cell;
use super::dataset::RawDataset;
use crate::error::GridError;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// A rectangular block of cells with an optional header row.
///
/// When a result has a row index, the index is the first column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn with_header(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            header: Some(header),
            rows,
        }
    }

    pub fn headerless(rows: Vec<Vec<Cell>>) -> Self {
        Self { header: None, rows }
    }

    /// A 1x1 grid holding a single value.
    pub fn scalar(cell: impl Into<Cell>) -> Self {
        Self::headerless(vec![vec![cell.into()]])
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.header
            .as_ref()
            .map(|h| h.len())
            .or_else(|| self.rows.first().map(|r| r.len()))
            .unwrap_or(0)
    }

    /// Cell lookup by data row and column (header excluded).
    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Write the grid as CSV, header first when present.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), GridError> {
        let mut wtr = csv::Writer::from_writer(writer);
        let csv_err = |e: csv::Error| GridError::Output(format!("csv: {e}"));
        if let Some(header) = &self.header {
            wtr.write_record(header).map_err(csv_err)?;
        }
        for row in &self.rows {
            wtr.write_record(row.iter().map(|c| c.to_string()))
                .map_err(csv_err)?;
        }
        wtr.flush()
            .map_err(|e| GridError::Output(format!("csv flush: {e}")))?;
        Ok(())
    }
}

impl From<RawDataset> for Grid {
    fn from(ds: RawDataset) -> Self {
        let (columns, rows) = ds.into_parts();
        Grid::with_header(columns, rows)
    }
}

/// What a spreadsheet function returns to its cell: a table or a message.
///
/// Failures never escape as errors; they render as readable text instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum CellOutput {
    Table(Grid),
    Message(String),
}

impl CellOutput {
    pub fn is_message(&self) -> bool {
        matches!(self, CellOutput::Message(_))
    }

    pub fn table(&self) -> Option<&Grid> {
        match self {
            CellOutput::Table(g) => Some(g),
            CellOutput::Message(_) => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            CellOutput::Message(m) => Some(m),
            CellOutput::Table(_) => None,
        }
    }
}

impl<T: Into<Grid>> From<Result<T, GridError>> for CellOutput {
    fn from(result: Result<T, GridError>) -> Self {
        match result {
            Ok(value) => CellOutput::Table(value.into()),
            Err(e) => CellOutput::Message(e.to_string()),
        }
    }
}
