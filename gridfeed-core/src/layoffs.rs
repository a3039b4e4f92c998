//! Layoffs tracker report: the latest snapshot indexed by date.

use crate::data::SchemaError;
use crate::domain::{Cell, Grid, RawDataset};
use crate::error::GridError;
use tracing::debug;

pub const DATE_COLUMN: &str = "date";
pub const LAID_OFF_COLUMN: &str = "employees_laid_off";

/// Shape a layoffs fetch for display.
///
/// Missing head counts become the empty string so the cell renders blank
/// instead of as a number. `date` becomes the first column.
pub fn report(raw: RawDataset) -> Result<Grid, GridError> {
    let mut ds = raw;
    for column in [DATE_COLUMN, LAID_OFF_COLUMN] {
        if !ds.has_column(column) {
            return Err(SchemaError::MissingColumn(column.to_string()).into());
        }
    }

    let mut filled = 0usize;
    ds.map_column(LAID_OFF_COLUMN, |cell| {
        Ok(if cell.is_null() {
            filled += 1;
            Cell::Text(String::new())
        } else {
            cell.clone()
        })
    })
    .map_err(GridError::Transform)?;
    ds.move_to_front(DATE_COLUMN).map_err(GridError::Transform)?;

    debug!(rows = ds.len(), filled, "layoffs report");
    Ok(ds.into())
}
