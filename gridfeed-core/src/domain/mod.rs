//! Domain types: cells, raw datasets, and output grids.

pub mod cell;
pub mod dataset;
pub mod grid;

pub use cell::Cell;
pub use dataset::RawDataset;
pub use grid::{CellOutput, Grid};
