//! Gridfeed Functions: the spreadsheet-facing adapter layer.
//!
//! This crate builds on `gridfeed-core` to provide:
//! - Function descriptors (name, namespace, argument and return shapes)
//! - A registry that coerces arguments and never lets an error escape a cell
//! - The warehouse-backed functions (`LAYOFFS_FYI`, `LOOPNET_USD_SQFT`, `LOOPNET_SQFT`)
//! - Sample functions (greeting, random draws, range arithmetic, correlation, dates)

pub mod builtin;
pub mod registry;
pub mod samples;

pub use registry::{
    check_grid_size, Arg, ArgSpec, FunctionDescriptor, FunctionRegistry, Handler,
    InvocationContext, Shape, MAX_GRID_CELLS,
};
