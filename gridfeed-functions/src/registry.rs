//! Function registry: maps spreadsheet function names to descriptors and
//! handlers, coerces arguments, and turns every failure into a cell message.

use chrono::NaiveDate;
use gridfeed_core::config::GridfeedConfig;
use gridfeed_core::warehouse::Warehouse;
use gridfeed_core::{Cell, CellOutput, Grid, GridError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Largest grid a handler may build: one full sheet column of rows.
pub const MAX_GRID_CELLS: usize = 1_048_576;

/// Fail with an argument error unless a `rows` x `columns` grid fits in
/// [`MAX_GRID_CELLS`].
pub fn check_grid_size(rows: usize, columns: usize) -> Result<(), GridError> {
    match rows.checked_mul(columns) {
        Some(cells) if cells <= MAX_GRID_CELLS => Ok(()),
        _ => Err(GridError::Argument(format!(
            "a {rows}x{columns} result exceeds the limit of {MAX_GRID_CELLS} cells"
        ))),
    }
}

/// How a value is laid out on the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// A single cell.
    Scalar,
    /// A 2-D block of cells, no header.
    Range,
    /// A block with a header row and an index column.
    Table,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar => write!(f, "scalar"),
            Shape::Range => write!(f, "range"),
            Shape::Table => write!(f, "table"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgSpec {
    pub name: &'static str,
    pub doc: &'static str,
    pub shape: Shape,
}

impl ArgSpec {
    pub const fn scalar(name: &'static str, doc: &'static str) -> Self {
        Self {
            name,
            doc,
            shape: Shape::Scalar,
        }
    }

    pub const fn range(name: &'static str, doc: &'static str) -> Self {
        Self {
            name,
            doc,
            shape: Shape::Range,
        }
    }
}

/// Everything the host needs to expose a function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub namespace: Option<&'static str>,
    pub doc: &'static str,
    pub args: Vec<ArgSpec>,
    pub returns: Shape,
    /// Recalculated on every sheet recalculation.
    pub volatile: bool,
}

impl FunctionDescriptor {
    pub fn new(name: &'static str, doc: &'static str, returns: Shape) -> Self {
        Self {
            name,
            namespace: None,
            doc,
            args: Vec::new(),
            returns,
            volatile: false,
        }
    }

    pub fn namespace(mut self, namespace: &'static str) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn arg(mut self, spec: ArgSpec) -> Self {
        self.args.push(spec);
        self
    }

    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    /// Name as typed in a cell: `NAMESPACE.NAME` or `NAME`, upper-cased.
    pub fn qualified_name(&self) -> String {
        qualify(self.namespace, self.name)
    }

    /// Signature line such as `NUMPY.STANDARD_NORMAL(rows, columns)`.
    pub fn signature(&self) -> String {
        let args: Vec<&str> = self.args.iter().map(|a| a.name).collect();
        format!("{}({})", self.qualified_name(), args.join(", "))
    }
}

fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}.{}", ns, name).to_uppercase(),
        None => name.to_uppercase(),
    }
}

/// One argument as received from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Cell),
    Range(Vec<Vec<Cell>>),
}

impl Arg {
    /// The single cell of a scalar argument or a 1x1 range.
    pub fn as_cell(&self) -> Result<&Cell, GridError> {
        match self {
            Arg::Value(c) => Ok(c),
            Arg::Range(rows) => match rows.as_slice() {
                [row] if row.len() == 1 => Ok(&row[0]),
                _ => Err(GridError::Argument(format!(
                    "expected a single cell, got a {}x{} range",
                    rows.len(),
                    rows.first().map_or(0, Vec::len)
                ))),
            },
        }
    }

    /// The argument as a 2-D block; a scalar becomes a 1x1 block.
    pub fn as_range(&self) -> Vec<Vec<Cell>> {
        match self {
            Arg::Value(c) => vec![vec![c.clone()]],
            Arg::Range(rows) => rows.clone(),
        }
    }

    pub fn as_text(&self) -> Result<String, GridError> {
        Ok(self.as_cell()?.to_string())
    }

    /// A non-negative whole number, as sheets pass counts as floats.
    pub fn as_count(&self) -> Result<usize, GridError> {
        let cell = self.as_cell()?;
        let value = cell
            .to_f64()
            .map_err(GridError::Argument)?
            .ok_or_else(|| GridError::Argument("expected a number, got an empty cell".into()))?;
        if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
            return Err(GridError::Argument(format!(
                "expected a non-negative whole number, got {value}"
            )));
        }
        Ok(value as usize)
    }

    pub fn as_date(&self) -> Result<NaiveDate, GridError> {
        self.as_cell()?
            .to_date()
            .map_err(GridError::Argument)?
            .ok_or_else(|| GridError::Argument("expected a date, got an empty cell".into()))
    }
}

impl From<Cell> for Arg {
    fn from(cell: Cell) -> Self {
        Arg::Value(cell)
    }
}

impl From<Vec<Vec<Cell>>> for Arg {
    fn from(rows: Vec<Vec<Cell>>) -> Self {
        Arg::Range(rows)
    }
}

/// What a handler can reach while it runs.
///
/// The warehouse is passed in per call; nothing is held globally.
pub struct InvocationContext<'a> {
    pub warehouse: &'a dyn Warehouse,
    pub config: &'a GridfeedConfig,
}

impl<'a> InvocationContext<'a> {
    pub fn new(warehouse: &'a dyn Warehouse, config: &'a GridfeedConfig) -> Self {
        Self { warehouse, config }
    }
}

pub type Handler = fn(&InvocationContext<'_>, &[Arg]) -> Result<Grid, GridError>;

struct Entry {
    descriptor: FunctionDescriptor,
    handler: Handler,
}

/// Registered functions keyed by qualified name.
#[derive(Default)]
pub struct FunctionRegistry {
    entries: BTreeMap<String, Entry>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the warehouse functions and the sample functions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register(&mut registry);
        crate::samples::register(&mut registry);
        registry
    }

    /// Register a function, replacing any earlier one with the same name.
    pub fn register(&mut self, descriptor: FunctionDescriptor, handler: Handler) {
        let key = descriptor.qualified_name();
        if self.entries.contains_key(&key) {
            warn!(function = %key, "replacing registered function");
        }
        self.entries.insert(
            key,
            Entry {
                descriptor,
                handler,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.entries
            .get(&name.trim().to_uppercase())
            .map(|e| &e.descriptor)
    }

    /// Descriptors in name order.
    pub fn descriptors(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.entries.values().map(|e| &e.descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Call a function by name. Never fails: errors come back as a message.
    pub fn invoke(&self, name: &str, ctx: &InvocationContext<'_>, args: &[Arg]) -> CellOutput {
        let output = CellOutput::from(self.try_invoke(name, ctx, args));
        if let CellOutput::Message(msg) = &output {
            warn!(function = name, error = %msg, "function returned an error message");
        }
        output
    }

    /// Call a function by name, keeping the typed error.
    pub fn try_invoke(
        &self,
        name: &str,
        ctx: &InvocationContext<'_>,
        args: &[Arg],
    ) -> Result<Grid, GridError> {
        let key = name.trim().to_uppercase();
        let entry = self
            .entries
            .get(&key)
            .ok_or_else(|| GridError::UnknownFunction { name: key.clone() })?;

        let expected = entry.descriptor.args.len();
        if args.len() != expected {
            return Err(GridError::Argument(format!(
                "{} takes {expected} argument{}, got {}",
                entry.descriptor.signature(),
                if expected == 1 { "" } else { "s" },
                args.len()
            )));
        }

        debug!(function = %key, args = args.len(), "invoking");
        (entry.handler)(ctx, args)
    }
}
