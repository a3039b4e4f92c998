//! Gridfeed CLI: call spreadsheet functions and build summary tables from a shell.
//!
//! Commands:
//! - `list`: print every registered function with its signature
//! - `call`: invoke a function and print the grid it would put in a cell
//! - `summarize`: run the daily summary on a local CSV or Parquet export

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gridfeed_core::data::{DataIngestor, Metric};
use gridfeed_core::warehouse::{BigQueryWarehouse, InMemoryWarehouse, Warehouse};
use gridfeed_core::{summarize, Cell, CellOutput, Grid, GridfeedConfig};
use gridfeed_functions::{Arg, FunctionRegistry, InvocationContext};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "gridfeed",
    about = "Gridfeed CLI: warehouse-backed spreadsheet functions"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered functions.
    List,
    /// Invoke a function by name.
    Call {
        /// Function name, e.g. LOOPNET_USD_SQFT or NUMPY.STANDARD_NORMAL.
        name: String,

        /// Arguments. `@file.csv` passes the file's cells as a range.
        args: Vec<String>,

        /// Serve this CSV or Parquet file for every query instead of BigQuery.
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Summarize a local real-estate export.
    Summarize {
        /// CSV or Parquet file with the aggregate table's columns.
        #[arg(long)]
        input: PathBuf,

        /// usd_per_sqft_year, min_size_sqft or usd_per_year.
        #[arg(long, default_value = "usd_per_sqft_year")]
        metric: Metric,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => GridfeedConfig::from_file(path)?,
        None => GridfeedConfig::default(),
    };

    match cli.command {
        Commands::List => run_list(),
        Commands::Call {
            name,
            args,
            input,
            format,
        } => run_call(&config, &name, &args, input.as_deref(), format),
        Commands::Summarize {
            input,
            metric,
            format,
        } => run_summarize(&input, metric, format),
    }
}

fn run_list() -> Result<()> {
    let registry = FunctionRegistry::with_builtins();
    println!("{:<32} {:<8} {}", "Function", "Returns", "Description");
    println!("{}", "-".repeat(80));
    for d in registry.descriptors() {
        let volatile = if d.volatile { " (volatile)" } else { "" };
        println!(
            "{:<32} {:<8} {}{volatile}",
            d.signature(),
            d.returns.to_string(),
            d.doc
        );
        for arg in &d.args {
            println!("    {:<28} {:<8} {}", arg.name, arg.shape.to_string(), arg.doc);
        }
    }
    Ok(())
}

fn run_call(
    config: &GridfeedConfig,
    name: &str,
    raw_args: &[String],
    input: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let registry = FunctionRegistry::with_builtins();
    if registry.get(name).is_none() {
        bail!("unknown function '{name}'. Run `gridfeed list` to see what is available");
    }

    let args = raw_args
        .iter()
        .map(|a| parse_arg(a))
        .collect::<Result<Vec<_>>>()?;
    let warehouse = open_warehouse(config, input)?;
    let ctx = InvocationContext::new(warehouse.as_ref(), config);

    let output = registry.invoke(name, &ctx, &args);
    print_output(&output, format)?;
    if let CellOutput::Message(msg) = &output {
        if !matches!(format, OutputFormat::Json) {
            eprintln!("{name} returned a message instead of a table: {msg}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_summarize(input: &Path, metric: Metric, format: OutputFormat) -> Result<()> {
    let raw = DataIngestor::ingest_path(input)?;
    info!(rows = raw.len(), path = %input.display(), "loaded export");
    let table = summarize(&raw, metric)?;
    if table.is_empty() {
        warn!(%metric, "no address has a complete history");
    }
    print_output(&CellOutput::Table(table.to_grid()), format)
}

/// BigQuery from the config, or an in-memory warehouse serving `input`.
///
/// When BigQuery cannot be set up the warehouse is unreachable, so warehouse
/// functions answer with the setup error while the others still run.
fn open_warehouse(config: &GridfeedConfig, input: Option<&Path>) -> Result<Box<dyn Warehouse>> {
    if let Some(path) = input {
        let ds = DataIngestor::ingest_path(path)
            .with_context(|| format!("loading {}", path.display()))?;
        info!(rows = ds.len(), path = %path.display(), "serving local file");
        return Ok(Box::new(InMemoryWarehouse::serving(ds)));
    }
    match BigQueryWarehouse::from_config(config) {
        Ok(wh) => Ok(Box::new(wh)),
        Err(e) => {
            warn!(error = %e, "BigQuery is not configured");
            Ok(Box::new(InMemoryWarehouse::unreachable(e.to_string())))
        }
    }
}

/// `@path` loads a headerless CSV range; anything else is a single cell.
fn parse_arg(raw: &str) -> Result<Arg> {
    let Some(path) = raw.strip_prefix('@') else {
        return Ok(Arg::Value(parse_cell(raw)));
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening range file {path}"))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("reading range file {path}"))?;
        rows.push(record.iter().map(parse_cell).collect());
    }
    Ok(Arg::Range(rows))
}

fn parse_cell(raw: &str) -> Cell {
    let s = raw.trim();
    if s.is_empty() {
        return Cell::Null;
    }
    if s.eq_ignore_ascii_case("true") {
        return Cell::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Cell::Bool(false);
    }
    if let Ok(i) = s.parse::<i64>() {
        return Cell::Int(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Cell::Float(f);
    }
    Cell::Text(s.to_string())
}

fn print_output(output: &CellOutput, format: OutputFormat) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match (format, output) {
        (OutputFormat::Json, _) => {
            serde_json::to_writer_pretty(&mut out, output)?;
            writeln!(out)?;
        }
        (OutputFormat::Csv, CellOutput::Table(grid)) => grid.write_csv(&mut out)?,
        (OutputFormat::Table, CellOutput::Table(grid)) => print_table(&mut out, grid)?,
        (_, CellOutput::Message(msg)) => writeln!(out, "{msg}")?,
    }
    Ok(())
}

fn print_table<W: Write>(out: &mut W, grid: &Grid) -> Result<()> {
    let rendered: Vec<Vec<String>> = grid
        .header
        .iter()
        .cloned()
        .chain(
            grid.rows
                .iter()
                .map(|r| r.iter().map(render_cell).collect()),
        )
        .collect();
    let width = grid.width();
    let mut widths = vec![0usize; width];
    for row in &rendered {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    for (i, row) in rendered.iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect();
        writeln!(out, "{}", line.join("  ").trim_end())?;
        if i == 0 && grid.header.is_some() {
            let rule = widths.iter().sum::<usize>() + 2 * width.saturating_sub(1);
            writeln!(out, "{}", "-".repeat(rule))?;
        }
    }
    if grid.height() == 0 {
        writeln!(out, "(no rows)")?;
    }
    Ok(())
}

fn render_cell(cell: &Cell) -> String {
    match cell {
        Cell::Float(v) => format!("{v:.2}"),
        other => other.to_string(),
    }
}
