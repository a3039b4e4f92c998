//! Integration tests for the function registry against in-memory warehouses.

use chrono::NaiveDate;
use gridfeed_core::config::GridfeedConfig;
use gridfeed_core::warehouse::InMemoryWarehouse;
use gridfeed_core::{Cell, CellOutput, RawDataset};
use gridfeed_functions::{check_grid_size, Arg, FunctionRegistry, InvocationContext, Shape};

// ── Helpers ──────────────────────────────────────────────────────────

fn call(wh: &InMemoryWarehouse, name: &str, args: &[Arg]) -> CellOutput {
    let config = GridfeedConfig::default();
    let ctx = InvocationContext::new(wh, &config);
    FunctionRegistry::with_builtins().invoke(name, &ctx, args)
}

fn layoffs_feed() -> RawDataset {
    let mut ds = RawDataset::new([
        "date",
        "company",
        "employees_laid_off",
        "percent_laid_off",
        "datamachine_load_time",
    ]);
    let d = |m, day| Cell::from(NaiveDate::from_ymd_opt(2024, m, day).unwrap());
    ds.push_row(vec![
        d(4, 2),
        Cell::from("Initech"),
        Cell::Null,
        Cell::from("15.0%"),
        Cell::from("2024-04-03 06:00:00"),
    ]);
    ds.push_row(vec![
        d(4, 1),
        Cell::from("Acme"),
        Cell::Int(300),
        Cell::Null,
        Cell::from("2024-04-03 06:00:00"),
    ]);
    ds
}

// ── Catalogue ────────────────────────────────────────────────────────

#[test]
fn builtins_are_registered_under_qualified_names() {
    let registry = FunctionRegistry::with_builtins();
    let names: Vec<String> = registry.descriptors().map(|d| d.qualified_name()).collect();
    for expected in [
        "ADD_ONE",
        "HELLO",
        "LAST_CALCULATED",
        "LAYOFFS_FYI",
        "LOOPNET_SQFT",
        "LOOPNET_USD_SQFT",
        "NUMPY.STANDARD_NORMAL",
        "PANDAS.CORREL",
        "PANDAS.RANDOM_TIMESERIES",
        "PANDAS.TIMESERIES_START",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
    assert_eq!(registry.len(), 10);

    let volatile: Vec<&str> = registry
        .descriptors()
        .filter(|d| d.volatile)
        .map(|d| d.name)
        .collect();
    assert_eq!(volatile, vec!["last_calculated"]);
    assert_eq!(registry.get("LOOPNET_SQFT").unwrap().returns, Shape::Table);
}

// ── Warehouse functions ──────────────────────────────────────────────

#[test]
fn connection_error_becomes_a_message() {
    let wh = InMemoryWarehouse::unreachable("could not resolve bigquery.googleapis.com");
    for name in ["LOOPNET_USD_SQFT", "LOOPNET_SQFT", "LAYOFFS_FYI"] {
        let out = call(&wh, name, &[]);
        let msg = out.message().expect("error should render as text");
        assert!(msg.contains("could not resolve bigquery.googleapis.com"), "{msg}");
    }
}

#[test]
fn query_error_becomes_a_message_and_releases_the_session() {
    let wh = InMemoryWarehouse::failing_queries("Access Denied: Table loopnet_agg");
    let out = call(&wh, "loopnet_usd_sqft", &[]);
    assert!(out.message().unwrap().contains("Access Denied"));
    assert_eq!(wh.sessions_opened(), 1);
    assert_eq!(wh.open_sessions(), 0);
}

#[test]
fn layoffs_report_blanks_missing_head_counts() {
    let config = GridfeedConfig::default();
    let wh = InMemoryWarehouse::new().with_table(config.tables.layoffs.clone(), layoffs_feed());
    let out = call(&wh, "LAYOFFS_FYI", &[]);
    let grid = out.table().expect("layoffs should return a table");

    assert_eq!(grid.header.as_ref().unwrap()[0], "date");
    assert_eq!(grid.get(0, 2), Some(&Cell::Text(String::new())));
    assert_eq!(grid.get(1, 2), Some(&Cell::Int(300)));
}

#[test]
fn empty_real_estate_feed_is_a_message() {
    let config = GridfeedConfig::default();
    let empty = RawDataset::new(["formatted_address", "datamachine_load_time", "avg_usd_sqft_yr"]);
    let wh = InMemoryWarehouse::new().with_table(config.tables.real_estate.clone(), empty);
    let out = call(&wh, "LOOPNET_USD_SQFT", &[]);
    assert!(out.message().unwrap().contains("returned no rows"));
}

// ── Sample functions ─────────────────────────────────────────────────

#[test]
fn hello_greets() {
    let wh = InMemoryWarehouse::new();
    let out = call(&wh, "hello", &[Arg::from(Cell::from("world"))]);
    assert_eq!(out.table().unwrap().get(0, 0), Some(&Cell::from("Hello world!")));
}

#[test]
fn standard_normal_returns_requested_shape() {
    let wh = InMemoryWarehouse::new();
    let out = call(
        &wh,
        "NUMPY.STANDARD_NORMAL",
        &[Arg::from(Cell::Float(4.0)), Arg::from(Cell::Float(3.0))],
    );
    let grid = out.table().unwrap();
    assert_eq!(grid.height(), 4);
    assert_eq!(grid.width(), 3);
    assert!(grid.header.is_none());

    let bad = call(
        &wh,
        "NUMPY.STANDARD_NORMAL",
        &[Arg::from(Cell::Float(-1.0)), Arg::from(Cell::Float(3.0))],
    );
    assert!(bad.is_message());
}

#[test]
fn oversized_random_grids_are_refused_with_a_message() {
    let wh = InMemoryWarehouse::new();
    let out = call(
        &wh,
        "NUMPY.STANDARD_NORMAL",
        &[Arg::from(Cell::Float(4_294_967_295.0)), Arg::from(Cell::Float(1.0))],
    );
    assert!(out.message().unwrap().contains("exceeds the limit"));

    assert!(check_grid_size(1024, 1024).is_ok());
    assert!(check_grid_size(1025, 1024).is_err());
    assert!(check_grid_size(usize::MAX, 2).is_err());

    let out = call(
        &wh,
        "PANDAS.RANDOM_TIMESERIES",
        &[Arg::from(Cell::from("0001-01-01")), Arg::from(Cell::from("9999-12-31"))],
    );
    assert!(out.message().unwrap().contains("exceeds the limit"));
}

#[test]
fn add_one_increments_a_range() {
    let wh = InMemoryWarehouse::new();
    let values = vec![
        vec![Cell::Int(1), Cell::Float(2.5)],
        vec![Cell::Float(-1.0), Cell::Int(0)],
    ];
    let out = call(&wh, "ADD_ONE", &[Arg::from(values)]);
    let grid = out.table().unwrap();
    assert_eq!(
        grid.rows,
        vec![
            vec![Cell::Int(2), Cell::Float(3.5)],
            vec![Cell::Float(0.0), Cell::Int(1)],
        ]
    );

    let out = call(&wh, "ADD_ONE", &[Arg::from(vec![vec![Cell::from("x")]])]);
    assert!(out.message().unwrap().contains("cannot add 1"));
}

#[test]
fn correl_returns_symmetric_matrix() {
    let wh = InMemoryWarehouse::new();
    let df: Vec<Vec<Cell>> = [(1.0, 10.0, 3.0), (2.0, 20.0, 1.0), (3.0, 30.0, 2.0)]
        .iter()
        .map(|(a, b, c)| vec![Cell::Float(*a), Cell::Float(*b), Cell::Float(*c)])
        .collect();
    let out = call(&wh, "pandas.correl", &[Arg::from(df)]);
    let grid = out.table().unwrap();
    assert_eq!((grid.height(), grid.width()), (3, 3));

    let at = |r, c| grid.get(r, c).unwrap().to_f64().unwrap().unwrap();
    for i in 0..3 {
        assert!((at(i, i) - 1.0).abs() < 1e-12);
        for j in 0..3 {
            assert!((at(i, j) - at(j, i)).abs() < 1e-12);
        }
    }
    assert!((at(0, 1) - 1.0).abs() < 1e-12);
    assert!((at(0, 2) + 0.5).abs() < 1e-12);
}

#[test]
fn random_timeseries_covers_each_day() {
    let wh = InMemoryWarehouse::new();
    let out = call(
        &wh,
        "PANDAS.RANDOM_TIMESERIES",
        &[
            Arg::from(Cell::from("2024-01-30")),
            Arg::from(Cell::Float(45_324.0)), // 2024-02-02 as a sheet serial
        ],
    );
    let grid = out.table().unwrap();
    assert_eq!(grid.header.as_ref().unwrap()[1], "Growth");
    assert_eq!(grid.height(), 4);
    assert_eq!(
        grid.get(3, 0),
        Some(&Cell::Date(NaiveDate::from_ymd_opt(2024, 2, 2).unwrap()))
    );
}

#[test]
fn timeseries_start_skips_header_and_blanks() {
    let wh = InMemoryWarehouse::new();
    let df = vec![
        vec![Cell::from("date"), Cell::from("value")],
        vec![Cell::from("2024-03-05"), Cell::Float(1.0)],
        vec![Cell::Null, Cell::Float(2.0)],
        vec![Cell::from("2024-03-01"), Cell::Float(3.0)],
    ];
    let out = call(&wh, "PANDAS.TIMESERIES_START", &[Arg::from(df)]);
    assert_eq!(
        out.table().unwrap().get(0, 0),
        Some(&Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
    );
}

#[test]
fn last_calculated_reports_a_timestamp() {
    let wh = InMemoryWarehouse::new();
    let out = call(&wh, "LAST_CALCULATED", &[]);
    let text = out.table().unwrap().get(0, 0).unwrap().to_string();
    assert!(text.starts_with("Last calculated: 20"), "{text}");
}
