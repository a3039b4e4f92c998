//! Small demonstration functions: greetings, random draws, range arithmetic,
//! correlation, and date series.

use crate::registry::{
    check_grid_size, Arg, ArgSpec, FunctionDescriptor, FunctionRegistry, InvocationContext,
    Shape,
};
use chrono::{Duration, Local, NaiveDate};
use gridfeed_core::{Cell, Grid, GridError};
use rand::Rng;

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry.register(
        FunctionDescriptor::new("hello", "Greet someone.", Shape::Scalar)
            .arg(ArgSpec::scalar("name", "who to greet")),
        hello,
    );
    registry.register(
        FunctionDescriptor::new(
            "standard_normal",
            "Draws from the standard normal distribution.",
            Shape::Range,
        )
        .namespace("numpy")
        .arg(ArgSpec::scalar("rows", "the number of rows in the returned array."))
        .arg(ArgSpec::scalar(
            "columns",
            "the number of columns in the returned array.",
        )),
        standard_normal,
    );
    registry.register(
        FunctionDescriptor::new("add_one", "Add one to every cell of a range.", Shape::Range)
            .arg(ArgSpec::range("values", "numbers to increment")),
        add_one,
    );
    registry.register(
        FunctionDescriptor::new(
            "correl",
            "Pairwise correlation of the columns of a range.",
            Shape::Range,
        )
        .namespace("pandas")
        .arg(ArgSpec::range("df", "one variable per column, no header")),
        correl,
    );
    registry.register(
        FunctionDescriptor::new(
            "random_timeseries",
            "One standard normal draw per day between two dates.",
            Shape::Table,
        )
        .namespace("pandas")
        .arg(ArgSpec::scalar("start", "A date-formatted cell"))
        .arg(ArgSpec::scalar("end", "A date-formatted cell")),
        random_timeseries,
    );
    registry.register(
        FunctionDescriptor::new(
            "timeseries_start",
            "Earliest date in the first column of a table with a header row.",
            Shape::Scalar,
        )
        .namespace("pandas")
        .arg(ArgSpec::range("df", "dates in the first column, header on top")),
        timeseries_start,
    );
    registry.register(
        FunctionDescriptor::new(
            "last_calculated",
            "Time of the last recalculation.",
            Shape::Scalar,
        )
        .volatile(),
        last_calculated,
    );
}

// ── Handlers ─────────────────────────────────────────────────────────

fn hello(_: &InvocationContext<'_>, args: &[Arg]) -> Result<Grid, GridError> {
    Ok(Grid::scalar(format!("Hello {}!", args[0].as_text()?)))
}

fn standard_normal(_: &InvocationContext<'_>, args: &[Arg]) -> Result<Grid, GridError> {
    let rows = args[0].as_count()?;
    let columns = args[1].as_count()?;
    check_grid_size(rows, columns)?;
    let mut rng = rand::thread_rng();
    Ok(Grid::headerless(normal_matrix(&mut rng, rows, columns)))
}

fn add_one(_: &InvocationContext<'_>, args: &[Arg]) -> Result<Grid, GridError> {
    let rows = args[0]
        .as_range()
        .iter()
        .map(|row| row.iter().map(increment).collect::<Result<Vec<_>, _>>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Grid::headerless(rows))
}

fn correl(_: &InvocationContext<'_>, args: &[Arg]) -> Result<Grid, GridError> {
    let columns = numeric_columns(&args[0].as_range())?;
    let n = columns.len();
    let rows = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| Cell::from_f64(pearson(&columns[i], &columns[j])))
                .collect()
        })
        .collect();
    Ok(Grid::headerless(rows))
}

fn random_timeseries(_: &InvocationContext<'_>, args: &[Arg]) -> Result<Grid, GridError> {
    let start = args[0].as_date()?;
    let end = args[1].as_date()?;
    let days = usize::try_from((end - start).num_days() + 1).unwrap_or(0);
    check_grid_size(days, 2)?;
    let mut rng = rand::thread_rng();
    let rows = daily_range(start, end)
        .map(|day| vec![Cell::Date(day), Cell::Float(standard_normal_draw(&mut rng))])
        .collect();
    Ok(Grid::with_header(
        vec![String::new(), "Growth".to_string()],
        rows,
    ))
}

fn timeseries_start(_: &InvocationContext<'_>, args: &[Arg]) -> Result<Grid, GridError> {
    let range = args[0].as_range();
    let mut earliest: Option<NaiveDate> = None;
    for (i, row) in range.iter().enumerate().skip(1) {
        let Some(cell) = row.first() else { continue };
        let date = cell
            .to_date()
            .map_err(|e| GridError::Argument(format!("row {}: {e}", i + 1)))?;
        earliest = match (earliest, date) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
    earliest
        .map(Grid::scalar)
        .ok_or_else(|| GridError::Argument("no dates below the header row".into()))
}

fn last_calculated(_: &InvocationContext<'_>, _args: &[Arg]) -> Result<Grid, GridError> {
    let now = Local::now().naive_local();
    Ok(Grid::scalar(format!(
        "Last calculated: {}",
        now.format("%Y-%m-%d %H:%M:%S%.6f")
    )))
}

// ── Helpers ──────────────────────────────────────────────────────────

/// One draw from N(0, 1) via the Box-Muller transform.
pub fn standard_normal_draw<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // 1 - U keeps the log argument in (0, 1].
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

pub fn normal_matrix<R: Rng + ?Sized>(
    rng: &mut R,
    rows: usize,
    columns: usize,
) -> Vec<Vec<Cell>> {
    (0..rows)
        .map(|_| {
            (0..columns)
                .map(|_| Cell::Float(standard_normal_draw(rng)))
                .collect()
        })
        .collect()
}

fn increment(cell: &Cell) -> Result<Cell, GridError> {
    match cell {
        Cell::Int(i) => i
            .checked_add(1)
            .map(Cell::Int)
            .ok_or_else(|| GridError::Argument(format!("{i} + 1 overflows"))),
        Cell::Float(f) => Ok(Cell::Float(f + 1.0)),
        Cell::Bool(b) => Ok(Cell::Int(i64::from(*b) + 1)),
        Cell::Null => Err(GridError::Argument("cannot add 1 to an empty cell".into())),
        other => Err(GridError::Argument(format!("cannot add 1 to '{other}'"))),
    }
}

/// Split a range into numeric columns; empty cells are missing values.
fn numeric_columns(range: &[Vec<Cell>]) -> Result<Vec<Vec<Option<f64>>>, GridError> {
    let width = range.iter().map(Vec::len).max().unwrap_or(0);
    let mut columns = vec![Vec::with_capacity(range.len()); width];
    for row in range {
        for (j, column) in columns.iter_mut().enumerate() {
            let value = match row.get(j) {
                Some(cell) => cell.to_f64().map_err(GridError::Argument)?,
                None => None,
            };
            column.push(value);
        }
    }
    Ok(columns)
}

/// Pearson correlation over the rows where both columns have a value.
///
/// `None` when fewer than two such rows exist or either side is constant.
pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Every day from `start` to `end`, inclusive. Empty when `end < start`.
fn daily_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let days = (end - start).num_days();
    (0..=days).map(move |offset| start + Duration::days(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn box_muller_moments_are_standard() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| standard_normal_draw(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "variance {var}");
        assert!(draws.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn normal_matrix_has_requested_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = normal_matrix(&mut rng, 3, 2);
        assert_eq!(m.len(), 3);
        assert!(m.iter().all(|r| r.len() == 2));
        assert!(normal_matrix(&mut rng, 0, 5).is_empty());
    }

    #[test]
    fn pearson_known_values() {
        let x = [Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let y = [Some(2.0), Some(4.0), Some(6.0), Some(8.0)];
        let z = [Some(4.0), Some(3.0), Some(2.0), Some(1.0)];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &z).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_skips_missing_and_rejects_constants() {
        let x = [Some(1.0), None, Some(3.0), Some(5.0)];
        let y = [Some(1.0), Some(100.0), Some(3.0), Some(5.0)];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);
        let flat = [Some(2.0), Some(2.0), Some(2.0), Some(2.0)];
        assert_eq!(pearson(&x, &flat), None);
        assert_eq!(pearson(&[Some(1.0)], &[Some(1.0)]), None);
    }

    #[test]
    fn increment_rejects_text_and_blanks() {
        assert_eq!(increment(&Cell::Int(1)).unwrap(), Cell::Int(2));
        assert_eq!(increment(&Cell::Float(1.5)).unwrap(), Cell::Float(2.5));
        assert!(increment(&Cell::from("a")).is_err());
        assert!(increment(&Cell::Null).is_err());
    }

    proptest::proptest! {
        #[test]
        fn pearson_is_bounded_and_symmetric(
            xs in proptest::collection::vec(proptest::option::of(-1e3..1e3_f64), 0..30),
            ys in proptest::collection::vec(proptest::option::of(-1e3..1e3_f64), 0..30),
        ) {
            let ab = pearson(&xs, &ys);
            proptest::prop_assert_eq!(ab, pearson(&ys, &xs));
            if let Some(r) = ab {
                proptest::prop_assert!((-1.0..=1.0).contains(&r));
            }
        }
    }

    #[test]
    fn daily_range_is_inclusive() {
        let days: Vec<_> = daily_range(d(2024, 2, 28), d(2024, 3, 1)).collect();
        assert_eq!(days, vec![d(2024, 2, 28), d(2024, 2, 29), d(2024, 3, 1)]);
        assert_eq!(daily_range(d(2024, 3, 2), d(2024, 3, 1)).count(), 0);
    }
}
