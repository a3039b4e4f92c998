//! Criterion benchmarks for the summary pipeline.
//!
//! Benchmarks:
//! 1. Full `summarize` over feeds of growing size
//! 2. Duplicate-row removal on its own

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gridfeed_core::data::{Canonicalizer, Metric};
use gridfeed_core::{summarize, Cell, RawDataset};

// ── Helpers ──────────────────────────────────────────────────────────

/// `addresses` properties snapshotted three times a day for `days` days,
/// with every tenth value zeroed out.
fn make_feed(addresses: usize, days: i64) -> RawDataset {
    let base = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let mut ds = RawDataset::new([
        "formatted_address",
        "datamachine_load_time",
        "avg_usd_sqft_yr",
        "sum_min_size_sqft",
    ]);
    let mut n = 0usize;
    for day in 0..days {
        for hour in [6, 12, 18] {
            let ts = (base + Duration::days(day)).and_hms_opt(hour, 0, 0).unwrap();
            for a in 0..addresses {
                n += 1;
                let usd = if n % 10 == 0 {
                    0.0
                } else {
                    20.0 + (n as f64 * 0.37).sin() * 5.0
                };
                ds.push_row(vec![
                    Cell::from(format!("{a} Market St")),
                    Cell::from(ts),
                    Cell::Float(usd),
                    Cell::Int(1_000 + a as i64),
                ]);
            }
        }
    }
    ds
}

// ── 1. Summarize ─────────────────────────────────────────────────────

fn bench_summarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarize");
    for (addresses, days) in [(50, 30), (200, 90), (500, 365)] {
        let feed = make_feed(addresses, days);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{addresses}x{days}")),
            &feed,
            |b, feed| b.iter(|| summarize(black_box(feed), Metric::UsdPerSqftYear)),
        );
    }
    group.finish();
}

// ── 2. Dedupe ────────────────────────────────────────────────────────

fn bench_dedupe(c: &mut Criterion) {
    let mut feed = make_feed(200, 90);
    let copy = feed.clone();
    for row in copy.rows() {
        feed.push_row(row.clone());
    }
    c.bench_function("dedupe_200x90_doubled", |b| {
        b.iter(|| {
            let mut ds = feed.clone();
            Canonicalizer::dedupe(black_box(&mut ds)).unwrap();
            ds
        })
    });
}

criterion_group!(benches, bench_summarize, bench_dedupe);
criterion_main!(benches);
