//! Synthetic data for offline development.
//!
//! Seeded from a BLAKE3 hash of the series name, so the same name and range
//! always produce the same data. Anything built from these series is tagged
//! synthetic in the run output.

use btclab_core::domain::{DatedSeries, Observation};
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;

fn rng_for(name: &str) -> StdRng {
    let seed: [u8; 32] = *blake3::hash(name.as_bytes()).as_bytes();
    StdRng::from_seed(seed)
}

/// Daily random-walk observations (every calendar day, crypto trades 24/7).
///
/// Market caps follow a slowly growing coin supply, so the implied coin
/// count is smooth and the imputer has something sensible to interpolate.
pub fn observations(asset: &str, start: NaiveDate, end: NaiveDate) -> Vec<Observation> {
    let mut rng = rng_for(asset);
    let mut price = 10_000.0_f64;
    let mut supply = 18_000_000.0_f64;

    start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|date| {
            price *= 1.0 + rng.gen_range(-0.04..0.04);
            supply += rng.gen_range(0.0..1_000.0);
            Observation {
                date,
                price,
                total_volume: rng.gen_range(1.0e9..5.0e10),
                market_cap: Some(price * supply),
            }
        })
        .collect()
}

/// Daily, strictly positive, upward-drifting network metric.
pub fn metric(name: &str, start: NaiveDate, end: NaiveDate) -> DatedSeries {
    let mut rng = rng_for(name);
    let mut value = 100.0_f64;

    DatedSeries::from_points(
        name,
        start.iter_days().take_while(|d| *d <= end).map(|date| {
            value *= 1.0 + rng.gen_range(-0.02..0.025);
            (date, value)
        }),
    )
}

/// Monthly factor table in the archive's CSV layout, with a trailing
/// annual block like the real file.
pub fn factor_csv(columns: &[String], start: NaiveDate, end: NaiveDate) -> String {
    let mut rng = rng_for(&columns.join(","));
    let mut out = String::from("Synthetic factor table\n\n");

    let _ = writeln!(out, ",{}", columns.join(","));
    let mut month = start.with_day(1).unwrap_or(start);
    while month <= end {
        let values: Vec<String> = columns
            .iter()
            .map(|_| format!("{:.2}", rng.gen_range(-5.0..5.0)))
            .collect();
        let _ = writeln!(out, "{}{:02},{}", month.year(), month.month(), values.join(","));
        month = match month.checked_add_months(chrono::Months::new(1)) {
            Some(next) => next,
            None => break,
        };
    }

    let _ = writeln!(out, "\n Annual Factors: January-December");
    let _ = writeln!(out, ",{}", columns.join(","));
    let _ = writeln!(out, "{},{}", start.year(), vec!["1.00"; columns.len()].join(","));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use btclab_core::data::parse_factor_csv;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn observations_are_deterministic_and_daily() {
        let a = observations("bitcoin", d(2021, 1, 1), d(2021, 3, 31));
        let b = observations("bitcoin", d(2021, 1, 1), d(2021, 3, 31));
        assert_eq!(a, b);
        assert_eq!(a.len(), 90);
        assert!(a.iter().all(|o| o.price > 0.0 && o.market_cap.is_some()));
    }

    #[test]
    fn different_assets_differ() {
        let a = observations("bitcoin", d(2021, 1, 1), d(2021, 1, 10));
        let b = observations("ethereum", d(2021, 1, 1), d(2021, 1, 10));
        assert_ne!(a, b);
    }

    #[test]
    fn metric_is_positive() {
        let m = metric("hash-rate", d(2021, 1, 1), d(2021, 12, 31));
        assert_eq!(m.len(), 365);
        assert!(m.points.values().all(|v| *v > 0.0));
    }

    #[test]
    fn factor_csv_parses_and_drops_annual_block() {
        let columns = vec!["Mkt-RF".to_string(), "RF".to_string()];
        let text = factor_csv(&columns, d(2021, 1, 15), d(2021, 6, 30));
        let table = parse_factor_csv(&text).unwrap();
        assert_eq!(table.len(), 6);
        assert_eq!(table.first_date(), Some(d(2021, 1, 1)));
        assert_eq!(table.columns(), columns.as_slice());
    }
}
