//! Log-return construction and annualization.

use crate::domain::{BarField, BarSeries, Periodicity, ReturnRecord, Series};
use crate::error::DataError;
use chrono::NaiveDate;

/// Scale a per-period log return to an annualized percentage.
pub fn annualize(log_return: f64, periodicity: Periodicity) -> f64 {
    log_return * 100.0 * periodicity.periods_per_year() as f64
}

/// One record per adjacent pair of points, dated at the later point.
///
/// The first point has no predecessor and yields no record, so the output is
/// one shorter than the input. Every value must be finite and positive.
pub fn log_returns(
    series_name: &str,
    points: &[(NaiveDate, f64)],
    periodicity: Periodicity,
) -> Result<Vec<ReturnRecord>, DataError> {
    for &(date, value) in points {
        if !value.is_finite() || value <= 0.0 {
            return Err(DataError::NonPositiveValue {
                series: series_name.to_string(),
                date,
                value,
            });
        }
    }

    Ok(points
        .windows(2)
        .map(|w| {
            let log_return = w[1].1.ln() - w[0].1.ln();
            ReturnRecord {
                date: w[1].0,
                log_return,
                annualized_return: annualize(log_return, periodicity),
            }
        })
        .collect())
}

/// Returns of one bar field at the bars' own periodicity.
pub fn bar_returns(bars: &BarSeries, field: BarField) -> Result<Vec<ReturnRecord>, DataError> {
    let name = format!("{}.{}", bars.asset, field.as_str());
    let points = bars
        .bars
        .iter()
        .map(|b| {
            let value = match field {
                BarField::Close => Some(b.close),
                BarField::Volume => b.volume,
                BarField::MarketCap => b.market_cap,
            };
            value
                .map(|v| (b.period_start, v))
                .ok_or_else(|| DataError::MissingField {
                    series: name.clone(),
                    field: field.as_str(),
                    date: b.period_start,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    log_returns(&name, &points, bars.periodicity)
}

/// Daily returns straight from observations.
pub fn daily_returns(series: &Series, field: BarField) -> Result<Vec<ReturnRecord>, DataError> {
    let name = format!("{}.{}", series.asset(), field.as_str());
    let points = match field {
        BarField::Close => series.prices(),
        BarField::Volume => series.volumes(),
        BarField::MarketCap => series.market_caps()?,
    };
    log_returns(&name, &points, Periodicity::Daily)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn daily_example_scenario() {
        let points = vec![(d(1), 100.0), (d(2), 110.0), (d(3), 99.0)];
        let records = log_returns("btc", &points, Periodicity::Daily).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, d(2));
        assert!((records[0].log_return - 1.1f64.ln()).abs() < 1e-12);
        assert!((records[1].log_return - 0.9f64.ln()).abs() < 1e-12);
        assert!((records[0].annualized_return - 3478.82).abs() < 0.01);
        assert!((records[1].annualized_return + 3845.66).abs() < 0.01);
    }

    #[test]
    fn annualization_is_linear() {
        assert!((annualize(0.01, Periodicity::Monthly) - 12.0).abs() < 1e-9);
        assert!((annualize(0.01, Periodicity::Weekly) - 52.0).abs() < 1e-9);
        assert!((annualize(0.01, Periodicity::Daily) - 365.0).abs() < 1e-9);
    }

    #[test]
    fn single_point_has_no_returns() {
        let records = log_returns("btc", &[(d(1), 5.0)], Periodicity::Daily).unwrap();
        assert!(records.is_empty());
        assert!(log_returns("btc", &[], Periodicity::Daily).unwrap().is_empty());
    }

    #[test]
    fn zero_value_is_rejected() {
        let err = log_returns("hashrate", &[(d(1), 5.0), (d(2), 0.0)], Periodicity::Daily)
            .unwrap_err();
        match err {
            DataError::NonPositiveValue { date, .. } => assert_eq!(date, d(2)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn volume_returns_from_observations() {
        let series = Series::new(
            "bitcoin",
            vec![
                Observation { date: d(1), price: 1.0, total_volume: 10.0, market_cap: Some(1.0) },
                Observation { date: d(2), price: 1.0, total_volume: 20.0, market_cap: Some(1.0) },
            ],
        )
        .unwrap();
        let records = daily_returns(&series, BarField::Volume).unwrap();
        assert!((records[0].log_return - 2f64.ln()).abs() < 1e-12);
    }
}
