//! Intra-period volatility of daily returns.
//!
//! Daily annualized returns are grouped by the coarser period and labelled
//! with the period's last calendar day. The label is then moved to the
//! period start by rolling forward to the next period boundary and stepping
//! back one period. The result keys line up with resampled bars.

use crate::domain::{DatedSeries, Periodicity, ReturnRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Sample standard deviation (n − 1) of `annualized_return` per period.
///
/// Periods with fewer than two daily returns yield NaN and are kept;
/// callers filter non-finite values before regression.
pub fn period_volatility(
    name: impl Into<String>,
    daily: &[ReturnRecord],
    target: Periodicity,
) -> DatedSeries {
    let mut by_label: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for r in daily {
        by_label
            .entry(target.period_end(r.date))
            .or_default()
            .push(r.annualized_return);
    }

    DatedSeries::from_points(
        name,
        by_label
            .into_iter()
            .map(|(label, values)| (shift_to_period_start(label, target), sample_std(&values))),
    )
}

/// Ceiling `label` to the next period boundary, then subtract one period.
pub fn shift_to_period_start(label: NaiveDate, target: Periodicity) -> NaiveDate {
    target.previous_period_start(target.next_period_start(label))
}

pub(crate) fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, day).unwrap()
    }

    fn rec(date: NaiveDate, annualized_return: f64) -> ReturnRecord {
        ReturnRecord {
            date,
            log_return: annualized_return / 36_500.0,
            annualized_return,
        }
    }

    #[test]
    fn monthly_volatility_keyed_at_month_start() {
        let daily = vec![
            rec(d(1, 2), 1.0),
            rec(d(1, 3), 3.0),
            rec(d(2, 10), 10.0),
            rec(d(2, 11), 20.0),
            rec(d(2, 12), 30.0),
        ];
        let vol = period_volatility("btc_vol", &daily, Periodicity::Monthly);

        assert_eq!(vol.len(), 2);
        assert!((vol.get(d(1, 1)).unwrap() - 2f64.sqrt()).abs() < 1e-12);
        assert!((vol.get(d(2, 1)).unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn single_observation_period_is_nan() {
        let vol = period_volatility("v", &[rec(d(3, 31), 5.0)], Periodicity::Monthly);
        assert!(vol.get(d(3, 1)).unwrap().is_nan());
    }

    #[test]
    fn shift_rule_maps_period_end_to_start() {
        assert_eq!(shift_to_period_start(d(1, 31), Periodicity::Monthly), d(1, 1));
        assert_eq!(shift_to_period_start(d(2, 29), Periodicity::Monthly), d(2, 1));
        // Sunday 2020-01-12 closes the ISO week starting Monday 2020-01-06
        assert_eq!(shift_to_period_start(d(1, 12), Periodicity::Weekly), d(1, 6));
    }

    #[test]
    fn weekly_volatility() {
        let daily = vec![rec(d(1, 6), 2.0), rec(d(1, 8), 4.0), rec(d(1, 13), 7.0)];
        let vol = period_volatility("v", &daily, Periodicity::Weekly);
        assert!((vol.get(d(1, 6)).unwrap() - 2f64.sqrt()).abs() < 1e-12);
        assert!(vol.get(d(1, 13)).unwrap().is_nan());
    }
}
