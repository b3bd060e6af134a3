//! Seasonal cycle bucketing (day of week, month of year, halving cycle).

use super::volatility::sample_std;
use crate::domain::ReturnRecord;
use crate::error::ConfigError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Position of observation `observation_index` within a cycle of
/// `cycle_length`, offset by `shift`.
pub fn cycle_index(
    observation_index: usize,
    shift: usize,
    cycle_length: usize,
) -> Result<usize, ConfigError> {
    if cycle_length == 0 {
        return Err(ConfigError::ZeroCycleLength);
    }
    Ok((observation_index + shift) % cycle_length)
}

/// Cycle parameters for bucketing a regularly spaced return series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSpec {
    pub shift: usize,
    pub cycle_length: usize,
}

impl CycleSpec {
    /// Monday = 0 for daily records whose first record falls on `first`.
    pub fn day_of_week(first: NaiveDate) -> Self {
        Self {
            shift: first.weekday().num_days_from_monday() as usize,
            cycle_length: 7,
        }
    }

    /// January = 0 for monthly records whose first record falls in `first`'s month.
    pub fn month_of_year(first: NaiveDate) -> Self {
        Self {
            shift: first.month0() as usize,
            cycle_length: 12,
        }
    }

    /// Four-year halving cycle over yearly records; `shift` is the first
    /// record's position in the cycle.
    pub fn halving(shift: usize) -> Self {
        Self {
            shift,
            cycle_length: 4,
        }
    }
}

/// Summary of annualized returns falling into one cycle position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleBucket {
    pub index: usize,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; NaN with fewer than two members.
    pub std_dev: f64,
}

/// Group records by cycle position and summarise each bucket.
///
/// Always returns `cycle_length` buckets in index order; empty buckets have
/// `count == 0` and NaN statistics.
pub fn cycle_buckets(
    records: &[ReturnRecord],
    spec: CycleSpec,
) -> Result<Vec<CycleBucket>, ConfigError> {
    if spec.cycle_length == 0 {
        return Err(ConfigError::ZeroCycleLength);
    }

    let mut groups: Vec<Vec<f64>> = vec![Vec::new(); spec.cycle_length];
    for (i, r) in records.iter().enumerate() {
        let idx = cycle_index(i, spec.shift, spec.cycle_length)?;
        groups[idx].push(r.annualized_return);
    }

    Ok(groups
        .into_iter()
        .enumerate()
        .map(|(index, values)| {
            let count = values.len();
            let mean = if count == 0 {
                f64::NAN
            } else {
                values.iter().sum::<f64>() / count as f64
            };
            CycleBucket {
                index,
                count,
                mean,
                std_dev: sample_std(&values),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_wraps_with_shift() {
        assert_eq!(cycle_index(0, 3, 7).unwrap(), 3);
        assert_eq!(cycle_index(4, 3, 7).unwrap(), 0);
        assert_eq!(cycle_index(13, 0, 12).unwrap(), 1);
        assert!(cycle_index(1, 0, 0).is_err());
    }

    #[test]
    fn day_of_week_shift_from_first_date() {
        // 2024-01-03 is a Wednesday
        let spec = CycleSpec::day_of_week(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(spec.shift, 2);
        assert_eq!(spec.cycle_length, 7);
    }

    #[test]
    fn buckets_group_returns() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let records: Vec<ReturnRecord> = (0..6)
            .map(|i| ReturnRecord {
                date: start + chrono::Duration::days(i),
                log_return: 0.0,
                annualized_return: i as f64,
            })
            .collect();

        let buckets = cycle_buckets(&records, CycleSpec { shift: 1, cycle_length: 4 }).unwrap();

        assert_eq!(buckets.len(), 4);
        // i=3 -> idx 0 ; i=0,4 -> idx 1 ; i=1,5 -> idx 2 ; i=2 -> idx 3
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[1].count, 2);
        assert!((buckets[1].mean - 2.0).abs() < 1e-12);
        assert!((buckets[2].mean - 3.0).abs() < 1e-12);
        assert!(buckets[3].std_dev.is_nan());
    }
}
