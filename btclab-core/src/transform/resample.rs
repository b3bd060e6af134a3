//! Calendar resampling of daily data into weekly / monthly OHLC bars.
//!
//! Periods follow calendar boundaries (ISO week, calendar month) and bars are
//! keyed by the period's first day. Partial first/last periods are emitted
//! as-is; callers decide whether to trust boundary bars.

use crate::domain::{Bar, BarSeries, DatedSeries, Periodicity, Series};
use crate::error::DataError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How an auxiliary column is reduced over a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Sum of all values in the period.
    Sum,
    /// Value on the period's close date.
    Last,
    /// Arithmetic mean over the period.
    Mean,
}

/// Which auxiliary columns to carry and how. `None` drops the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResampleSpec {
    pub volume: Option<Aggregation>,
    pub market_cap: Option<Aggregation>,
}

impl Default for ResampleSpec {
    fn default() -> Self {
        Self {
            volume: Some(Aggregation::Sum),
            market_cap: Some(Aggregation::Last),
        }
    }
}

impl ResampleSpec {
    /// Prices only.
    pub fn ohlc_only() -> Self {
        Self {
            volume: None,
            market_cap: None,
        }
    }
}

/// Resample a daily observation series.
///
/// OHLC comes strictly from `price`; volume and market cap follow `spec`.
pub fn resample(
    series: &Series,
    target: Periodicity,
    spec: &ResampleSpec,
) -> Result<BarSeries, DataError> {
    let daily = BarSeries {
        asset: series.asset().to_string(),
        periodicity: Periodicity::Daily,
        bars: series
            .observations()
            .iter()
            .map(|o| Bar {
                volume: Some(o.total_volume),
                market_cap: o.market_cap,
                ..Bar::point(o.date, o.price)
            })
            .collect(),
    };
    resample_bars(&daily, target, spec)
}

/// Regroup bars into a coarser (or equal) periodicity.
///
/// Resampling to the source periodicity is a no-op. Weekly bars cannot be
/// regrouped into months, and nothing can be made finer.
pub fn resample_bars(
    source: &BarSeries,
    target: Periodicity,
    spec: &ResampleSpec,
) -> Result<BarSeries, DataError> {
    if !source.periodicity.nests_into(target) {
        return Err(DataError::IncompatiblePeriods {
            from: source.periodicity.to_string(),
            to: target.to_string(),
        });
    }

    let mut bars: Vec<Bar> = Vec::new();
    let mut group: Vec<&Bar> = Vec::new();

    for bar in &source.bars {
        let key = target.period_start(bar.period_start);
        if let Some(first) = group.first() {
            if target.period_start(first.period_start) != key {
                bars.push(collapse(&source.asset, target, &group, spec)?);
                group.clear();
            }
        }
        group.push(bar);
    }
    if !group.is_empty() {
        bars.push(collapse(&source.asset, target, &group, spec)?);
    }

    debug!(
        asset = %source.asset,
        from = %source.periodicity,
        to = %target,
        input = source.bars.len(),
        output = bars.len(),
        "resampled"
    );

    Ok(BarSeries {
        asset: source.asset.clone(),
        periodicity: target,
        bars,
    })
}

/// Resample a dated metric series (e.g. hashrate), treating each value as a price.
///
/// Non-finite points are dropped before grouping.
pub fn resample_values(series: &DatedSeries, target: Periodicity) -> Result<BarSeries, DataError> {
    let mut dropped = 0usize;
    let bars: Vec<Bar> = series
        .points
        .iter()
        .filter(|(_, v)| {
            let keep = v.is_finite();
            if !keep {
                dropped += 1;
            }
            keep
        })
        .map(|(d, v)| Bar::point(*d, *v))
        .collect();

    if dropped > 0 {
        warn!(series = %series.name, dropped, "dropped non-finite points before resampling");
    }

    let daily = BarSeries {
        asset: series.name.clone(),
        periodicity: Periodicity::Daily,
        bars,
    };
    resample_bars(&daily, target, &ResampleSpec::ohlc_only())
}

fn collapse(
    asset: &str,
    target: Periodicity,
    group: &[&Bar],
    spec: &ResampleSpec,
) -> Result<Bar, DataError> {
    let first = group[0];
    let last = group[group.len() - 1];
    let period_start = target.period_start(first.period_start);

    let high = group.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = group.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

    let volume = match spec.volume {
        Some(agg) => aggregate(asset, "volume", group, agg, |b| b.volume)?,
        None => None,
    };
    let market_cap = match spec.market_cap {
        Some(agg) => aggregate(asset, "market_cap", group, agg, |b| b.market_cap)?,
        None => None,
    };

    Ok(Bar {
        period_start,
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
        market_cap,
    })
}

/// Reduce one auxiliary column. A column absent from every bar stays absent;
/// a column absent from only some of the bars it needs is an error.
fn aggregate(
    asset: &str,
    field: &'static str,
    group: &[&Bar],
    agg: Aggregation,
    get: impl Fn(&Bar) -> Option<f64>,
) -> Result<Option<f64>, DataError> {
    if group.iter().all(|b| get(b).is_none()) {
        return Ok(None);
    }

    let missing = |b: &Bar| DataError::MissingField {
        series: asset.to_string(),
        field,
        date: b.period_start,
    };

    match agg {
        Aggregation::Last => {
            let last = group[group.len() - 1];
            get(last).map(Some).ok_or_else(|| missing(last))
        }
        Aggregation::Sum | Aggregation::Mean => {
            let mut total = 0.0;
            for b in group {
                total += get(b).ok_or_else(|| missing(b))?;
            }
            if agg == Aggregation::Mean {
                total /= group.len() as f64;
            }
            Ok(Some(total))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series(points: &[(NaiveDate, f64)]) -> Series {
        Series::new(
            "bitcoin",
            points
                .iter()
                .map(|(date, price)| Observation {
                    date: *date,
                    price: *price,
                    total_volume: 1.0,
                    market_cap: Some(price * 10.0),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn monthly_ohlc_from_prices() {
        let s = series(&[
            (d(2020, 1, 30), 10.0),
            (d(2020, 1, 31), 12.0),
            (d(2020, 2, 1), 11.0),
            (d(2020, 2, 2), 15.0),
            (d(2020, 2, 3), 9.0),
            (d(2020, 2, 29), 13.0),
        ]);

        let out = resample(&s, Periodicity::Monthly, &ResampleSpec::default()).unwrap();
        assert_eq!(out.len(), 2);

        let jan = &out.bars[0];
        assert_eq!(jan.period_start, d(2020, 1, 1));
        assert_eq!((jan.open, jan.high, jan.low, jan.close), (10.0, 12.0, 10.0, 12.0));
        assert_eq!(jan.volume, Some(2.0));
        assert_eq!(jan.market_cap, Some(120.0));

        let feb = &out.bars[1];
        assert_eq!(feb.period_start, d(2020, 2, 1));
        assert_eq!((feb.open, feb.high, feb.low, feb.close), (11.0, 15.0, 9.0, 13.0));
        assert_eq!(feb.volume, Some(4.0));
        assert_eq!(feb.market_cap, Some(130.0));
    }

    #[test]
    fn weekly_bars_start_on_monday() {
        // 2024-01-05 is a Friday, 2024-01-08 a Monday
        let s = series(&[(d(2024, 1, 5), 1.0), (d(2024, 1, 7), 2.0), (d(2024, 1, 8), 3.0)]);
        let out = resample(&s, Periodicity::Weekly, &ResampleSpec::default()).unwrap();
        let starts: Vec<_> = out.bars.iter().map(|b| b.period_start).collect();
        assert_eq!(starts, vec![d(2024, 1, 1), d(2024, 1, 8)]);
        assert_eq!(out.bars[0].close, 2.0);
    }

    #[test]
    fn partial_boundary_period_is_emitted() {
        let s = series(&[(d(2020, 1, 31), 5.0), (d(2020, 2, 1), 6.0)]);
        let out = resample(&s, Periodicity::Monthly, &ResampleSpec::default()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.bars[0].open, 5.0);
    }

    #[test]
    fn ohlc_only_drops_auxiliary_columns() {
        let s = series(&[(d(2020, 1, 1), 5.0)]);
        let out = resample(&s, Periodicity::Monthly, &ResampleSpec::ohlc_only()).unwrap();
        assert_eq!(out.bars[0].volume, None);
        assert_eq!(out.bars[0].market_cap, None);
    }

    #[test]
    fn weekly_to_monthly_is_rejected() {
        let s = series(&[(d(2020, 1, 1), 5.0)]);
        let weekly = resample(&s, Periodicity::Weekly, &ResampleSpec::default()).unwrap();
        let err = resample_bars(&weekly, Periodicity::Monthly, &ResampleSpec::default());
        assert!(matches!(err, Err(DataError::IncompatiblePeriods { .. })));
    }

    #[test]
    fn last_market_cap_missing_on_close_date_is_an_error() {
        let mut obs = series(&[(d(2020, 1, 1), 5.0), (d(2020, 1, 2), 6.0)]).into_observations();
        obs[1].market_cap = None;
        let s = Series::new("bitcoin", obs).unwrap();
        let err = resample(&s, Periodicity::Monthly, &ResampleSpec::default());
        assert!(matches!(err, Err(DataError::MissingField { .. })));
    }

    #[test]
    fn resample_values_drops_nan_points() {
        let metric = DatedSeries::from_points(
            "hashrate",
            vec![(d(2020, 1, 1), 1.0), (d(2020, 1, 2), f64::NAN), (d(2020, 1, 3), 3.0)],
        );
        let out = resample_values(&metric, Periodicity::Monthly).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.bars[0].close, 3.0);
        assert_eq!(out.bars[0].high, 3.0);
    }
}
