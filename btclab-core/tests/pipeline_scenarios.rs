//! Concrete end-to-end scenarios over the core transforms: a short daily
//! series is imputed, resampled, turned into returns and aligned.

use btclab_core::data::parse_factor_csv;
use btclab_core::domain::{annualized_series, BarField, DatedSeries, Observation, Periodicity, Series};
use btclab_core::error::DataError;
use btclab_core::transform::{
    bar_returns, cycle_buckets, daily_returns, impute_market_cap, period_volatility, resample,
    resample_bars, CycleSpec, JoinKind, Panel, ResampleSpec,
};
use chrono::NaiveDate;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn obs(date: NaiveDate, price: f64, market_cap: Option<f64>) -> Observation {
    Observation {
        date,
        price,
        total_volume: 10.0,
        market_cap,
    }
}

#[test]
fn three_day_closes_give_two_returns() {
    let series = Series::new(
        "bitcoin",
        vec![
            obs(d(2021, 1, 1), 100.0, Some(1.0)),
            obs(d(2021, 1, 2), 110.0, Some(1.0)),
            obs(d(2021, 1, 3), 99.0, Some(1.0)),
        ],
    )
    .unwrap();

    let records = daily_returns(&series, BarField::Close).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].date, d(2021, 1, 2));
    assert_eq!(records[1].date, d(2021, 1, 3));

    // ln(110/100) and ln(99/110) = ln(0.9)
    assert!((records[0].log_return - 1.1_f64.ln()).abs() < 1e-12);
    assert!((records[1].log_return - 0.9_f64.ln()).abs() < 1e-12);
    assert!((records[0].annualized_return - 3478.82).abs() < 0.01);
    assert!((records[1].annualized_return + 3845.66).abs() < 0.01);
}

#[test]
fn gap_on_first_row_is_rejected() {
    let series = Series::new(
        "bitcoin",
        vec![
            obs(d(2021, 1, 1), 100.0, None),
            obs(d(2021, 1, 2), 110.0, Some(1_100.0)),
            obs(d(2021, 1, 3), 99.0, Some(990.0)),
        ],
    )
    .unwrap();

    assert!(matches!(
        impute_market_cap(&series),
        Err(DataError::ImputationAtBoundary { date, .. }) if date == d(2021, 1, 1)
    ));
}

#[test]
fn complete_series_needs_no_imputation() {
    let series = Series::new(
        "bitcoin",
        vec![
            obs(d(2021, 1, 1), 100.0, Some(1_000.0)),
            obs(d(2021, 1, 2), 110.0, Some(1_100.0)),
        ],
    )
    .unwrap();
    let result = impute_market_cap(&series).unwrap();
    assert!(result.imputed_dates.is_empty());
    assert_eq!(result.series, series);
}

#[test]
fn weekly_bars_cannot_become_monthly() {
    let series = Series::new(
        "bitcoin",
        (1..=20).map(|day| obs(d(2021, 3, day), 100.0 + day as f64, Some(1.0))).collect(),
    )
    .unwrap();
    let weekly = resample(&series, Periodicity::Weekly, &ResampleSpec::default()).unwrap();
    assert!(matches!(
        resample_bars(&weekly, Periodicity::Monthly, &ResampleSpec::default()),
        Err(DataError::IncompatiblePeriods { .. })
    ));
}

#[test]
fn monthly_returns_and_volatility_share_keys() {
    // Jan 1 through Apr 30, 2021
    let start = d(2021, 1, 1);
    let observations: Vec<Observation> = (0..120)
        .map(|i| {
            let date = start + chrono::Duration::days(i);
            let price = 100.0 * (1.0 + 0.01 * ((i % 7) as f64));
            obs(date, price, Some(price * 18.0e6))
        })
        .collect();
    let series = Series::new("bitcoin", observations).unwrap();

    let monthly = resample(&series, Periodicity::Monthly, &ResampleSpec::default()).unwrap();
    assert_eq!(monthly.len(), 4);
    let returns = bar_returns(&monthly, BarField::Close).unwrap();
    let price = annualized_series("btc_price", &returns);

    let daily = daily_returns(&series, BarField::Close).unwrap();
    let vol = period_volatility("btc_vol", &daily, Periodicity::Monthly);

    // Volatility covers Jan..Apr; returns start in Feb. An inner join keeps Feb..Apr.
    assert_eq!(vol.len(), 4);
    let panel = Panel::join(vec![price, vol], JoinKind::Inner).unwrap();
    assert_eq!(panel.dates(), &[d(2021, 2, 1), d(2021, 3, 1), d(2021, 4, 1)]);
    assert!(panel.column("btc_vol").unwrap().iter().all(|v| v.is_finite()));
}

#[test]
fn excess_return_against_factor_table() {
    let csv = "\
header line
,Mkt-RF,RF
202101,1.0,0.01
202102,2.0,0.02
202103,3.0,0.03

 Annual Factors: January-December
,Mkt-RF,RF
2021,6.0,0.06
";
    let table = parse_factor_csv(csv).unwrap().since(d(2021, 2, 1)).annualized();
    assert_eq!(table.len(), 2);

    let asset = DatedSeries::from_points("btc", vec![(d(2021, 2, 1), 10.0), (d(2021, 3, 1), 20.0)]);
    let rf = table.column("RF").unwrap();
    let panel = Panel::join(vec![asset, rf], JoinKind::Inner)
        .unwrap()
        .with_difference("btc_excess", "btc", "RF")
        .unwrap();

    let excess = panel.column("btc_excess").unwrap();
    assert!((excess[0] - (10.0 - 0.24)).abs() < 1e-9);
    assert!((excess[1] - (20.0 - 0.36)).abs() < 1e-9);
}

#[test]
fn drop_recent_and_oldest_trim_the_panel() {
    let s = DatedSeries::from_points("a", (1..=5).map(|m| (d(2021, m, 1), m as f64)));
    let panel = Panel::join(vec![s], JoinKind::Inner)
        .unwrap()
        .drop_oldest(1)
        .drop_recent(2);
    assert_eq!(panel.dates(), &[d(2021, 2, 1), d(2021, 3, 1)]);
    assert_eq!(panel.column("a").unwrap(), &[2.0, 3.0]);
}

#[test]
fn month_of_year_buckets_cover_twelve_months() {
    let start = d(2019, 1, 1);
    let series = Series::new(
        "bitcoin",
        (0..(3 * 366))
            .map(|i| {
                let date = start + chrono::Duration::days(i);
                obs(date, 100.0 + (i % 30) as f64, Some(1.0))
            })
            .collect(),
    )
    .unwrap();
    let monthly = resample(&series, Periodicity::Monthly, &ResampleSpec::ohlc_only()).unwrap();
    let returns = bar_returns(&monthly, BarField::Close).unwrap();

    let buckets = cycle_buckets(&returns, CycleSpec::month_of_year(returns[0].date)).unwrap();
    assert_eq!(buckets.len(), 12);
    assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), returns.len());
}
