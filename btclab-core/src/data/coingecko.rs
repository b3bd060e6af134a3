//! CoinGecko price feed.
//!
//! Uses `/coins/{id}/market_chart/range`, which returns three parallel arrays
//! of `[timestamp_ms, value]` pairs. Samples are collapsed to one observation
//! per UTC day (last sample of the day). The upstream market-cap array has
//! known holes and nulls around specific dates; those days come back with
//! `market_cap: None` for the imputer to repair.

use super::circuit_breaker::CircuitBreaker;
use super::http::HttpFetcher;
use super::provider::{DataSource, PriceFeed};
use crate::domain::Observation;
use crate::error::FetchError;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    prices: Vec<(f64, Option<f64>)>,
    #[serde(default)]
    market_caps: Vec<(f64, Option<f64>)>,
    #[serde(default)]
    total_volumes: Vec<(f64, Option<f64>)>,
}

pub struct CoinGeckoProvider {
    http: HttpFetcher,
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, FetchError> {
        Ok(Self {
            http: HttpFetcher::new("coingecko", circuit_breaker, Duration::from_secs(30))?,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn range_url(&self, asset: &str, quote: &str, start: NaiveDate, end: NaiveDate) -> String {
        let from = start.and_hms_opt(0, 0, 0).map_or(0, |dt| dt.and_utc().timestamp());
        let to = end.and_hms_opt(23, 59, 59).map_or(0, |dt| dt.and_utc().timestamp());
        format!(
            "{}/coins/{asset}/market_chart/range?vs_currency={quote}&from={from}&to={to}",
            self.base_url
        )
    }
}

/// Last sample per UTC day, skipping null values.
fn daily_last(samples: &[(f64, Option<f64>)]) -> Result<BTreeMap<NaiveDate, f64>, FetchError> {
    let mut out = BTreeMap::new();
    for &(ts_ms, value) in samples {
        let date = DateTime::from_timestamp_millis(ts_ms as i64)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| {
                FetchError::ResponseFormatChanged(format!("invalid timestamp: {ts_ms}"))
            })?;
        if let Some(v) = value {
            out.insert(date, v);
        }
    }
    Ok(out)
}

fn parse_response(
    asset: &str,
    resp: MarketChartResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Observation>, FetchError> {
    let prices = daily_last(&resp.prices)?;
    let market_caps = daily_last(&resp.market_caps)?;
    let volumes = daily_last(&resp.total_volumes)?;

    let observations: Vec<Observation> = prices
        .range(start..=end)
        .map(|(date, price)| {
            let total_volume = volumes.get(date).copied().unwrap_or_else(|| {
                warn!(asset, %date, "missing total volume, using 0");
                0.0
            });
            Observation {
                date: *date,
                price: *price,
                total_volume,
                market_cap: market_caps.get(date).copied(),
            }
        })
        .collect();

    if observations.is_empty() {
        return Err(FetchError::AssetNotFound {
            asset: asset.to_string(),
        });
    }

    let missing = observations.iter().filter(|o| o.market_cap.is_none()).count();
    debug!(asset, days = observations.len(), missing_market_caps = missing, "parsed market chart");

    Ok(observations)
}

impl PriceFeed for CoinGeckoProvider {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn fetch_daily(
        &self,
        asset: &str,
        quote: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, FetchError> {
        let url = self.range_url(asset, quote, start, end);
        let resp: MarketChartResponse = self.http.get_json(&url).map_err(|e| match e {
            FetchError::HttpStatus { status: 404, .. } => FetchError::AssetNotFound {
                asset: asset.to_string(),
            },
            other => other,
        })?;
        parse_response(asset, resp, start, end)
    }

    fn source(&self) -> DataSource {
        DataSource::CoinGecko
    }

    fn is_available(&self) -> bool {
        self.http.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: f64 = 86_400_000.0;
    // 2021-01-01T00:00:00Z
    const JAN1_MS: f64 = 1_609_459_200_000.0;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, day).unwrap()
    }

    #[test]
    fn parses_daily_samples_and_null_market_caps() {
        let json = format!(
            r#"{{
                "prices": [[{a}, 29000.0], [{b}, 29500.0], [{c}, 32000.0]],
                "market_caps": [[{a}, 5.4e11], [{b}, null], [{c}, 5.9e11]],
                "total_volumes": [[{a}, 4.0e10], [{b}, 4.1e10], [{c}, 4.2e10]]
            }}"#,
            a = JAN1_MS,
            b = JAN1_MS + DAY_MS,
            c = JAN1_MS + 2.0 * DAY_MS
        );
        let resp: MarketChartResponse = serde_json::from_str(&json).unwrap();
        let obs = parse_response("bitcoin", resp, d(1), d(31)).unwrap();

        assert_eq!(obs.len(), 3);
        assert_eq!(obs[0].date, d(1));
        assert_eq!(obs[1].market_cap, None);
        assert_eq!(obs[2].price, 32000.0);
    }

    #[test]
    fn keeps_last_sample_of_each_day() {
        let json = format!(
            r#"{{"prices": [[{a}, 1.0], [{b}, 2.0]], "market_caps": [], "total_volumes": []}}"#,
            a = JAN1_MS,
            b = JAN1_MS + 3_600_000.0
        );
        let resp: MarketChartResponse = serde_json::from_str(&json).unwrap();
        let obs = parse_response("bitcoin", resp, d(1), d(1)).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].price, 2.0);
        assert_eq!(obs[0].market_cap, None);
    }

    #[test]
    fn empty_range_is_asset_not_found() {
        let resp = MarketChartResponse {
            prices: vec![],
            market_caps: vec![],
            total_volumes: vec![],
        };
        assert!(matches!(
            parse_response("nope", resp, d(1), d(2)),
            Err(FetchError::AssetNotFound { .. })
        ));
    }
}
