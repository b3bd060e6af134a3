//! Blockchain.com charts feed for network metrics (hashrate, difficulty).

use super::circuit_breaker::CircuitBreaker;
use super::http::HttpFetcher;
use super::provider::{MetricData, MetricFeed};
use crate::domain::DatedSeries;
use crate::error::FetchError;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.blockchain.info";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    #[serde(default)]
    status: Option<String>,
    values: Vec<ChartPoint>,
}

#[derive(Debug, Deserialize)]
struct ChartPoint {
    x: i64,
    y: f64,
}

pub struct BlockchainInfoProvider {
    http: HttpFetcher,
    base_url: String,
    secondary: Option<String>,
}

impl BlockchainInfoProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, FetchError> {
        Ok(Self {
            http: HttpFetcher::new("blockchain_info", circuit_breaker, Duration::from_secs(30))?,
            base_url: DEFAULT_BASE_URL.to_string(),
            secondary: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Also fetch an irregular companion chart (e.g. `difficulty`).
    pub fn with_secondary(mut self, chart: impl Into<String>) -> Self {
        self.secondary = Some(chart.into());
        self
    }

    fn chart(&self, chart: &str, start: NaiveDate, end: NaiveDate) -> Result<DatedSeries, FetchError> {
        let url = format!(
            "{}/charts/{chart}?timespan=all&sampled=false&format=json",
            self.base_url
        );
        let resp: ChartResponse = self.http.get_json(&url)?;
        parse_chart(chart, resp, start, end)
    }
}

fn parse_chart(
    chart: &str,
    resp: ChartResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<DatedSeries, FetchError> {
    if let Some(status) = resp.status.as_deref() {
        if status != "ok" {
            return Err(FetchError::ResponseFormatChanged(format!(
                "{chart}: status '{status}'"
            )));
        }
    }

    let mut series = DatedSeries::new(chart);
    for p in resp.values {
        let date = DateTime::from_timestamp(p.x, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| FetchError::ResponseFormatChanged(format!("invalid timestamp: {}", p.x)))?;
        if date >= start && date <= end {
            series.points.insert(date, p.y);
        }
    }

    debug!(chart, points = series.len(), "parsed chart");
    Ok(series)
}

impl MetricFeed for BlockchainInfoProvider {
    fn name(&self) -> &str {
        "blockchain_info"
    }

    fn fetch_metric(
        &self,
        metric: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<MetricData, FetchError> {
        let daily = self.chart(metric, start, end)?;
        let secondary = match &self.secondary {
            Some(chart) => Some(self.chart(chart, start, end)?),
            None => None,
        };
        Ok(MetricData { daily, secondary })
    }

    fn is_available(&self) -> bool {
        self.http.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_points_within_range() {
        // 2021-01-01, 2021-01-02, 2021-02-01
        let json = r#"{"status":"ok","values":[
            {"x":1609459200,"y":150.5},
            {"x":1609545600,"y":151.0},
            {"x":1612137600,"y":160.0}
        ]}"#;
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2021, 1, 31).unwrap();

        let series = parse_chart("hash-rate", resp, start, end).unwrap();
        assert_eq!(series.name, "hash-rate");
        assert_eq!(series.len(), 2);
        assert_eq!(series.get(start), Some(150.5));
    }

    #[test]
    fn error_status_is_rejected() {
        let resp = ChartResponse {
            status: Some("error".into()),
            values: vec![],
        };
        let d = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert!(parse_chart("hash-rate", resp, d, d).is_err());
    }
}
