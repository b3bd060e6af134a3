//! Observation and Series: the raw daily record and its ordered container.

use crate::error::DataError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One asset's daily record as returned by a price feed.
///
/// `market_cap` may be transiently missing and must be repaired
/// (see [`crate::transform::impute`]) before downstream use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub price: f64,
    pub total_volume: f64,
    pub market_cap: Option<f64>,
}

impl Observation {
    /// Implied circulating supply: market cap / price.
    pub fn coin_count(&self) -> Option<f64> {
        self.market_cap.map(|mc| mc / self.price)
    }
}

/// Chronologically ordered observations for a single asset.
///
/// Construction enforces strictly increasing dates and finite, positive prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    asset: String,
    observations: Vec<Observation>,
}

impl Series {
    pub fn new(asset: impl Into<String>, observations: Vec<Observation>) -> Result<Self, DataError> {
        let asset = asset.into();

        for (i, obs) in observations.iter().enumerate() {
            if !obs.price.is_finite() || obs.price <= 0.0 {
                return Err(DataError::InvalidPrice {
                    asset,
                    date: obs.date,
                    price: obs.price,
                });
            }
            if i > 0 && observations[i - 1].date >= obs.date {
                return Err(DataError::NonMonotonicDates {
                    asset,
                    date: obs.date,
                });
            }
        }

        Ok(Self {
            asset,
            observations,
        })
    }

    /// Sort by date and keep the first observation of each date, then validate.
    ///
    /// Feeds occasionally return an extra intraday sample for the current day.
    pub fn from_unsorted(
        asset: impl Into<String>,
        mut observations: Vec<Observation>,
    ) -> Result<Self, DataError> {
        observations.sort_by_key(|o| o.date);
        observations.dedup_by_key(|o| o.date);
        Self::new(asset, observations)
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn into_observations(self) -> Vec<Observation> {
        self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Dates whose market cap is missing.
    pub fn missing_market_caps(&self) -> Vec<NaiveDate> {
        self.observations
            .iter()
            .filter(|o| o.market_cap.is_none())
            .map(|o| o.date)
            .collect()
    }

    /// Restrict to `start..=end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Series {
        Series {
            asset: self.asset.clone(),
            observations: self
                .observations
                .iter()
                .filter(|o| o.date >= start && o.date <= end)
                .cloned()
                .collect(),
        }
    }

    pub fn prices(&self) -> Vec<(NaiveDate, f64)> {
        self.observations.iter().map(|o| (o.date, o.price)).collect()
    }

    pub fn volumes(&self) -> Vec<(NaiveDate, f64)> {
        self.observations
            .iter()
            .map(|o| (o.date, o.total_volume))
            .collect()
    }

    /// Market caps as dated points; fails on the first missing entry.
    pub fn market_caps(&self) -> Result<Vec<(NaiveDate, f64)>, DataError> {
        self.observations
            .iter()
            .map(|o| {
                o.market_cap
                    .map(|mc| (o.date, mc))
                    .ok_or_else(|| DataError::MissingField {
                        series: self.asset.clone(),
                        field: "market_cap",
                        date: o.date,
                    })
            })
            .collect()
    }
}
