//! Resampled bar: OHLC summary of one calendar period.

use super::period::Periodicity;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// OHLC bar for a single period, keyed by the period's first calendar day.
///
/// `volume` and `market_cap` are present only when the resampler was asked
/// to aggregate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub period_start: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
}

impl Bar {
    /// Degenerate bar for a single observed value.
    pub fn point(period_start: NaiveDate, value: f64) -> Self {
        Self {
            period_start,
            open: value,
            high: value,
            low: value,
            close: value,
            volume: None,
            market_cap: None,
        }
    }

    /// high >= max(open, close) and low <= min(open, close).
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }
}

/// Which bar field a derived series is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarField {
    Close,
    Volume,
    MarketCap,
}

impl BarField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Volume => "volume",
            Self::MarketCap => "market_cap",
        }
    }
}

/// Bars of one asset at one periodicity, in ascending period order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    pub asset: String,
    pub periodicity: Periodicity,
    pub bars: Vec<Bar>,
}

impl BarSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<(NaiveDate, f64)> {
        self.bars.iter().map(|b| (b.period_start, b.close)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_bar_is_sane() {
        let bar = Bar::point(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 42.0);
        assert!(bar.is_sane());
        assert_eq!(bar.open, bar.close);
    }

    #[test]
    fn inverted_bar_is_not_sane() {
        let mut bar = Bar::point(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 42.0);
        bar.low = 50.0;
        assert!(!bar.is_sane());
    }
}
