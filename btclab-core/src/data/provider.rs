//! Data feed traits.
//!
//! The three external collaborators (price API, factor archive, blockchain
//! metric API) are abstracted as traits returning tabular records, so the
//! pipeline can run against HTTP sources, local files, or test doubles.

use crate::domain::{DatedSeries, Observation};
use crate::error::FetchError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    CoinGecko,
    BlockchainInfo,
    FactorArchive,
    CsvImport,
    Cache,
    Synthetic,
}

/// Daily price / volume / market-cap feed.
pub trait PriceFeed: Send + Sync {
    /// Human-readable name of this feed.
    fn name(&self) -> &str;

    /// Daily observations for `asset` quoted in `quote` over `start..=end`.
    ///
    /// Market caps may be missing on some dates; prices may not.
    fn fetch_daily(
        &self,
        asset: &str,
        quote: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, FetchError>;

    fn source(&self) -> DataSource;

    /// Whether the feed currently accepts requests (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}

/// Monthly factor table archive, delivered as the extracted CSV text.
pub trait FactorSource: Send + Sync {
    fn name(&self) -> &str;

    fn fetch_csv(&self) -> Result<String, FetchError>;
}

/// Network metric series (e.g. hashrate).
#[derive(Debug, Clone)]
pub struct MetricData {
    /// Daily (or near-daily) metric values. This is what the pipeline consumes.
    pub daily: DatedSeries,
    /// Irregularly spaced companion series (e.g. difficulty adjustments), if fetched.
    pub secondary: Option<DatedSeries>,
}

/// Blockchain metric feed.
pub trait MetricFeed: Send + Sync {
    fn name(&self) -> &str;

    fn fetch_metric(
        &self,
        metric: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<MetricData, FetchError>;

    fn is_available(&self) -> bool {
        true
    }
}

/// Progress callback for multi-asset fetches.
pub trait FetchProgress {
    fn on_start(&self, asset: &str, index: usize, total: usize);

    fn on_complete(&self, asset: &str, index: usize, total: usize, result: &Result<(), FetchError>);

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that emits tracing events.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_start(&self, asset: &str, index: usize, total: usize) {
        info!("[{}/{}] fetching {asset}", index + 1, total);
    }

    fn on_complete(&self, asset: &str, _index: usize, _total: usize, result: &Result<(), FetchError>) {
        match result {
            Ok(()) => info!(asset, "fetched"),
            Err(e) => warn!(asset, error = %e, "fetch failed"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        info!(succeeded, failed, total, "fetch complete");
    }
}
