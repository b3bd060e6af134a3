//! Batch fetch: pull several assets from a price feed into the cache with
//! progress reporting.

use super::cache::{CoverageResult, ObservationCache};
use super::provider::{FetchProgress, PriceFeed};
use crate::domain::Series;
use crate::error::FetchError;
use chrono::NaiveDate;

/// Fetch each asset (skipping ones the cache already covers unless `force`),
/// validate, and write it to the cache.
#[allow(clippy::too_many_arguments)]
pub fn fetch_assets(
    feed: &dyn PriceFeed,
    cache: &ObservationCache,
    assets: &[&str],
    quote: &str,
    start: NaiveDate,
    end: NaiveDate,
    force: bool,
    progress: &dyn FetchProgress,
) -> FetchSummary {
    let total = assets.len();
    let mut succeeded = 0;
    let mut failed = 0;
    let mut errors: Vec<(String, FetchError)> = Vec::new();

    for (i, asset) in assets.iter().enumerate() {
        progress.on_start(asset, i, total);

        if !force && cache.covers_range(asset, quote, start, end) == CoverageResult::FullyCovered {
            progress.on_complete(asset, i, total, &Ok(()));
            succeeded += 1;
            continue;
        }

        let result = fetch_single(feed, cache, asset, quote, start, end);
        progress.on_complete(asset, i, total, &result);

        match result {
            Ok(()) => succeeded += 1,
            Err(e) => {
                errors.push((asset.to_string(), e));
                failed += 1;
            }
        }

        // Stop early once the feed refuses requests
        if !feed.is_available() {
            for rest in &assets[(i + 1)..] {
                errors.push((rest.to_string(), FetchError::CircuitBreakerTripped));
                failed += 1;
            }
            break;
        }
    }

    progress.on_batch_complete(succeeded, failed, total);

    FetchSummary {
        total,
        succeeded,
        failed,
        errors,
    }
}

fn fetch_single(
    feed: &dyn PriceFeed,
    cache: &ObservationCache,
    asset: &str,
    quote: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), FetchError> {
    let observations = feed.fetch_daily(asset, quote, start, end)?;
    let series = Series::from_unsorted(asset, observations)
        .map_err(|e| FetchError::ResponseFormatChanged(e.to_string()))?;
    cache.write(asset, quote, series.observations(), feed.name())
}

#[derive(Debug)]
pub struct FetchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, FetchError)>,
}

impl FetchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{DataSource, LogProgress};
    use crate::domain::Observation;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFeed {
        calls: AtomicUsize,
    }

    impl PriceFeed for CountingFeed {
        fn name(&self) -> &str {
            "counting"
        }

        fn fetch_daily(
            &self,
            asset: &str,
            _quote: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<Observation>, FetchError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if asset == "missing" {
                return Err(FetchError::AssetNotFound {
                    asset: asset.to_string(),
                });
            }
            Ok(start
                .iter_days()
                .take_while(|d| *d <= end)
                .map(|date| Observation {
                    date,
                    price: 10.0,
                    total_volume: 1.0,
                    market_cap: Some(100.0),
                })
                .collect())
        }

        fn source(&self) -> DataSource {
            DataSource::CsvImport
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, day).unwrap()
    }

    #[test]
    fn caches_successes_and_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObservationCache::new(dir.path());
        let feed = CountingFeed {
            calls: AtomicUsize::new(0),
        };

        let summary = fetch_assets(
            &feed,
            &cache,
            &["bitcoin", "missing"],
            "usd",
            d(1),
            d(5),
            false,
            &LogProgress,
        );

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_succeeded());
        assert_eq!(summary.errors[0].0, "missing");
        assert_eq!(cache.load("bitcoin", "usd").unwrap().len(), 5);
    }

    #[test]
    fn covered_assets_are_not_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObservationCache::new(dir.path());
        let feed = CountingFeed {
            calls: AtomicUsize::new(0),
        };

        fetch_assets(&feed, &cache, &["bitcoin"], "usd", d(1), d(5), false, &LogProgress);
        fetch_assets(&feed, &cache, &["bitcoin"], "usd", d(1), d(5), false, &LogProgress);
        assert_eq!(feed.calls.load(Ordering::Relaxed), 1);

        fetch_assets(&feed, &cache, &["bitcoin"], "usd", d(1), d(5), true, &LogProgress);
        assert_eq!(feed.calls.load(Ordering::Relaxed), 2);
    }
}
