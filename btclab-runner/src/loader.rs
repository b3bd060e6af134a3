//! Data loading and source resolution for a study run.
//!
//! Price series follow a fallback policy:
//! 1. If the cache fully covers the range → use it
//! 2. Otherwise, if a feed is available → fetch and cache
//! 3. If nothing worked and `synthetic` is set → generate a synthetic series (tagged)
//! 4. Otherwise → fail with a clear error
//!
//! The factor table and the network metric follow steps 2–4 (they are small
//! and not cached).

use crate::config::{FactorConfig, MetricConfig};
use crate::synthetic;
use btclab_core::data::{
    parse_factor_csv, CoverageResult, DataSource, FactorSource, FactorTable, FetchProgress,
    MetricFeed, ObservationCache, PriceFeed,
};
use btclab_core::domain::{DatedSeries, Series};
use btclab_core::error::{DataError, FetchError};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no cached data for '{asset}' and no network access (use --synthetic for synthetic data)")]
    NoCachedDataOffline { asset: String },

    #[error("no data for '{asset}': {source}")]
    FetchFailed {
        asset: String,
        #[source]
        source: FetchError,
    },

    #[error("no source configured for '{0}'")]
    NoSource(String),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

impl LoadError {
    /// The asset (or auxiliary source) the failure belongs to, when known.
    pub fn asset(&self) -> Option<&str> {
        match self {
            Self::NoCachedDataOffline { asset } | Self::FetchFailed { asset, .. } => Some(asset),
            Self::NoSource(asset) => Some(asset),
            Self::Fetch(_) | Self::Data(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub quote: String,
    /// Never make network requests.
    pub offline: bool,
    /// Generate synthetic data when real data is unavailable.
    pub synthetic: bool,
    /// Re-fetch even if cached.
    pub force: bool,
}

/// Validated daily series for every requested asset, with provenance.
#[derive(Debug)]
pub struct LoadedSeries {
    /// In request order.
    pub series: Vec<Series>,
    pub sources: BTreeMap<String, DataSource>,
    /// BLAKE3 over all loaded observations.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

fn fallback(asset: &str, opts: &LoadOptions, last_error: Option<FetchError>) -> Result<(), LoadError> {
    if opts.synthetic {
        warn!(asset, "generating synthetic data, results will be tagged as synthetic");
        return Ok(());
    }
    match last_error {
        Some(source) => Err(LoadError::FetchFailed {
            asset: asset.to_string(),
            source,
        }),
        None if opts.offline => Err(LoadError::NoCachedDataOffline {
            asset: asset.to_string(),
        }),
        None => Err(LoadError::NoSource(asset.to_string())),
    }
}

/// Load daily observations for each asset from the cache, a feed, or the
/// synthetic generator.
pub fn load_observations(
    assets: &[&str],
    cache: &ObservationCache,
    feed: Option<&dyn PriceFeed>,
    progress: Option<&dyn FetchProgress>,
    opts: &LoadOptions,
) -> Result<LoadedSeries, LoadError> {
    let mut series = Vec::with_capacity(assets.len());
    let mut sources = BTreeMap::new();
    let mut has_synthetic = false;
    let mut failed = 0usize;
    let total = assets.len();

    for (i, asset) in assets.iter().enumerate() {
        if let Some(p) = progress {
            p.on_start(asset, i, total);
        }

        // Step 1: cache
        if !opts.force
            && cache.covers_range(asset, &opts.quote, opts.start, opts.end)
                == CoverageResult::FullyCovered
        {
            if let Ok(obs) = cache.load(asset, &opts.quote) {
                let s = Series::from_unsorted(*asset, obs)?.between(opts.start, opts.end);
                if let Some(p) = progress {
                    p.on_complete(asset, i, total, &Ok(()));
                }
                series.push(s);
                sources.insert(asset.to_string(), DataSource::Cache);
                continue;
            }
        }

        // Step 2: feed
        let mut last_error = None;
        if !opts.offline {
            if let Some(feed) = feed.filter(|f| f.is_available()) {
                let fetched = feed
                    .fetch_daily(asset, &opts.quote, opts.start, opts.end)
                    .and_then(|obs| {
                        if obs.is_empty() {
                            Err(FetchError::AssetNotFound {
                                asset: asset.to_string(),
                            })
                        } else {
                            Ok(obs)
                        }
                    });
                match fetched {
                    Ok(obs) => {
                        let s = Series::from_unsorted(*asset, obs)?;
                        if let Err(e) =
                            cache.write(asset, &opts.quote, s.observations(), feed.name())
                        {
                            warn!(asset, error = %e, "failed to cache observations");
                        }
                        if let Some(p) = progress {
                            p.on_complete(asset, i, total, &Ok(()));
                        }
                        series.push(s);
                        sources.insert(asset.to_string(), feed.source());
                        continue;
                    }
                    Err(e) => {
                        let result = Err(e);
                        if let Some(p) = progress {
                            p.on_complete(asset, i, total, &result);
                        }
                        last_error = result.err();
                    }
                }
            }
        }

        // Steps 3–4: synthetic or fail
        if let Err(e) = fallback(asset, opts, last_error) {
            failed += 1;
            if let Some(p) = progress {
                p.on_batch_complete(series.len(), failed, total);
            }
            return Err(e);
        }
        let obs = synthetic::observations(asset, opts.start, opts.end);
        series.push(Series::new(*asset, obs)?);
        sources.insert(asset.to_string(), DataSource::Synthetic);
        has_synthetic = true;
    }

    if let Some(p) = progress {
        p.on_batch_complete(series.len(), failed, total);
    }

    let dataset_hash = compute_dataset_hash(&series);
    info!(assets = series.len(), %dataset_hash, has_synthetic, "observations loaded");

    Ok(LoadedSeries {
        series,
        sources,
        dataset_hash,
        has_synthetic,
    })
}

/// Fetch, parse, trim to `start` and annualize the factor table.
pub fn load_factors(
    config: &FactorConfig,
    source: Option<&dyn FactorSource>,
    opts: &LoadOptions,
) -> Result<(FactorTable, DataSource), LoadError> {
    let mut last_error = None;
    if !(opts.offline && config.is_remote()) {
        if let Some(source) = source {
            match source.fetch_csv() {
                Ok(text) => {
                    let table = parse_factor_csv(&text)?.since(opts.start).annualized();
                    info!(source = source.name(), months = table.len(), "factor table loaded");
                    return Ok((table, DataSource::FactorArchive));
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "factor fetch failed");
                    last_error = Some(e);
                }
            }
        }
    }

    fallback("factors", opts, last_error)?;
    let mut columns = config.columns.clone();
    if !columns.contains(&config.risk_free) {
        columns.push(config.risk_free.clone());
    }
    let text = synthetic::factor_csv(&columns, opts.start, opts.end);
    let table = parse_factor_csv(&text)?.since(opts.start).annualized();
    Ok((table, DataSource::Synthetic))
}

/// Fetch the daily network metric series.
pub fn load_metric(
    config: &MetricConfig,
    feed: Option<&dyn MetricFeed>,
    opts: &LoadOptions,
) -> Result<(DatedSeries, DataSource), LoadError> {
    let mut last_error = None;
    if !opts.offline {
        if let Some(feed) = feed.filter(|f| f.is_available()) {
            match feed.fetch_metric(&config.name, opts.start, opts.end) {
                Ok(data) => {
                    if let Some(secondary) = &data.secondary {
                        info!(series = %secondary.name, points = secondary.len(), "secondary metric fetched (not used)");
                    }
                    info!(metric = %config.name, points = data.daily.len(), "metric loaded");
                    return Ok((data.daily, DataSource::BlockchainInfo));
                }
                Err(e) => {
                    warn!(metric = %config.name, error = %e, "metric fetch failed");
                    last_error = Some(e);
                }
            }
        }
    }

    fallback(&config.name, opts, last_error)?;
    Ok((
        synthetic::metric(&config.name, opts.start, opts.end),
        DataSource::Synthetic,
    ))
}

/// Deterministic BLAKE3 hash over every observation, in request order.
fn compute_dataset_hash(series: &[Series]) -> String {
    let mut hasher = blake3::Hasher::new();
    for s in series {
        hasher.update(s.asset().as_bytes());
        for o in s.observations() {
            hasher.update(o.date.to_string().as_bytes());
            hasher.update(&o.price.to_le_bytes());
            hasher.update(&o.total_volume.to_le_bytes());
            hasher.update(&o.market_cap.unwrap_or(f64::NAN).to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
