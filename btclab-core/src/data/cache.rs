//! Parquet cache for fetched observations.
//!
//! Layout: `{cache_dir}/asset={ID}/{quote}.parquet` plus a
//! `{quote}.meta.json` sidecar (date range, row count, BLAKE3 hash).
//!
//! Writes are atomic (write to .tmp, rename into place). Corrupt files are
//! moved aside to `{file}.quarantined` on load.

use crate::domain::Observation;
use crate::error::FetchError;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Metadata sidecar for one cached asset/quote pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub asset: String,
    pub quote: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub row_count: usize,
    pub missing_market_caps: usize,
    pub data_hash: String,
    pub source: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// How well the cache covers a requested range.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

/// Cache status for a single asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub asset: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub row_count: Option<usize>,
}

pub struct ObservationCache {
    cache_dir: PathBuf,
}

impl ObservationCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn asset_dir(&self, asset: &str) -> PathBuf {
        self.cache_dir.join(format!("asset={asset}"))
    }

    fn data_path(&self, asset: &str, quote: &str) -> PathBuf {
        self.asset_dir(asset).join(format!("{quote}.parquet"))
    }

    fn meta_path(&self, asset: &str, quote: &str) -> PathBuf {
        self.asset_dir(asset).join(format!("{quote}.meta.json"))
    }

    /// Merge `observations` into the cached rows and persist the result.
    ///
    /// Incoming rows replace cached rows with the same date; cached rows
    /// outside the incoming range are kept, so coverage never shrinks.
    pub fn write(
        &self,
        asset: &str,
        quote: &str,
        observations: &[Observation],
        source: &str,
    ) -> Result<(), FetchError> {
        if observations.is_empty() {
            return Err(FetchError::CacheError("no observations to cache".into()));
        }

        let existing = if self.data_path(asset, quote).exists() {
            self.load(asset, quote).unwrap_or_default()
        } else {
            Vec::new()
        };
        let kept = existing.len();
        let mut by_date: BTreeMap<NaiveDate, Observation> =
            existing.into_iter().map(|o| (o.date, o)).collect();
        by_date.extend(observations.iter().map(|o| (o.date, o.clone())));
        let observations: Vec<Observation> = by_date.into_values().collect();
        let (first, last) = match (observations.first(), observations.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Err(FetchError::CacheError("no observations to cache".into())),
        };

        let dir = self.asset_dir(asset);
        fs::create_dir_all(&dir)
            .map_err(|e| FetchError::CacheError(format!("failed to create dir: {e}")))?;

        let mut df = observations_to_dataframe(&observations)?;
        let path = self.data_path(asset, quote);
        let tmp_path = path.with_extension("parquet.tmp");

        let file = fs::File::create(&tmp_path)
            .map_err(|e| FetchError::ParquetError(format!("create file: {e}")))?;
        ParquetWriter::new(file)
            .finish(&mut df)
            .map_err(|e| FetchError::ParquetError(format!("write parquet: {e}")))?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            FetchError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let data_hash = blake3::hash(
            &serde_json::to_vec(&observations)
                .map_err(|e| FetchError::CacheError(format!("hash serialization: {e}")))?,
        )
        .to_hex()
        .to_string();

        let meta = CacheMeta {
            asset: asset.to_string(),
            quote: quote.to_string(),
            start_date: first.date,
            end_date: last.date,
            row_count: observations.len(),
            missing_market_caps: observations.iter().filter(|o| o.market_cap.is_none()).count(),
            data_hash,
            source: source.to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| FetchError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(asset, quote), meta_json)
            .map_err(|e| FetchError::CacheError(format!("meta write: {e}")))?;

        debug!(asset, quote, rows = observations.len(), previously = kept, "cached observations");
        Ok(())
    }

    /// Cached observations sorted by date.
    pub fn load(&self, asset: &str, quote: &str) -> Result<Vec<Observation>, FetchError> {
        let path = self.data_path(asset, quote);
        if !path.exists() {
            return Err(FetchError::NoCachedData {
                asset: asset.to_string(),
            });
        }

        match load_parquet(&path) {
            Ok(mut obs) => {
                obs.sort_by_key(|o| o.date);
                Ok(obs)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                let _ = fs::rename(&path, path.with_extension("parquet.quarantined"));
                let _ = fs::remove_file(self.meta_path(asset, quote));
                Err(FetchError::NoCachedData {
                    asset: asset.to_string(),
                })
            }
        }
    }

    pub fn meta(&self, asset: &str, quote: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(asset, quote)).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn covers_range(
        &self,
        asset: &str,
        quote: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CoverageResult {
        match self.meta(asset, quote) {
            None => CoverageResult::NotCached,
            Some(meta) if meta.start_date <= start && meta.end_date >= end => {
                CoverageResult::FullyCovered
            }
            Some(meta) => CoverageResult::PartiallyCovered {
                cached_start: meta.start_date,
                cached_end: meta.end_date,
            },
        }
    }

    pub fn status(&self, assets: &[&str], quote: &str) -> Vec<CacheStatus> {
        assets
            .iter()
            .map(|asset| {
                let meta = self.meta(asset, quote);
                CacheStatus {
                    asset: asset.to_string(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    row_count: meta.as_ref().map(|m| m.row_count),
                }
            })
            .collect()
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn observations_to_dataframe(observations: &[Observation]) -> Result<DataFrame, FetchError> {
    let dates: Vec<i32> = observations
        .iter()
        .map(|o| (o.date - epoch()).num_days() as i32)
        .collect();
    let prices: Vec<f64> = observations.iter().map(|o| o.price).collect();
    let volumes: Vec<f64> = observations.iter().map(|o| o.total_volume).collect();
    let caps: Vec<Option<f64>> = observations.iter().map(|o| o.market_cap).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| FetchError::ParquetError(format!("date cast: {e}")))?,
        Column::new("price".into(), prices),
        Column::new("total_volume".into(), volumes),
        Column::new("market_cap".into(), caps),
    ])
    .map_err(|e| FetchError::ParquetError(format!("dataframe creation: {e}")))
}

fn load_parquet(path: &Path) -> Result<Vec<Observation>, FetchError> {
    let file = fs::File::open(path).map_err(|e| FetchError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| FetchError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(FetchError::ParquetError("empty parquet file".into()));
    }

    let col_err = |e: PolarsError| FetchError::ParquetError(format!("column read: {e}"));
    let date_ca = df.column("date").map_err(col_err)?.date().map_err(col_err)?;
    let price_ca = df.column("price").map_err(col_err)?.f64().map_err(col_err)?;
    let vol_ca = df.column("total_volume").map_err(col_err)?.f64().map_err(col_err)?;
    let cap_ca = df.column("market_cap").map_err(col_err)?.f64().map_err(col_err)?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| FetchError::ParquetError(format!("null date at row {i}")))?;
        let price = price_ca
            .get(i)
            .ok_or_else(|| FetchError::ParquetError(format!("null price at row {i}")))?;
        out.push(Observation {
            date: epoch() + chrono::Duration::days(days as i64),
            price,
            total_volume: vol_ca.get(i).unwrap_or(0.0),
            market_cap: cap_ca.get(i),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, day).unwrap()
    }

    fn sample() -> Vec<Observation> {
        vec![
            Observation { date: d(1), price: 29000.0, total_volume: 1e10, market_cap: Some(5.4e11) },
            Observation { date: d(2), price: 29500.0, total_volume: 1e10, market_cap: None },
        ]
    }

    #[test]
    fn write_and_load_keeps_missing_market_caps() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObservationCache::new(dir.path());

        cache.write("bitcoin", "usd", &sample(), "test").unwrap();
        let loaded = cache.load("bitcoin", "usd").unwrap();

        assert_eq!(loaded, sample());
    }

    #[test]
    fn meta_and_coverage() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObservationCache::new(dir.path());
        cache.write("bitcoin", "usd", &sample(), "test").unwrap();

        let meta = cache.meta("bitcoin", "usd").unwrap();
        assert_eq!(meta.row_count, 2);
        assert_eq!(meta.missing_market_caps, 1);

        assert_eq!(cache.covers_range("bitcoin", "usd", d(1), d(2)), CoverageResult::FullyCovered);
        assert!(matches!(
            cache.covers_range("bitcoin", "usd", d(1), d(5)),
            CoverageResult::PartiallyCovered { .. }
        ));
        assert_eq!(cache.covers_range("bitcoin", "eur", d(1), d(2)), CoverageResult::NotCached);
    }

    #[test]
    fn status_reports_each_asset() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObservationCache::new(dir.path());
        cache.write("bitcoin", "usd", &sample(), "test").unwrap();

        let statuses = cache.status(&["bitcoin", "ethereum"], "usd");
        assert!(statuses[0].cached);
        assert!(!statuses[1].cached);
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObservationCache::new(dir.path());
        let asset_dir = dir.path().join("asset=bitcoin");
        fs::create_dir_all(&asset_dir).unwrap();
        fs::write(asset_dir.join("usd.parquet"), b"not parquet").unwrap();

        assert!(cache.load("bitcoin", "usd").is_err());
        assert!(asset_dir.join("usd.parquet.quarantined").exists());
    }

    #[test]
    fn narrower_write_keeps_cached_range() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObservationCache::new(dir.path());
        let wide: Vec<Observation> = (1..=10)
            .map(|day| Observation {
                date: d(day),
                price: 100.0 + day as f64,
                total_volume: 1e9,
                market_cap: Some(1e12),
            })
            .collect();
        cache.write("bitcoin", "usd", &wide, "test").unwrap();

        let refreshed: Vec<Observation> = (4..=6)
            .map(|day| Observation {
                date: d(day),
                price: 500.0,
                total_volume: 2e9,
                market_cap: None,
            })
            .collect();
        cache.write("bitcoin", "usd", &refreshed, "test").unwrap();

        let meta = cache.meta("bitcoin", "usd").unwrap();
        assert_eq!((meta.start_date, meta.end_date), (d(1), d(10)));
        assert_eq!(meta.row_count, 10);
        assert_eq!(meta.missing_market_caps, 3);

        let loaded = cache.load("bitcoin", "usd").unwrap();
        assert_eq!(loaded.len(), 10);
        assert_eq!(loaded[0].price, 101.0);
        assert_eq!(loaded[4].price, 500.0);
        assert_eq!(loaded[4].market_cap, None);
        assert_eq!(loaded[9].price, 110.0);
        assert_eq!(cache.covers_range("bitcoin", "usd", d(1), d(10)), CoverageResult::FullyCovered);
    }

    #[test]
    fn empty_write_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ObservationCache::new(dir.path());
        assert!(cache.write("bitcoin", "usd", &[], "test").is_err());
    }
}
