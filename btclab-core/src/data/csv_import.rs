//! Offline CSV feeds, used when the HTTP sources are unavailable.
//!
//! Price files: `{dir}/{asset}.csv` with header `date,price,total_volume,market_cap`
//! (an empty `market_cap` field means missing). Metric files:
//! `{dir}/{metric}.csv` with header `date,value`.

use super::provider::{DataSource, MetricData, MetricFeed, PriceFeed};
use crate::domain::{DatedSeries, Observation};
use crate::error::FetchError;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct MetricRow {
    date: NaiveDate,
    value: f64,
}

fn io_err(path: &Path, e: impl std::fmt::Display) -> FetchError {
    FetchError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Read observations from a CSV file.
pub fn read_observations(path: &Path) -> Result<Vec<Observation>, FetchError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| io_err(path, e))?;
    reader
        .deserialize::<Observation>()
        .map(|row| row.map_err(|e| io_err(path, e)))
        .collect()
}

/// Write observations to a CSV file readable by [`read_observations`].
pub fn write_observations(path: &Path, observations: &[Observation]) -> Result<(), FetchError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| io_err(path, e))?;
    for obs in observations {
        writer.serialize(obs).map_err(|e| io_err(path, e))?;
    }
    writer.flush().map_err(|e| io_err(path, e))
}

pub struct CsvPriceFeed {
    dir: PathBuf,
}

impl CsvPriceFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, asset: &str) -> PathBuf {
        self.dir.join(format!("{asset}.csv"))
    }
}

impl PriceFeed for CsvPriceFeed {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_daily(
        &self,
        asset: &str,
        _quote: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, FetchError> {
        let path = self.path_for(asset);
        if !path.exists() {
            return Err(FetchError::AssetNotFound {
                asset: asset.to_string(),
            });
        }
        let observations: Vec<Observation> = read_observations(&path)?
            .into_iter()
            .filter(|o| o.date >= start && o.date <= end)
            .collect();
        if observations.is_empty() {
            return Err(FetchError::AssetNotFound {
                asset: asset.to_string(),
            });
        }
        Ok(observations)
    }

    fn source(&self) -> DataSource {
        DataSource::CsvImport
    }
}

pub struct CsvMetricFeed {
    dir: PathBuf,
}

impl CsvMetricFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl MetricFeed for CsvMetricFeed {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_metric(
        &self,
        metric: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<MetricData, FetchError> {
        let path = self.dir.join(format!("{metric}.csv"));
        let mut reader = csv::Reader::from_path(&path).map_err(|e| io_err(&path, e))?;

        let mut daily = DatedSeries::new(metric);
        for row in reader.deserialize::<MetricRow>() {
            let row = row.map_err(|e| io_err(&path, e))?;
            if row.date >= start && row.date <= end {
                daily.points.insert(row.date, row.value);
            }
        }

        Ok(MetricData {
            daily,
            secondary: None,
        })
    }
}
