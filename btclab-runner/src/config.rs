//! Study configuration, loaded from TOML.
//!
//! ```toml
//! start = "2019-01-01"
//! end = "2023-12-31"
//! quote = "usd"
//! frequencies = ["daily", "weekly", "monthly"]
//! join = "inner"
//! drop_recent = 1
//!
//! [[assets]]
//! id = "bitcoin"
//! column = "btc"
//!
//! [factors]
//! source = "data/F-F_Research_Data_5_Factors_2x3.csv"
//! columns = ["Mkt-RF", "SMB", "HML", "RMW", "CMA"]
//! risk_free = "RF"
//!
//! [metric]
//! name = "hash-rate"
//! column = "hashrate"
//! ```

use btclab_core::domain::Periodicity;
use btclab_core::error::ConfigError;
use btclab_core::transform::JoinKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Content-addressable identifier for a study run.
pub type RunId = String;

/// One asset requested from the price feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetConfig {
    /// Price-feed identifier (e.g. `bitcoin`).
    pub id: String,
    /// Column prefix in the aligned panels (e.g. `btc`).
    pub column: String,
    /// Per-asset range. Every series in a panel must cover the study range,
    /// so when given these must equal `start` / `end`.
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorConfig {
    /// Path to the extracted CSV, or an `http(s)://` URL serving it.
    pub source: String,
    /// Factor columns copied into the monthly panel.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Column subtracted from each asset's monthly return to form `{column}_excess`.
    #[serde(default = "default_risk_free")]
    pub risk_free: String,
}

impl FactorConfig {
    pub fn is_remote(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricConfig {
    /// Chart name on the metric feed.
    #[serde(default = "default_metric_name")]
    pub name: String,
    /// Column name of the metric's growth rate in the panels.
    #[serde(default = "default_metric_column")]
    pub column: String,
    /// Irregular companion chart fetched alongside (not used in panels).
    #[serde(default)]
    pub secondary: Option<String>,
}

/// Full configuration of one study run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudyConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,

    #[serde(default = "default_quote")]
    pub quote: String,

    pub assets: Vec<AssetConfig>,

    #[serde(default = "default_frequencies")]
    pub frequencies: Vec<Periodicity>,

    #[serde(default)]
    pub factors: Option<FactorConfig>,

    #[serde(default)]
    pub metric: Option<MetricConfig>,

    /// Rows removed from the most recent end of every panel.
    #[serde(default)]
    pub drop_recent: usize,

    /// Rows removed from the oldest end of every panel.
    #[serde(default)]
    pub drop_oldest: usize,

    #[serde(default)]
    pub join: JoinKind,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_quote() -> String {
    "usd".into()
}

fn default_frequencies() -> Vec<Periodicity> {
    Periodicity::ALL.to_vec()
}

fn default_risk_free() -> String {
    "RF".into()
}

fn default_metric_name() -> String {
    "hash-rate".into()
}

fn default_metric_column() -> String {
    "hashrate".into()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl StudyConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check cross-field consistency. Does not touch the network or disk.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start >= self.end {
            return Err(ConfigError::InvertedRange {
                start: self.start,
                end: self.end,
            });
        }
        if self.assets.is_empty() {
            return Err(ConfigError::NoAssets);
        }
        if self.frequencies.is_empty() {
            return Err(ConfigError::Invalid("no frequencies configured".into()));
        }
        let mut frequencies = HashSet::new();
        for p in &self.frequencies {
            if !frequencies.insert(*p) {
                return Err(ConfigError::Invalid(format!("frequency '{p}' listed twice")));
            }
        }

        for asset in &self.assets {
            let start = asset.start.unwrap_or(self.start);
            let end = asset.end.unwrap_or(self.end);
            if start != self.start || end != self.end {
                return Err(ConfigError::UnequalDateRanges {
                    series: asset.id.clone(),
                    start,
                    end,
                    panel_start: self.start,
                    panel_end: self.end,
                });
            }
        }

        let mut seen = HashSet::new();
        for name in self.base_columns() {
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateColumn(name));
            }
        }

        Ok(())
    }

    /// Panel column names that do not depend on the periodicity.
    fn base_columns(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .assets
            .iter()
            .map(|a| a.column.clone())
            .collect();
        if let Some(metric) = &self.metric {
            names.push(metric.column.clone());
        }
        if let Some(factors) = &self.factors {
            names.extend(factors.columns.iter().cloned());
            if !factors.columns.contains(&factors.risk_free) {
                names.push(factors.risk_free.clone());
            }
        }
        names
    }

    pub fn asset_ids(&self) -> Vec<&str> {
        self.assets.iter().map(|a| a.id.as_str()).collect()
    }

    /// Deterministic hash of the configuration (BLAKE3 of its JSON form).
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}
