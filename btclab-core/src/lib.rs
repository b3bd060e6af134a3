//! btclab core: domain types, data feeds, and the pure transforms behind the
//! bitcoin price study.
//!
//! - Domain types (daily observations, OHLC bars, dated series, periodicity)
//! - Data feeds (price API, factor archive, blockchain metrics) and the parquet cache
//! - Market-cap imputation
//! - Weekly / monthly OHLC resampling
//! - Log-return annualization and per-period volatility
//! - Multi-series panel alignment
//! - Seasonal cycle bucketing

pub mod data;
pub mod domain;
pub mod error;
pub mod transform;

pub use error::{ConfigError, DataError, FetchError};
