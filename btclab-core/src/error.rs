//! Structured error types shared by the data feeds and the transforms.
//!
//! Three families, matching how a run can fail:
//! - [`FetchError`]: an external source is unreachable or returned garbage
//! - [`DataError`]: a data-shape invariant was violated mid-pipeline
//! - [`ConfigError`]: caller-supplied parameters are inconsistent

use chrono::NaiveDate;
use thiserror::Error;

/// Failures talking to an external data source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status} from {source_name}")]
    HttpStatus { source_name: String, status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("asset not found: {asset}")]
    AssetNotFound { asset: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("no cached data for '{asset}'; run `btclab fetch {asset}` first")]
    NoCachedData { asset: String },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Violations of a data-shape invariant.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("{asset}: cannot impute market cap on {date}: gap sits at the series boundary")]
    ImputationAtBoundary { asset: String, date: NaiveDate },

    #[error("{asset}: cannot impute market cap on {date}: adjacent day is also missing")]
    ConsecutiveGap { asset: String, date: NaiveDate },

    #[error("{series}: non-positive value {value} on {date} in log domain")]
    NonPositiveValue {
        series: String,
        date: NaiveDate,
        value: f64,
    },

    #[error("{asset}: invalid price {price} on {date}")]
    InvalidPrice {
        asset: String,
        date: NaiveDate,
        price: f64,
    },

    #[error("{asset}: dates not strictly increasing at {date}")]
    NonMonotonicDates { asset: String, date: NaiveDate },

    #[error("cannot resample {from} data to {to}")]
    IncompatiblePeriods { from: String, to: String },

    #[error("{series}: missing {field} on {date}")]
    MissingField {
        series: String,
        field: &'static str,
        date: NaiveDate,
    },

    #[error("factor table parse error at line {line}: {reason}")]
    FactorParse { line: usize, reason: String },

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("column already exists: {0}")]
    ColumnExists(String),
}

/// Inconsistent caller-supplied parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("series '{series}' requests {start}..{end} but the panel covers {panel_start}..{panel_end}")]
    UnequalDateRanges {
        series: String,
        start: NaiveDate,
        end: NaiveDate,
        panel_start: NaiveDate,
        panel_end: NaiveDate,
    },

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("start date {start} must be before end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("no assets configured")]
    NoAssets,

    #[error("cycle length must be positive")]
    ZeroCycleLength,

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),
}
