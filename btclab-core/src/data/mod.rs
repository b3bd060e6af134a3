//! Data ingestion: price, factor and network-metric feeds, HTTP plumbing,
//! and the on-disk observation cache.

pub mod blockchain;
pub mod cache;
pub mod circuit_breaker;
pub mod coingecko;
pub mod csv_import;
pub mod download;
pub mod factors;
pub mod http;
pub mod provider;

pub use blockchain::BlockchainInfoProvider;
pub use cache::{CacheMeta, CacheStatus, CoverageResult, ObservationCache};
pub use circuit_breaker::CircuitBreaker;
pub use coingecko::CoinGeckoProvider;
pub use csv_import::{read_observations, write_observations, CsvMetricFeed, CsvPriceFeed};
pub use download::{fetch_assets, FetchSummary};
pub use factors::{parse_factor_csv, FactorTable, FileFactorSource, HttpFactorSource};
pub use http::HttpFetcher;
pub use provider::{
    DataSource, FactorSource, FetchProgress, LogProgress, MetricData, MetricFeed, PriceFeed,
};
