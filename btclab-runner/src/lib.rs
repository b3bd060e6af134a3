//! btclab runner: study configuration, data loading, pipeline orchestration,
//! artifact export.
//!
//! This crate builds on `btclab-core` to provide:
//! - TOML study configuration with validation and a content hash
//! - Data loading with cache/fetch/synthetic fallback
//! - The end-to-end study pipeline producing aligned panels per periodicity
//! - CSV / JSON artifact export

pub mod config;
pub mod export;
pub mod loader;
pub mod pipeline;
pub mod synthetic;

pub use config::{AssetConfig, FactorConfig, MetricConfig, RunId, StudyConfig};
pub use export::{load_manifest, save_artifacts, ExportManifest, PanelSummary};
pub use loader::{load_observations, LoadError, LoadOptions, LoadedSeries};
pub use pipeline::{
    run_study, CycleReport, Feeds, PipelineError, RunOptions, Stage, StageFailure, StudyOutput,
    StudyPanel,
};
