//! btclab CLI: fetch, run, and cache inspection commands.
//!
//! Commands:
//! - `fetch`: pull daily observations from the price feed and cache them as Parquet
//! - `run`: execute a study from a TOML config and export the aligned panels
//! - `cache status`: report cached date ranges and row counts per asset

use anyhow::{bail, Result};
use btclab_core::data::{
    fetch_assets, BlockchainInfoProvider, CircuitBreaker, CoinGeckoProvider, CsvMetricFeed,
    CsvPriceFeed, FactorSource, FileFactorSource, HttpFactorSource, LogProgress, MetricFeed,
    ObservationCache, PriceFeed,
};
use btclab_runner::{run_study, save_artifacts, Feeds, RunOptions, StudyConfig, StudyOutput};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "btclab", about = "btclab: bitcoin price study data pipeline")]
struct Cli {
    /// Log filter (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch daily observations and cache them as Parquet.
    Fetch {
        /// Price-feed asset ids (e.g. bitcoin ethereum).
        #[arg(required = true)]
        assets: Vec<String>,

        /// Quote currency.
        #[arg(long, default_value = "usd")]
        quote: String,

        /// Start date (YYYY-MM-DD). Defaults to 10 years ago.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Re-fetch even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Import from `{dir}/{asset}.csv` instead of the HTTP feed.
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Cache directory.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Run a study from a TOML config file.
    Run {
        /// Path to the study TOML.
        #[arg(long)]
        config: PathBuf,

        /// Offline mode: no network access.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Use synthetic data as fallback.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Re-fetch prices even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Read prices and metrics from CSV files in this directory.
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Overrides `cache_dir` from the config.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Overrides `output_dir` from the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Cache inspection commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report date range and row count per cached asset.
    Status {
        #[arg(required = true)]
        assets: Vec<String>,

        #[arg(long, default_value = "usd")]
        quote: String,

        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    match cli.command {
        Commands::Fetch {
            assets,
            quote,
            start,
            end,
            force,
            csv_dir,
            cache_dir,
        } => run_fetch(assets, quote, start, end, force, csv_dir, cache_dir),
        Commands::Run {
            config,
            offline,
            synthetic,
            force,
            csv_dir,
            cache_dir,
            output_dir,
        } => run_study_cmd(
            &config,
            RunOptions {
                offline,
                synthetic,
                force,
            },
            csv_dir,
            cache_dir,
            output_dir,
        ),
        Commands::Cache { action } => match action {
            CacheAction::Status {
                assets,
                quote,
                cache_dir,
            } => run_cache_status(&assets, &quote, &cache_dir),
        },
    }
}

fn parse_date(s: Option<&str>, default: NaiveDate) -> Result<NaiveDate> {
    Ok(s.map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()?
        .unwrap_or(default))
}

#[allow(clippy::too_many_arguments)]
fn run_fetch(
    assets: Vec<String>,
    quote: String,
    start: Option<String>,
    end: Option<String>,
    force: bool,
    csv_dir: Option<PathBuf>,
    cache_dir: PathBuf,
) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let start_date = parse_date(start.as_deref(), today - chrono::Duration::days(365 * 10))?;
    let end_date = parse_date(end.as_deref(), today)?;
    if start_date >= end_date {
        bail!("--start {start_date} must be before --end {end_date}");
    }

    let feed: Box<dyn PriceFeed> = match csv_dir {
        Some(dir) => Box::new(CsvPriceFeed::new(dir)),
        None => Box::new(CoinGeckoProvider::new(Arc::new(
            CircuitBreaker::default_provider(),
        ))?),
    };
    let cache = ObservationCache::new(cache_dir);
    let asset_refs: Vec<&str> = assets.iter().map(|s| s.as_str()).collect();

    let summary = fetch_assets(
        feed.as_ref(),
        &cache,
        &asset_refs,
        &quote,
        start_date,
        end_date,
        force,
        &LogProgress,
    );

    if !summary.all_succeeded() {
        for (asset, err) in &summary.errors {
            error!(%asset, "{err}");
        }
        bail!("{} of {} assets failed", summary.failed, summary.total);
    }
    Ok(())
}

fn run_study_cmd(
    config_path: &Path,
    opts: RunOptions,
    csv_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = StudyConfig::from_file(config_path)?;
    if let Some(dir) = cache_dir {
        config.cache_dir = dir;
    }
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }

    let breaker = Arc::new(CircuitBreaker::default_provider());

    let prices: Option<Box<dyn PriceFeed>> = match (&csv_dir, opts.offline) {
        (Some(dir), _) => Some(Box::new(CsvPriceFeed::new(dir))),
        (None, true) => None,
        (None, false) => Some(Box::new(CoinGeckoProvider::new(breaker.clone())?)),
    };

    let factors: Option<Box<dyn FactorSource>> = match &config.factors {
        Some(fc) if fc.is_remote() && opts.offline => None,
        Some(fc) if fc.is_remote() => {
            Some(Box::new(HttpFactorSource::new(&fc.source, breaker.clone())?))
        }
        Some(fc) => Some(Box::new(FileFactorSource::new(&fc.source))),
        None => None,
    };

    let metrics: Option<Box<dyn MetricFeed>> = match (&config.metric, &csv_dir, opts.offline) {
        (None, _, _) => None,
        (Some(_), Some(dir), _) => Some(Box::new(CsvMetricFeed::new(dir))),
        (Some(_), None, true) => None,
        (Some(mc), None, false) => {
            let mut provider = BlockchainInfoProvider::new(breaker.clone())?;
            if let Some(secondary) = &mc.secondary {
                provider = provider.with_secondary(secondary);
            }
            Some(Box::new(provider))
        }
    };

    let feeds = Feeds {
        prices: prices.as_deref(),
        factors: factors.as_deref(),
        metrics: metrics.as_deref(),
        progress: Some(&LogProgress),
    };
    let cache = ObservationCache::new(&config.cache_dir);

    let output = run_study(&config, &cache, &feeds, &opts)?;
    print_summary(&output);

    let run_dir = save_artifacts(&output, &config.output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn print_summary(output: &StudyOutput) {
    println!("Run:      {}", output.run_id);
    println!("Dataset:  {}", output.dataset_hash);
    if output.has_synthetic {
        warn!("results were built from SYNTHETIC data");
        println!("Data:     SYNTHETIC");
    }
    for (name, source) in &output.sources {
        println!("Source:   {name:<12} {source:?}");
    }
    for (asset, dates) in &output.imputed {
        info!(%asset, count = dates.len(), "market caps imputed");
    }
    println!();
    println!("{:<10} {:>6} {:>8} {:<25}", "Panel", "Rows", "Columns", "Range");
    println!("{}", "-".repeat(52));
    for sp in &output.panels {
        let range = match (sp.panel.dates().first(), sp.panel.dates().last()) {
            (Some(a), Some(b)) => format!("{a} to {b}"),
            _ => "(empty)".into(),
        };
        println!(
            "{:<10} {:>6} {:>8} {:<25}",
            sp.periodicity.as_str(),
            sp.panel.height(),
            sp.panel.width(),
            range
        );
    }
}

fn run_cache_status(assets: &[String], quote: &str, cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = ObservationCache::new(cache_dir);
    let asset_refs: Vec<&str> = assets.iter().map(|s| s.as_str()).collect();

    println!("Cache: {}", cache_dir.display());
    println!();
    println!("{:<12} {:<25} {:>8}", "Asset", "Date Range", "Rows");
    println!("{}", "-".repeat(47));
    for status in cache.status(&asset_refs, quote) {
        let (range, rows) = match (status.start_date, status.end_date, status.row_count) {
            (Some(s), Some(e), Some(n)) => (format!("{s} to {e}"), n.to_string()),
            _ => ("(not cached)".into(), "-".into()),
        };
        println!("{:<12} {:<25} {:>8}", status.asset, range, rows);
    }
    Ok(())
}
