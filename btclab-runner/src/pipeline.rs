//! Study orchestration: ingestion → cleaning → resampling → returns → alignment.
//!
//! Produces one aligned panel per configured periodicity. Column naming:
//!
//! | column | contents |
//! |---|---|
//! | `{asset}_price` | annualized log return of the close |
//! | `{asset}_mcap` | annualized log return of market cap |
//! | `{asset}_volume` | annualized log return of volume |
//! | `{asset}_vol` | std-dev of annualized daily returns in the period (weekly / monthly) |
//! | `{metric}` | annualized log growth of the network metric |
//! | factor columns | annualized factors (monthly only) |
//! | `{asset}_excess` | `{asset}_price` minus the risk-free column (monthly only) |
//!
//! Every failure is reported with the stage and, where known, the asset.

use crate::config::{AssetConfig, MetricConfig, StudyConfig};
use crate::loader::{load_factors, load_metric, load_observations, LoadError, LoadOptions};
use btclab_core::data::{
    DataSource, FactorSource, FactorTable, FetchProgress, MetricFeed, ObservationCache, PriceFeed,
};
use btclab_core::domain::{annualized_series, BarField, DatedSeries, Periodicity, ReturnRecord, Series};
use btclab_core::error::{ConfigError, DataError};
use btclab_core::transform::{
    bar_returns, cycle_buckets, daily_returns, impute_market_cap, log_returns, period_volatility,
    resample, resample_values, CycleBucket, CycleSpec, Panel, ResampleSpec,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Pipeline stage, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Config,
    Ingestion,
    Cleaning,
    Resampling,
    Returns,
    Alignment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Config => "config",
            Stage::Ingestion => "ingestion",
            Stage::Cleaning => "cleaning",
            Stage::Resampling => "resampling",
            Stage::Returns => "returns",
            Stage::Alignment => "alignment",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A failed run: which stage, which asset (if any), and why.
#[derive(Debug, Error)]
#[error("{stage} stage failed{}: {source}", .asset.as_ref().map(|a| format!(" for '{a}'")).unwrap_or_default())]
pub struct PipelineError {
    pub stage: Stage,
    pub asset: Option<String>,
    #[source]
    pub source: StageFailure,
}

trait AtStage<T> {
    fn at(self, stage: Stage, asset: Option<&str>) -> Result<T, PipelineError>;
}

impl<T, E: Into<StageFailure>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage, asset: Option<&str>) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError {
            stage,
            asset: asset.map(str::to_string),
            source: e.into(),
        })
    }
}

/// External collaborators for a run. Absent feeds are skipped (cache /
/// synthetic fallback still applies).
#[derive(Default)]
pub struct Feeds<'a> {
    pub prices: Option<&'a dyn PriceFeed>,
    pub factors: Option<&'a dyn FactorSource>,
    pub metrics: Option<&'a dyn MetricFeed>,
    pub progress: Option<&'a dyn FetchProgress>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub offline: bool,
    pub synthetic: bool,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct StudyPanel {
    pub periodicity: Periodicity,
    pub panel: Panel,
}

/// Seasonal buckets of one return column.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub series: String,
    pub periodicity: Periodicity,
    pub buckets: Vec<CycleBucket>,
}

#[derive(Debug, Clone)]
pub struct StudyOutput {
    pub run_id: String,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub sources: BTreeMap<String, DataSource>,
    /// Dates whose market cap was imputed, per asset.
    pub imputed: BTreeMap<String, Vec<NaiveDate>>,
    pub panels: Vec<StudyPanel>,
    pub cycles: Vec<CycleReport>,
}

impl StudyOutput {
    pub fn panel(&self, periodicity: Periodicity) -> Option<&Panel> {
        self.panels
            .iter()
            .find(|p| p.periodicity == periodicity)
            .map(|p| &p.panel)
    }
}

struct CleanAsset<'a> {
    config: &'a AssetConfig,
    series: Series,
    daily_price: Vec<ReturnRecord>,
}

/// Run a full study.
pub fn run_study(
    config: &StudyConfig,
    cache: &ObservationCache,
    feeds: &Feeds<'_>,
    opts: &RunOptions,
) -> Result<StudyOutput, PipelineError> {
    config.validate().at(Stage::Config, None)?;
    let run_id = config.run_id();
    info!(%run_id, assets = config.assets.len(), start = %config.start, end = %config.end, "starting study");

    let load_opts = LoadOptions {
        start: config.start,
        end: config.end,
        quote: config.quote.clone(),
        offline: opts.offline,
        synthetic: opts.synthetic,
        force: opts.force,
    };

    // ── Ingestion ──
    let loaded = load_observations(
        &config.asset_ids(),
        cache,
        feeds.prices,
        feeds.progress,
        &load_opts,
    )
    .map_err(|e| PipelineError {
        stage: Stage::Ingestion,
        asset: e.asset().map(str::to_string),
        source: e.into(),
    })?;
    let mut sources = loaded.sources;
    let mut has_synthetic = loaded.has_synthetic;

    let factors: Option<FactorTable> = match &config.factors {
        Some(fc) => {
            let (table, source) =
                load_factors(fc, feeds.factors, &load_opts).at(Stage::Ingestion, Some("factors"))?;
            has_synthetic |= source == DataSource::Synthetic;
            sources.insert("factors".into(), source);
            Some(table)
        }
        None => None,
    };

    let metric: Option<DatedSeries> = match &config.metric {
        Some(mc) => {
            let (series, source) = load_metric(mc, feeds.metrics, &load_opts)
                .at(Stage::Ingestion, Some(mc.name.as_str()))?;
            has_synthetic |= source == DataSource::Synthetic;
            sources.insert(mc.name.clone(), source);
            Some(series.between(config.start, config.end))
        }
        None => None,
    };

    // ── Cleaning ──
    let mut imputed = BTreeMap::new();
    let mut assets = Vec::with_capacity(config.assets.len());
    for (asset, series) in config.assets.iter().zip(loaded.series) {
        let id = Some(asset.id.as_str());
        let repaired = impute_market_cap(&series).at(Stage::Cleaning, id)?;
        if !repaired.imputed_dates.is_empty() {
            imputed.insert(asset.id.clone(), repaired.imputed_dates);
        }
        let daily_price =
            daily_returns(&repaired.series, BarField::Close).at(Stage::Returns, id)?;
        assets.push(CleanAsset {
            config: asset,
            series: repaired.series,
            daily_price,
        });
    }

    // ── Resampling, returns, alignment ──
    let mut panels = Vec::with_capacity(config.frequencies.len());
    let mut cycles = Vec::new();
    for &periodicity in &config.frequencies {
        let mut inputs = Vec::new();

        for asset in &assets {
            let (columns, price) = asset_columns(asset, periodicity)?;
            inputs.extend(columns);
            if let Some(report) = cycle_report(asset, periodicity, &price)? {
                cycles.push(report);
            }
        }

        if let (Some(mc), Some(series)) = (&config.metric, &metric) {
            inputs.push(metric_growth(mc, series, periodicity)?);
        }

        let monthly_factors = match (&config.factors, &factors) {
            (Some(fc), Some(table)) if periodicity == Periodicity::Monthly => Some((fc, table)),
            _ => None,
        };
        if let Some((fc, table)) = monthly_factors {
            let mut names = fc.columns.clone();
            if !names.contains(&fc.risk_free) {
                names.push(fc.risk_free.clone());
            }
            for name in &names {
                let column = table.column(name).at(Stage::Alignment, Some("factors"))?;
                inputs.push(column.between(config.start, config.end));
            }
        }

        let mut panel = Panel::join(inputs, config.join).at(Stage::Alignment, None)?;
        if let Some((fc, _)) = monthly_factors {
            for asset in &assets {
                let col = &asset.config.column;
                panel = panel
                    .with_difference(&format!("{col}_excess"), &format!("{col}_price"), &fc.risk_free)
                    .at(Stage::Alignment, Some(asset.config.id.as_str()))?;
            }
        }
        let panel = panel
            .drop_oldest(config.drop_oldest)
            .drop_recent(config.drop_recent);

        for (column, count) in panel.non_finite_counts() {
            if count > 0 {
                debug!(%periodicity, %column, count, "non-finite cells (filter before regression)");
            }
        }
        if panel.is_empty() {
            warn!(%periodicity, "aligned panel is empty");
        }
        info!(%periodicity, rows = panel.height(), columns = panel.width(), "panel aligned");

        panels.push(StudyPanel { periodicity, panel });
    }

    Ok(StudyOutput {
        run_id,
        dataset_hash: loaded.dataset_hash,
        has_synthetic,
        sources,
        imputed,
        panels,
        cycles,
    })
}

/// Return columns of one asset at `periodicity`, plus its price returns.
fn asset_columns(
    asset: &CleanAsset<'_>,
    periodicity: Periodicity,
) -> Result<(Vec<DatedSeries>, Vec<ReturnRecord>), PipelineError> {
    let id = Some(asset.config.id.as_str());
    let name = |suffix: &str| format!("{}_{suffix}", asset.config.column);

    let (price, mcap, volume) = match periodicity {
        Periodicity::Daily => (
            asset.daily_price.clone(),
            daily_returns(&asset.series, BarField::MarketCap).at(Stage::Returns, id)?,
            daily_returns(&asset.series, BarField::Volume).at(Stage::Returns, id)?,
        ),
        _ => {
            let bars = resample(&asset.series, periodicity, &ResampleSpec::default())
                .at(Stage::Resampling, id)?;
            (
                bar_returns(&bars, BarField::Close).at(Stage::Returns, id)?,
                bar_returns(&bars, BarField::MarketCap).at(Stage::Returns, id)?,
                bar_returns(&bars, BarField::Volume).at(Stage::Returns, id)?,
            )
        }
    };

    let mut columns = vec![
        annualized_series(name("price"), &price),
        annualized_series(name("mcap"), &mcap),
        annualized_series(name("volume"), &volume),
    ];
    if periodicity != Periodicity::Daily {
        columns.push(period_volatility(name("vol"), &asset.daily_price, periodicity));
    }
    Ok((columns, price))
}

/// Day-of-week buckets for daily returns, month-of-year for monthly.
fn cycle_report(
    asset: &CleanAsset<'_>,
    periodicity: Periodicity,
    price: &[ReturnRecord],
) -> Result<Option<CycleReport>, PipelineError> {
    let Some(first) = price.first() else {
        return Ok(None);
    };
    let spec = match periodicity {
        Periodicity::Daily => CycleSpec::day_of_week(first.date),
        Periodicity::Monthly => CycleSpec::month_of_year(first.date),
        Periodicity::Weekly => return Ok(None),
    };
    let buckets = cycle_buckets(price, spec).at(Stage::Returns, Some(asset.config.id.as_str()))?;
    Ok(Some(CycleReport {
        series: format!("{}_price", asset.config.column),
        periodicity,
        buckets,
    }))
}

fn metric_growth(
    config: &MetricConfig,
    series: &DatedSeries,
    periodicity: Periodicity,
) -> Result<DatedSeries, PipelineError> {
    let id = Some(config.name.as_str());
    let records = match periodicity {
        Periodicity::Daily => {
            let points: Vec<(NaiveDate, f64)> = series
                .to_vec()
                .into_iter()
                .filter(|(_, v)| v.is_finite())
                .collect();
            log_returns(&series.name, &points, Periodicity::Daily).at(Stage::Returns, id)?
        }
        _ => {
            let bars = resample_values(series, periodicity).at(Stage::Resampling, id)?;
            bar_returns(&bars, BarField::Close).at(Stage::Returns, id)?
        }
    };
    Ok(annualized_series(config.column.as_str(), &records))
}
