//! Artifact export: one CSV per aligned panel, seasonal cycle buckets, and a
//! JSON manifest.
//!
//! Non-finite panel cells are written as empty fields so downstream tools
//! read them as missing rather than as literal `NaN` strings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use btclab_core::data::DataSource;
use btclab_core::domain::Periodicity;
use btclab_core::transform::Panel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pipeline::{CycleReport, StudyOutput};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSummary {
    pub periodicity: Periodicity,
    pub file: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    /// Non-finite cells per column (only columns with at least one).
    pub non_finite: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub schema_version: u32,
    pub run_id: String,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub created_at: String,
    pub sources: BTreeMap<String, DataSource>,
    pub imputed: BTreeMap<String, Vec<NaiveDate>>,
    pub panels: Vec<PanelSummary>,
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Render a panel as CSV: `date` followed by the panel's columns.
pub fn export_panel_csv(panel: &Panel) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["date".to_string()];
    header.extend(panel.columns().iter().cloned());
    wtr.write_record(&header)?;

    for i in 0..panel.height() {
        let Some((date, values)) = panel.row(i) else {
            break;
        };
        let mut record = vec![date.to_string()];
        record.extend(values.iter().map(|v| {
            if v.is_finite() {
                format!("{v:.6}")
            } else {
                String::new()
            }
        }));
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Render cycle buckets as CSV, one row per bucket.
pub fn export_cycles_csv(reports: &[CycleReport]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["series", "periodicity", "index", "count", "mean", "std_dev"])?;

    for report in reports {
        for b in &report.buckets {
            let fmt = |v: f64| if v.is_finite() { format!("{v:.6}") } else { String::new() };
            wtr.write_record([
                report.series.clone(),
                report.periodicity.as_str().to_string(),
                b.index.to_string(),
                b.count.to_string(),
                fmt(b.mean),
                fmt(b.std_dev),
            ])?;
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn summarize(periodicity: Periodicity, panel: &Panel, file: String) -> PanelSummary {
    PanelSummary {
        periodicity,
        file,
        rows: panel.height(),
        columns: panel.columns().to_vec(),
        first_date: panel.dates().first().copied(),
        last_date: panel.dates().last().copied(),
        non_finite: panel
            .non_finite_counts()
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .collect(),
    }
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a study run.
///
/// Creates `{output_dir}/{run_id prefix}/` containing:
/// - `panel_{periodicity}.csv` for each panel
/// - `cycles.csv` when any cycle buckets were computed
/// - `manifest.json`
///
/// Returns the path to the created directory.
pub fn save_artifacts(output: &StudyOutput, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = output.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(prefix);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let mut panels = Vec::with_capacity(output.panels.len());
    for sp in &output.panels {
        let file = format!("panel_{}.csv", sp.periodicity.as_str());
        let csv = export_panel_csv(&sp.panel)?;
        std::fs::write(run_dir.join(&file), csv)
            .with_context(|| format!("failed to write {file}"))?;
        panels.push(summarize(sp.periodicity, &sp.panel, file));
    }

    if !output.cycles.is_empty() {
        let csv = export_cycles_csv(&output.cycles)?;
        std::fs::write(run_dir.join("cycles.csv"), csv).context("failed to write cycles.csv")?;
    }

    let manifest = ExportManifest {
        schema_version: SCHEMA_VERSION,
        run_id: output.run_id.clone(),
        dataset_hash: output.dataset_hash.clone(),
        has_synthetic: output.has_synthetic,
        created_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        sources: output.sources.clone(),
        imputed: output.imputed.clone(),
        panels,
    };
    let json = serde_json::to_string_pretty(&manifest).context("failed to serialize manifest")?;
    std::fs::write(run_dir.join("manifest.json"), json).context("failed to write manifest.json")?;

    Ok(run_dir)
}

/// Read back an artifact directory's manifest, rejecting unknown schema versions.
pub fn load_manifest(dir: &Path) -> Result<ExportManifest> {
    let path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let manifest: ExportManifest =
        serde_json::from_str(&json).context("failed to deserialize manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}
