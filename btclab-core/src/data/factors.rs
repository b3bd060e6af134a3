//! Monthly factor table (market, size, value, profitability, investment,
//! risk-free) in the Fama-French research CSV layout.
//!
//! Layout: a few lines of free text, a header row whose first field is
//! empty (`,Mkt-RF,SMB,HML,RMW,CMA,RF`), monthly rows keyed `YYYYMM`, then a
//! trailing block of annual summary rows. The first row whose date does not
//! parse as `YYYYMM` starts that trailing block; it and everything after are
//! discarded.

use super::circuit_breaker::CircuitBreaker;
use super::http::HttpFetcher;
use super::provider::FactorSource;
use crate::domain::DatedSeries;
use crate::error::{DataError, FetchError};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Monthly factor values keyed by the first day of the month.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorTable {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<f64>>,
}

impl FactorTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next().copied()
    }

    /// Rows dated on or after `start`.
    pub fn since(&self, start: NaiveDate) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .range(start..)
                .map(|(d, v)| (*d, v.clone()))
                .collect(),
        }
    }

    /// Monthly values scaled by 12, matching annualized monthly returns.
    pub fn annualized(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .map(|(d, v)| (*d, v.iter().map(|x| x * 12.0).collect()))
                .collect(),
        }
    }

    pub fn column(&self, name: &str) -> Result<DatedSeries, DataError> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| DataError::UnknownColumn(name.to_string()))?;
        Ok(DatedSeries::from_points(
            name,
            self.rows.iter().map(|(d, v)| (*d, v[idx])),
        ))
    }
}

fn parse_yyyymm(field: &str) -> Option<NaiveDate> {
    if field.len() != 6 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = field[..4].parse().ok()?;
    let month: u32 = field[4..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn record_line(record: &csv::StringRecord) -> usize {
    record.position().map_or(0, |p| p.line() as usize)
}

fn csv_error(e: csv::Error) -> DataError {
    DataError::FactorParse {
        line: e.position().map_or(0, |p| p.line() as usize),
        reason: e.to_string(),
    }
}

/// Parse the archive's CSV text into a monthly table.
///
/// Blank lines are skipped by the reader; free-text preamble rows are
/// ignored until the header row.
pub fn parse_factor_csv(text: &str) -> Result<FactorTable, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut records = reader.records();

    let columns: Vec<String> = loop {
        let record = records
            .next()
            .ok_or_else(|| DataError::FactorParse {
                line: 0,
                reason: "no header row found".into(),
            })?
            .map_err(csv_error)?;
        if record.len() > 1 && record.get(0).is_some_and(str::is_empty) {
            break record.iter().skip(1).map(str::to_string).collect();
        }
    };

    let mut rows = BTreeMap::new();
    for record in records {
        let record = record.map_err(csv_error)?;
        let line = record_line(&record);
        let Some(date) = record.get(0).and_then(parse_yyyymm) else {
            debug!(line, "factor table: monthly block ends");
            break;
        };

        if record.len() != columns.len() + 1 {
            return Err(DataError::FactorParse {
                line,
                reason: format!(
                    "expected {} values, got {}",
                    columns.len(),
                    record.len().saturating_sub(1)
                ),
            });
        }

        let values = record
            .iter()
            .skip(1)
            .map(|f| {
                f.parse::<f64>().map_err(|e| DataError::FactorParse {
                    line,
                    reason: format!("'{f}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        rows.insert(date, values);
    }

    if rows.is_empty() {
        return Err(DataError::FactorParse {
            line: 0,
            reason: "no monthly rows".into(),
        });
    }

    Ok(FactorTable { columns, rows })
}

/// Factor archive fetched over HTTP. The URL must serve the extracted CSV.
pub struct HttpFactorSource {
    http: HttpFetcher,
    url: String,
}

impl HttpFactorSource {
    pub fn new(url: impl Into<String>, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, FetchError> {
        Ok(Self {
            http: HttpFetcher::new("factor_archive", circuit_breaker, Duration::from_secs(60))?,
            url: url.into(),
        })
    }
}

impl FactorSource for HttpFactorSource {
    fn name(&self) -> &str {
        "factor_archive"
    }

    fn fetch_csv(&self) -> Result<String, FetchError> {
        self.http.get_text(&self.url)
    }
}

/// Factor archive already extracted to disk.
pub struct FileFactorSource {
    path: PathBuf,
}

impl FileFactorSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FactorSource for FileFactorSource {
    fn name(&self) -> &str {
        "factor_file"
    }

    fn fetch_csv(&self) -> Result<String, FetchError> {
        std::fs::read_to_string(&self.path).map_err(|e| FetchError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
