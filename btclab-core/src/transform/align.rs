//! Multi-series time alignment into a single panel.
//!
//! Given named date-keyed series, build one table on a common date axis.
//! Inner joins keep only dates present in every input; outer joins keep the
//! union and mark absent values with NaN (no forward-fill).

use crate::domain::DatedSeries;
use crate::error::{ConfigError, DataError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Join semantics on the date key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Inner,
    Outer,
}

/// Aligned table: one row per date (ascending), one column per input series.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    /// Column-major; `values[c].len() == dates.len()` for every column.
    values: Vec<Vec<f64>>,
}

impl Panel {
    /// Align `inputs` on their dates. Column order follows input order.
    pub fn join(inputs: Vec<DatedSeries>, kind: JoinKind) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for s in &inputs {
            if !seen.insert(s.name.as_str()) {
                return Err(ConfigError::DuplicateColumn(s.name.clone()));
            }
        }

        let dates: Vec<NaiveDate> = match kind {
            JoinKind::Outer => {
                let mut all = BTreeSet::new();
                for s in &inputs {
                    all.extend(s.points.keys().copied());
                }
                all.into_iter().collect()
            }
            JoinKind::Inner => match inputs.split_first() {
                None => Vec::new(),
                Some((first, rest)) => first
                    .points
                    .keys()
                    .copied()
                    .filter(|d| rest.iter().all(|s| s.points.contains_key(d)))
                    .collect(),
            },
        };

        let columns = inputs.iter().map(|s| s.name.clone()).collect();
        let values = inputs
            .iter()
            .map(|s| {
                dates
                    .iter()
                    .map(|d| s.get(*d).unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();

        Ok(Self {
            dates,
            columns,
            values,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn height(&self) -> usize {
        self.dates.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.column_index(name).map(|i| self.values[i].as_slice())
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one row in column order.
    pub fn row(&self, i: usize) -> Option<(NaiveDate, Vec<f64>)> {
        let date = *self.dates.get(i)?;
        Some((date, self.values.iter().map(|col| col[i]).collect()))
    }

    /// Drop the `n` most recent rows (e.g. an incomplete current period).
    pub fn drop_recent(mut self, n: usize) -> Self {
        let keep = self.dates.len().saturating_sub(n);
        self.dates.truncate(keep);
        for col in &mut self.values {
            col.truncate(keep);
        }
        self
    }

    /// Drop the `n` oldest rows (e.g. a partial first period).
    pub fn drop_oldest(mut self, n: usize) -> Self {
        let skip = n.min(self.dates.len());
        self.dates.drain(..skip);
        for col in &mut self.values {
            col.drain(..skip);
        }
        self
    }

    /// Append `name = minuend - subtrahend`, elementwise.
    pub fn with_difference(
        mut self,
        name: &str,
        minuend: &str,
        subtrahend: &str,
    ) -> Result<Self, DataError> {
        if self.column_index(name).is_some() {
            return Err(DataError::ColumnExists(name.to_string()));
        }
        let a = self
            .column(minuend)
            .ok_or_else(|| DataError::UnknownColumn(minuend.to_string()))?;
        let b = self
            .column(subtrahend)
            .ok_or_else(|| DataError::UnknownColumn(subtrahend.to_string()))?;

        let diff: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
        self.columns.push(name.to_string());
        self.values.push(diff);
        Ok(self)
    }

    /// Rows where every named column is finite, as `(date, values)` in the
    /// order of `names`. This is what a regression should consume.
    pub fn finite_rows(&self, names: &[&str]) -> Result<Vec<(NaiveDate, Vec<f64>)>, DataError> {
        let idx = names
            .iter()
            .map(|n| {
                self.column_index(n)
                    .ok_or_else(|| DataError::UnknownColumn(n.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((0..self.height())
            .filter_map(|i| {
                let row: Vec<f64> = idx.iter().map(|&c| self.values[c][i]).collect();
                row.iter()
                    .all(|v| v.is_finite())
                    .then(|| (self.dates[i], row))
            })
            .collect())
    }

    /// Count of non-finite cells per column, in column order.
    pub fn non_finite_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(name, col)| (name.clone(), col.iter().filter(|v| !v.is_finite()).count()))
            .collect()
    }
}
