//! Named, date-keyed numeric series. This is the unit of alignment.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Explicit ordered mapping from date to value.
///
/// Non-finite values are allowed (e.g. undefined volatility of a
/// one-observation period); consumers filter them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedSeries {
    pub name: String,
    pub points: BTreeMap<NaiveDate, f64>,
}

impl DatedSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: BTreeMap::new(),
        }
    }

    pub fn from_points(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        Self {
            name: name.into(),
            points: points.into_iter().collect(),
        }
    }

    /// Same values under a caller-supplied column name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points.get(&date).copied()
    }

    pub fn to_vec(&self) -> Vec<(NaiveDate, f64)> {
        self.points.iter().map(|(d, v)| (*d, *v)).collect()
    }

    /// Keep only `start..=end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            name: self.name.clone(),
            points: self
                .points
                .range(start..=end)
                .map(|(d, v)| (*d, *v))
                .collect(),
        }
    }
}
