//! Return record: one differenced, annualized period.

use super::dated::DatedSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Log return between two adjacent periods, dated at the later one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub date: NaiveDate,
    pub log_return: f64,
    /// `log_return * 100 * periods_per_year`, in percent.
    pub annualized_return: f64,
}

/// Annualized returns as a named series for panel alignment.
pub fn annualized_series(name: impl Into<String>, records: &[ReturnRecord]) -> DatedSeries {
    DatedSeries::from_points(name, records.iter().map(|r| (r.date, r.annualized_return)))
}
