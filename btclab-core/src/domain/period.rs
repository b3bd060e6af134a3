//! Sampling frequency and calendar period arithmetic.

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Native periodicity of a series.
///
/// Weekly periods follow ISO weeks (Monday start). Monthly periods follow
/// calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    Daily,
    Weekly,
    Monthly,
}

impl Periodicity {
    pub const ALL: [Periodicity; 3] = [Self::Daily, Self::Weekly, Self::Monthly];

    /// Number of periods used to annualize a per-period return.
    pub fn periods_per_year(self) -> u32 {
        match self {
            Self::Daily => 365,
            Self::Weekly => 52,
            Self::Monthly => 12,
        }
    }

    /// First calendar day of the period containing `date`.
    pub fn period_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => date,
            Self::Weekly => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            Self::Monthly => date.with_day(1).unwrap_or(date),
        }
    }

    /// Last calendar day of the period containing `date`.
    pub fn period_end(self, date: NaiveDate) -> NaiveDate {
        self.next_period_start(date) - Duration::days(1)
    }

    /// First day of the period after the one containing `date`.
    ///
    /// For a date that already is a period start this still moves forward
    /// one full period.
    pub fn next_period_start(self, date: NaiveDate) -> NaiveDate {
        let start = self.period_start(date);
        match self {
            Self::Daily => start + Duration::days(1),
            Self::Weekly => start + Duration::days(7),
            Self::Monthly => start
                .checked_add_months(Months::new(1))
                .unwrap_or(NaiveDate::MAX),
        }
    }

    /// First day of the period before the one containing `date`.
    pub fn previous_period_start(self, date: NaiveDate) -> NaiveDate {
        let start = self.period_start(date);
        match self {
            Self::Daily => start - Duration::days(1),
            Self::Weekly => start - Duration::days(7),
            Self::Monthly => start
                .checked_sub_months(Months::new(1))
                .unwrap_or(NaiveDate::MIN),
        }
    }

    /// Whether every period of `self` falls entirely inside one period of `target`.
    ///
    /// ISO weeks straddle month boundaries, so weekly does not nest into monthly.
    pub fn nests_into(self, target: Periodicity) -> bool {
        matches!(
            (self, target),
            (Self::Daily, _) | (Self::Weekly, Self::Weekly) | (Self::Monthly, Self::Monthly)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekly_period_starts_on_monday() {
        // 2024-01-03 is a Wednesday
        assert_eq!(Periodicity::Weekly.period_start(d(2024, 1, 3)), d(2024, 1, 1));
        assert_eq!(Periodicity::Weekly.period_end(d(2024, 1, 3)), d(2024, 1, 7));
        // ISO week crossing a year boundary
        assert_eq!(Periodicity::Weekly.period_start(d(2021, 1, 1)), d(2020, 12, 28));
    }

    #[test]
    fn monthly_boundaries() {
        assert_eq!(Periodicity::Monthly.period_start(d(2020, 2, 29)), d(2020, 2, 1));
        assert_eq!(Periodicity::Monthly.period_end(d(2020, 2, 10)), d(2020, 2, 29));
        assert_eq!(Periodicity::Monthly.next_period_start(d(2020, 12, 31)), d(2021, 1, 1));
        assert_eq!(Periodicity::Monthly.previous_period_start(d(2021, 1, 1)), d(2020, 12, 1));
    }

    #[test]
    fn next_period_start_moves_forward_from_a_boundary() {
        assert_eq!(Periodicity::Monthly.next_period_start(d(2020, 3, 1)), d(2020, 4, 1));
        assert_eq!(Periodicity::Weekly.next_period_start(d(2024, 1, 1)), d(2024, 1, 8));
        assert_eq!(Periodicity::Daily.next_period_start(d(2024, 1, 1)), d(2024, 1, 2));
    }

    #[test]
    fn nesting_rules() {
        assert!(Periodicity::Daily.nests_into(Periodicity::Monthly));
        assert!(Periodicity::Monthly.nests_into(Periodicity::Monthly));
        assert!(!Periodicity::Weekly.nests_into(Periodicity::Monthly));
        assert!(!Periodicity::Monthly.nests_into(Periodicity::Daily));
    }

    #[test]
    fn periods_per_year() {
        assert_eq!(Periodicity::Daily.periods_per_year(), 365);
        assert_eq!(Periodicity::Weekly.periods_per_year(), 52);
        assert_eq!(Periodicity::Monthly.periods_per_year(), 12);
    }
}
