//! Cutoff module - translating a run's cutoff day into a per-policy boundary

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Granularity of a policy's partition column
///
/// The run's cutoff day is truncated to the start of the unit before it is
/// compared, so a `month` policy never splits a monthly partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnUnit {
    /// Daily partitions
    #[default]
    Day,

    /// Weekly partitions (weeks start on Monday)
    Week,

    /// Monthly partitions
    Month,

    /// Yearly partitions
    Year,
}

impl ColumnUnit {
    /// Get the unit name as stored in the catalog
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnUnit::Day => "day",
            ColumnUnit::Week => "week",
            ColumnUnit::Month => "month",
            ColumnUnit::Year => "year",
        }
    }

    /// Parse a unit name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "day" => Some(ColumnUnit::Day),
            "week" => Some(ColumnUnit::Week),
            "month" => Some(ColumnUnit::Month),
            "year" => Some(ColumnUnit::Year),
            _ => None,
        }
    }

    /// Truncate a date to the first day of its unit
    pub fn truncate(&self, date: NaiveDate) -> NaiveDate {
        let truncated = match self {
            ColumnUnit::Day => Some(date),
            ColumnUnit::Week => {
                date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
            }
            ColumnUnit::Month => date.with_day(1),
            ColumnUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        };
        truncated.unwrap_or(date)
    }

    /// Move a date back by `count` units
    pub fn step_back(&self, date: NaiveDate, count: u32) -> NaiveDate {
        let moved = match self {
            ColumnUnit::Day => date.checked_sub_days(Days::new(u64::from(count))),
            ColumnUnit::Week => date.checked_sub_days(Days::new(u64::from(count) * 7)),
            ColumnUnit::Month => date.checked_sub_months(Months::new(count)),
            ColumnUnit::Year => date.checked_sub_months(Months::new(count.saturating_mul(12))),
        };
        moved.unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for ColumnUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ColumnUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid column unit: {}", s))
    }
}

/// Compute the exclusive upper bound of eligible partition values
///
/// The cutoff day is truncated to the start of `unit`, then moved back by
/// `retention_period` units. Partitions with a value strictly below the
/// result are eligible; values at or after it are never touched.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use retention_domain::{effective_cutoff, ColumnUnit};
///
/// let day = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
/// assert_eq!(effective_cutoff(day, ColumnUnit::Day, 0), day);
/// assert_eq!(
///     effective_cutoff(day, ColumnUnit::Month, 1),
///     NaiveDate::from_ymd_opt(2024, 11, 1).unwrap()
/// );
/// ```
pub fn effective_cutoff(cutoff_day: NaiveDate, unit: ColumnUnit, retention_period: u32) -> NaiveDate {
    unit.step_back(unit.truncate(cutoff_day), retention_period)
}
