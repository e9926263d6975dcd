//! Time windows and sort direction for ranking queries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// TIME PERIOD
// =============================================================================

/// Named window restricting which hits are summed by a ranking query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimePeriod {
    /// Last 24 hours
    Day,
    /// Last 7 days
    Week,
    /// Last 30 days
    Month,
    /// No temporal restriction
    #[default]
    AllTime,
}

impl TimePeriod {
    /// Inclusive lower bound of the window ending at `now`.
    ///
    /// Returns `None` for `AllTime`.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimePeriod::Day => Some(now - Duration::hours(24)),
            TimePeriod::Week => Some(now - Duration::days(7)),
            TimePeriod::Month => Some(now - Duration::days(30)),
            TimePeriod::AllTime => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimePeriod::Day => "DAY",
            TimePeriod::Week => "WEEK",
            TimePeriod::Month => "MONTH",
            TimePeriod::AllTime => "ALLTIME",
        }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimePeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAY" => Ok(TimePeriod::Day),
            "WEEK" => Ok(TimePeriod::Week),
            "MONTH" => Ok(TimePeriod::Month),
            "ALLTIME" | "ALL_TIME" => Ok(TimePeriod::AllTime),
            other => Err(format!(
                "Invalid time period '{}'. Valid values: DAY, WEEK, MONTH, ALLTIME",
                other
            )),
        }
    }
}

// =============================================================================
// SORT ORDER
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            other => Err(format!("Invalid sort order '{}'. Use asc or desc", other)),
        }
    }
}

// =============================================================================
// BUCKETING
// =============================================================================

/// Truncate a timestamp to the start of its UTC hour.
///
/// Durable visit rows are aggregated per path per hour bucket.
pub fn hour_bucket(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(Duration::hours(1)).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_period_boundaries() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(
            TimePeriod::Day.since(now),
            Some(Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap())
        );
        assert_eq!(
            TimePeriod::Week.since(now),
            Some(Utc.with_ymd_and_hms(2024, 3, 3, 12, 0, 0).unwrap())
        );
        assert_eq!(
            TimePeriod::Month.since(now),
            Some(Utc.with_ymd_and_hms(2024, 2, 9, 12, 0, 0).unwrap())
        );
        assert!(TimePeriod::AllTime.since(now).is_none());
    }

    #[test]
    fn test_time_period_parse() {
        assert_eq!("day".parse::<TimePeriod>().unwrap(), TimePeriod::Day);
        assert_eq!("ALLTIME".parse::<TimePeriod>().unwrap(), TimePeriod::AllTime);
        assert_eq!(" Week ".parse::<TimePeriod>().unwrap(), TimePeriod::Week);
        assert!("year".parse::<TimePeriod>().is_err());
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("sideways".parse::<SortOrder>().is_err());
        assert_eq!(SortOrder::default(), SortOrder::Desc);
    }

    #[test]
    fn test_hour_bucket_truncates() {
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 12, 34, 56).unwrap();
        assert_eq!(
            hour_bucket(at),
            Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
        );
    }
}
