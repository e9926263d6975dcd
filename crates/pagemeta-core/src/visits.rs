//! Visit records and ranking query types.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::temporal::{SortOrder, TimePeriod};

/// Aggregated hits for one page path, stamped with the latest hit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub pagepath: String,
    pub hit_date: DateTime<Utc>,
    pub hit_count: u64,
}

impl VisitRecord {
    /// Build a record, rejecting a blank page path.
    pub fn new(
        pagepath: impl Into<String>,
        hit_date: DateTime<Utc>,
        hit_count: u64,
    ) -> Result<Self> {
        let pagepath = pagepath.into();
        if pagepath.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "Visit record pagepath cannot be blank".to_string(),
            ));
        }
        Ok(Self {
            pagepath,
            hit_date,
            hit_count,
        })
    }
}

/// Loosely-typed visit record as it arrives from outside the crate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisitRecordInput {
    pub pagepath: Option<String>,
    pub hit_date: Option<DateTime<Utc>>,
    pub hit_count: Option<i64>,
}

impl TryFrom<VisitRecordInput> for VisitRecord {
    type Error = Error;

    fn try_from(input: VisitRecordInput) -> Result<Self> {
        let pagepath = input
            .pagepath
            .ok_or_else(|| Error::InvalidArgument("Visit record pagepath is required".into()))?;
        let hit_date = input
            .hit_date
            .ok_or_else(|| Error::InvalidArgument("Visit record hit_date is required".into()))?;
        let hit_count = input
            .hit_count
            .ok_or_else(|| Error::InvalidArgument("Visit record hit_count is required".into()))?;
        let hit_count = u64::try_from(hit_count).map_err(|_| {
            Error::InvalidArgument(format!(
                "Visit record hit_count cannot be negative: {}",
                hit_count
            ))
        })?;
        VisitRecord::new(pagepath, hit_date, hit_count)
    }
}

/// Caller request for the most-visited posts.
///
/// `limit` arrives as text from the presentation layer and is resolved by the
/// tracker; `section_path` is a pagepath prefix, empty for all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VisitQuery {
    #[serde(default)]
    pub limit: String,
    #[serde(default)]
    pub section_path: String,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub time_period: TimePeriod,
}

impl VisitQuery {
    pub fn new(limit: impl Into<String>) -> Self {
        Self {
            limit: limit.into(),
            ..Default::default()
        }
    }

    pub fn section(mut self, section_path: impl Into<String>) -> Self {
        self.section_path = section_path.into();
        self
    }

    pub fn sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn time_period(mut self, time_period: TimePeriod) -> Self {
        self.time_period = time_period;
        self
    }
}

/// Resolved ranking filter handed to a visit repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopVisitedFilter {
    /// Lower bound of the window, applied per hour bucket: a bucket is summed
    /// whole when its latest hit is at or after this instant, so up to an
    /// hour of hits older than `since` can be included.
    pub since: Option<DateTime<Utc>>,
    /// Page path prefix; `None` for all.
    pub section_path: Option<String>,
    pub order: SortOrder,
    pub limit: usize,
}

/// Summed hits for one path within a ranking window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitTotal {
    pub pagepath: String,
    pub hit_count: u64,
    pub last_hit: DateTime<Utc>,
}

impl VisitTotal {
    /// Ranking order: hit count in `order`, then most recent hit first,
    /// then pagepath ascending.
    pub fn ranking(order: SortOrder) -> impl Fn(&VisitTotal, &VisitTotal) -> Ordering {
        move |a, b| {
            let by_count = match order {
                SortOrder::Asc => a.hit_count.cmp(&b.hit_count),
                SortOrder::Desc => b.hit_count.cmp(&a.hit_count),
            };
            by_count
                .then_with(|| b.last_hit.cmp(&a.last_hit))
                .then_with(|| a.pagepath.cmp(&b.pagepath))
        }
    }
}
