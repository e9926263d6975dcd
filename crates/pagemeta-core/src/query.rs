//! Caller-facing query request and response types.

use serde::{Deserialize, Serialize};

use crate::models::MetadataEntry;

fn default_start_index() -> i64 {
    1
}

/// A transient query over the indexed entries.
///
/// `criteria` clauses are AND-ed. `start_index` is 1-based. A `max_results`
/// of zero or `None` means "unbounded up to the system query limit".
/// `anchor` requests the page containing that `pagepath` and takes
/// precedence over `start_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataQuery {
    #[serde(default)]
    pub criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(default = "default_start_index")]
    pub start_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_max_results: Option<i64>,
    #[serde(default)]
    pub return_total_entries: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

impl Default for MetadataQuery {
    fn default() -> Self {
        Self {
            criteria: Vec::new(),
            order_by: None,
            start_index: default_start_index(),
            max_results: None,
            total_max_results: None,
            return_total_entries: false,
            anchor: None,
        }
    }
}

impl MetadataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one criteria clause.
    pub fn criterion(mut self, clause: impl Into<String>) -> Self {
        self.criteria.push(clause.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn start_index(mut self, start_index: i64) -> Self {
        self.start_index = start_index;
        self
    }

    pub fn max_results(mut self, max_results: i64) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn total_max_results(mut self, total_max_results: i64) -> Self {
        self.total_max_results = Some(total_max_results);
        self
    }

    pub fn with_total(mut self) -> Self {
        self.return_total_entries = true;
        self
    }

    pub fn anchor(mut self, pagepath: impl Into<String>) -> Self {
        self.anchor = Some(pagepath.into());
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub entries: Vec<MetadataEntry>,
    /// Size of the full filtered set; `None` when not requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Effective 1-based index of the first returned entry.
    pub start_index: i64,
}

impl QueryResult {
    pub fn pagepaths(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.pagepath.as_str()).collect()
    }
}

/// A raw grouped category row: a normalized path and how many entries name it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub path: String,
    pub count: u64,
}
