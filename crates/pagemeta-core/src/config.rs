//! Environment-driven configuration for the query engine and visit tracker.

use std::time::Duration;

use crate::defaults;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Configuration for the query executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// System-wide cap on rows returned by one query.
    pub query_limit: i64,
    /// Property aggregated by tag pipelines.
    pub tag_property: String,
    /// Property aggregated by category pipelines.
    pub category_property: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            query_limit: defaults::QUERY_LIMIT,
            tag_property: defaults::TAG_PROPERTY.to_string(),
            category_property: defaults::CATEGORY_PROPERTY.to_string(),
        }
    }
}

impl QueryConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `QUERY_LIMIT` | `1000` | Hard cap on rows per query |
    /// | `QUERY_TAG_PROPERTY` | `dcterms:references` | Tag property name |
    /// | `QUERY_CATEGORY_PROPERTY` | `dcterms:subject` | Category property name |
    pub fn from_env() -> Self {
        let query_limit = env_parse::<i64>("QUERY_LIMIT")
            .filter(|v| *v > 0)
            .unwrap_or(defaults::QUERY_LIMIT);
        let tag_property = std::env::var("QUERY_TAG_PROPERTY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::TAG_PROPERTY.to_string());
        let category_property = std::env::var("QUERY_CATEGORY_PROPERTY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::CATEGORY_PROPERTY.to_string());

        Self {
            query_limit,
            tag_property,
            category_property,
        }
    }

    pub fn with_query_limit(mut self, limit: i64) -> Self {
        self.query_limit = limit;
        self
    }

    pub fn with_tag_property(mut self, name: impl Into<String>) -> Self {
        self.tag_property = name.into();
        self
    }

    pub fn with_category_property(mut self, name: impl Into<String>) -> Self {
        self.category_property = name.into();
        self
    }
}

/// Configuration for the visit tracker and its flush worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitConfig {
    /// Interval between buffer flushes.
    pub flush_interval: Duration,
    /// Whether the background flush worker runs.
    pub flush_enabled: bool,
    /// Limit used when the caller supplies no usable limit.
    pub default_limit: usize,
    /// UI-facing maximum for the top-visited list.
    pub max_limit: usize,
}

impl Default for VisitConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(defaults::VISIT_FLUSH_INTERVAL_SECS),
            flush_enabled: true,
            default_limit: defaults::VISIT_TOP_DEFAULT_LIMIT,
            max_limit: defaults::VISIT_TOP_MAX_LIMIT,
        }
    }
}

impl VisitConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `VISIT_FLUSH_INTERVAL_SECS` | `60` | Flush period |
    /// | `VISIT_FLUSH_ENABLED` | `true` | Enable/disable the flush worker |
    /// | `VISIT_TOP_DEFAULT_LIMIT` | `5` | Fallback top-visited limit |
    /// | `VISIT_TOP_MAX_LIMIT` | `10` | UI maximum for top-visited lists |
    pub fn from_env() -> Self {
        let flush_enabled = std::env::var("VISIT_FLUSH_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        let flush_interval = env_parse::<u64>("VISIT_FLUSH_INTERVAL_SECS")
            .unwrap_or(defaults::VISIT_FLUSH_INTERVAL_SECS)
            .max(1);
        let default_limit = env_parse::<usize>("VISIT_TOP_DEFAULT_LIMIT")
            .unwrap_or(defaults::VISIT_TOP_DEFAULT_LIMIT)
            .max(1);
        let max_limit = env_parse::<usize>("VISIT_TOP_MAX_LIMIT")
            .unwrap_or(defaults::VISIT_TOP_MAX_LIMIT)
            .max(1);

        Self {
            flush_interval: Duration::from_secs(flush_interval),
            flush_enabled,
            default_limit,
            max_limit,
        }
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_flush_enabled(mut self, enabled: bool) -> Self {
        self.flush_enabled = enabled;
        self
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_max_limit(mut self, limit: usize) -> Self {
        self.max_limit = limit;
        self
    }
}
