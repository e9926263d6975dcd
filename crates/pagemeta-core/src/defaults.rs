//! Centralized default constants for pagemeta.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// QUERY
// =============================================================================

/// System-wide cap on rows a single query may return.
pub const QUERY_LIMIT: i64 = 1000;

/// Queries slower than this are logged at WARN.
pub const SLOW_QUERY_MS: u64 = 250;

/// Property whose comma-separated values are aggregated as tags.
pub const TAG_PROPERTY: &str = "dcterms:references";

/// Property whose slash-delimited values are aggregated as categories.
pub const CATEGORY_PROPERTY: &str = "dcterms:subject";

/// Date patterns accepted in criteria literals (chrono format syntax).
pub const DATE_PATTERNS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Date-only pattern accepted in criteria literals (midnight UTC).
pub const DATE_ONLY_PATTERN: &str = "%Y-%m-%d";

// =============================================================================
// ENTRY STORE
// =============================================================================

/// Entries saved concurrently by a bulk `save`.
pub const SAVE_CONCURRENCY: usize = 8;

// =============================================================================
// VISIT TRACKING
// =============================================================================

/// Interval between buffered visit flushes.
pub const VISIT_FLUSH_INTERVAL_SECS: u64 = 60;

/// Default number of top-visited posts returned when no usable limit is given.
pub const VISIT_TOP_DEFAULT_LIMIT: usize = 5;

/// UI-facing maximum for the top-visited list.
pub const VISIT_TOP_MAX_LIMIT: usize = 10;

/// Broadcast channel capacity for flush worker events.
pub const EVENT_BUS_CAPACITY: usize = 64;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of pooled PostgreSQL connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquire timeout in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle connection timeout in seconds.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default maximum connection lifetime in seconds.
pub const DB_MAX_LIFETIME_SECS: u64 = 1800;
