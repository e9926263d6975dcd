//! Structured logging schema and subscriber setup for pagemeta.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by the same field names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (entries, visits) |

pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "query", "visits"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "entry_store", "executor", "flush_worker"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "save", "execute", "flush"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Page path being operated on.
pub const PAGEPATH: &str = "pagepath";

/// Criteria clause being compiled.
pub const CLAUSE: &str = "clause";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of rows matching a filter before pagination.
pub const MATCHED_COUNT: &str = "matched_count";

/// Number of visit records written by a flush.
pub const RECORD_COUNT: &str = "record_count";

/// Number of hits contained in a flush.
pub const HIT_COUNT: &str = "hit_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";

/// Default env filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "pagemeta=info";

/// Output settings for the global subscriber.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// Daily-rotated log file; stdout when `None`.
    pub file: Option<std::path::PathBuf>,
    /// Force ANSI colors on or off.
    pub ansi: Option<bool>,
}

impl LogSettings {
    /// Read settings from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `LOG_FORMAT` | `text` | `text` or `json` |
    /// | `LOG_FILE` | unset | Path of a daily-rotated log file |
    /// | `LOG_ANSI` | auto | Force ANSI colors on/off |
    pub fn from_env() -> Self {
        Self {
            json: std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json"),
            file: std::env::var("LOG_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(Into::into),
            ansi: std::env::var("LOG_ANSI")
                .ok()
                .map(|v| v == "true" || v == "1"),
        }
    }
}

/// Install the global tracing subscriber from environment variables.
///
/// `RUST_LOG` sets the filter (default `pagemeta=info`); see
/// [`LogSettings::from_env`] for the rest.
pub fn init_from_env() -> Option<WorkerGuard> {
    init(&LogSettings::from_env())
}

/// Install the global tracing subscriber.
///
/// Returns the appender guard when file logging is enabled; keep it alive
/// for as long as logs should be written or buffered lines are lost. A
/// second call leaves the first subscriber in place.
pub fn init(settings: &LogSettings) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = match settings.file.as_deref() {
        Some(path) => {
            let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("pagemeta.log");
            let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            if settings.json {
                let _ = registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(non_blocking),
                    )
                    .try_init();
            } else {
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(settings.ansi.unwrap_or(false));
                let _ = registry.with(layer).try_init();
            }
            Some(guard)
        }
        None => {
            if settings.json {
                let _ = registry
                    .with(tracing_subscriber::fmt::layer().json())
                    .try_init();
            } else {
                let mut layer = tracing_subscriber::fmt::layer();
                if let Some(ansi) = settings.ansi {
                    layer = layer.with_ansi(ansi);
                }
                let _ = registry.with(layer).try_init();
            }
            None
        }
    };

    tracing::info!(
        json = settings.json,
        log_file = ?settings.file,
        "Logging initialized"
    );

    guard
}
