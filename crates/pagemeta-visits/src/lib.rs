//! # pagemeta-visits
//!
//! Visit tracking for pagemeta blog posts.
//!
//! Hits are counted in an in-memory [`VisitBuffer`] keyed by page path and
//! UTC hour. A [`FlushWorker`] merges the buffer into a
//! [`VisitRepository`](pagemeta_core::VisitRepository) on a fixed interval,
//! and [`VisitTracker`] answers most-visited rankings from the flushed data.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pagemeta_core::{VisitConfig, VisitQuery};
//! use pagemeta_db::MemoryVisitRepository;
//! use pagemeta_visits::{FlushWorker, VisitTracker};
//!
//! let tracker = VisitTracker::new(Arc::new(MemoryVisitRepository::new()), VisitConfig::from_env());
//! let handle = FlushWorker::new(tracker.clone()).start();
//!
//! tracker.track_blog_post("/site/blog/hello")?;
//! let top = tracker.get_top_visited_blog_posts(&VisitQuery::new("5")).await?;
//!
//! handle.shutdown().await?;
//! ```

pub mod buffer;
pub mod tracker;
pub mod worker;

pub use buffer::VisitBuffer;
pub use tracker::{FlushStats, VisitTracker};
pub use worker::{FlushEvent, FlushHandle, FlushWorker};
