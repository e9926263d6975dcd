//! # pagemeta-core
//!
//! Core types, traits, and abstractions for the pagemeta metadata engine.
//!
//! This crate provides the entry/property model, the query and visit request
//! types, the error taxonomy, and the repository traits that the storage,
//! query, and visit crates depend on.

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod query;
pub mod temporal;
pub mod traits;
pub mod visits;

// Re-export commonly used types at crate root
pub use config::{QueryConfig, VisitConfig};
pub use error::{Error, Result};
pub use models::*;
pub use query::{CategoryRow, MetadataQuery, QueryResult};
pub use temporal::{hour_bucket, SortOrder, TimePeriod};
pub use traits::*;
pub use visits::{TopVisitedFilter, VisitQuery, VisitRecord, VisitRecordInput, VisitTotal};
