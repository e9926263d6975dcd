//! # pagemeta-query
//!
//! Query engine for the pagemeta metadata index.
//!
//! This crate provides:
//! - A criteria compiler for the `<identifier> <op> <literal>` predicate language
//! - Multi-clause order-by plans, including the `_lower` case-insensitive convention
//! - A query executor with offset and anchor pagination
//! - Tag and category aggregation, and the blog neighbor window
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pagemeta_core::{MetadataQuery, QueryConfig};
//! use pagemeta_db::MemoryEntryRepository;
//! use pagemeta_query::QueryExecutor;
//!
//! let executor = QueryExecutor::new(Arc::new(MemoryEntryRepository::new()), QueryConfig::default());
//! let page = executor
//!     .execute(
//!         &MetadataQuery::new()
//!             .criterion("type = 'blog'")
//!             .order_by("dcterms:created desc")
//!             .max_results(10)
//!             .with_total(),
//!     )
//!     .await?;
//! ```

pub mod blog;
pub mod categories;
pub mod criteria;
pub mod executor;
pub mod order;
pub mod tags;

pub use blog::BlogWindow;
pub use categories::{aggregate_categories, category_rows, CategoryNode, CategoryTree};
pub use criteria::{CompareOp, CriteriaCompiler, Criterion, Filter, Target};
pub use executor::QueryExecutor;
pub use order::{OrderBy, OrderClause, SortValue};
pub use tags::{aggregate_tags, TagCount, TagSort};
