//! Query executor.
//!
//! Filters the indexed entry set with compiled criteria, sorts it, and cuts
//! one page out of the result, by offset or by anchor.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use pagemeta_core::{
    defaults, validate_pagepath, CategoryRow, EntryRepository, Error, MetadataEntry,
    MetadataQuery, QueryConfig, QueryResult, Result, ValueType,
};

use crate::blog::BlogWindow;
use crate::categories::{category_rows, CategoryTree};
use crate::criteria::CriteriaCompiler;
use crate::order::OrderBy;
use crate::tags::{aggregate_tags, TagCount, TagSort};

/// Filtered and sorted entries before pagination.
struct Selection {
    /// Sorted matches, truncated to `totalMaxResults` by [`QueryExecutor::select`].
    entries: Vec<MetadataEntry>,
    /// Size of the full filtered set.
    matched: usize,
}

/// Executes [`MetadataQuery`] requests against an entry repository.
pub struct QueryExecutor {
    repository: Arc<dyn EntryRepository>,
    compiler: CriteriaCompiler,
    config: QueryConfig,
    query_limit: AtomicI64,
}

impl QueryExecutor {
    pub fn new(repository: Arc<dyn EntryRepository>, config: QueryConfig) -> Self {
        let query_limit = AtomicI64::new(config.query_limit.max(1));
        Self {
            repository,
            compiler: CriteriaCompiler::new(),
            config,
            query_limit,
        }
    }

    /// Declare a property's value type for compile-time literal checks.
    pub fn with_declared_type(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.compiler = self.compiler.declare(name, value_type);
        self
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Current system-wide cap on rows per query.
    pub fn query_limit(&self) -> i64 {
        self.query_limit.load(Ordering::Relaxed)
    }

    /// Change the system-wide cap at runtime.
    pub fn set_query_limit(&self, limit: i64) -> Result<()> {
        if limit < 1 {
            return Err(Error::InvalidArgument(format!(
                "query limit must be positive, got {}",
                limit
            )));
        }
        let previous = self.query_limit.swap(limit, Ordering::Relaxed);
        debug!(
            subsystem = "query",
            component = "executor",
            previous,
            limit,
            "Query limit changed"
        );
        Ok(())
    }

    /// Rows per page: the smallest of the query limit and the positive
    /// `maxResults`/`totalMaxResults` values.
    fn page_size(&self, query: &MetadataQuery) -> usize {
        let mut size = self.query_limit();
        for bound in [query.max_results, query.total_max_results]
            .into_iter()
            .flatten()
        {
            if bound > 0 {
                size = size.min(bound);
            }
        }
        size.max(1) as usize
    }

    fn validate(query: &MetadataQuery) -> Result<()> {
        if let Some(n) = query.max_results.filter(|n| *n < 0) {
            return Err(Error::InvalidArgument(format!(
                "maxResults cannot be negative, got {}",
                n
            )));
        }
        if let Some(n) = query.total_max_results.filter(|n| *n < 0) {
            return Err(Error::InvalidArgument(format!(
                "totalMaxResults cannot be negative, got {}",
                n
            )));
        }
        match &query.anchor {
            Some(anchor) => validate_pagepath(anchor)
                .map_err(|e| Error::InvalidArgument(format!("Invalid anchor path: {}", e)))?,
            None if query.start_index < 1 => {
                return Err(Error::InvalidArgument(format!(
                    "startIndex must be at least 1, got {}",
                    query.start_index
                )))
            }
            None => {}
        }
        Ok(())
    }

    async fn select(&self, query: &MetadataQuery) -> Result<Selection> {
        let mut selection = self.select_all(query).await?;
        if let Some(cap) = query.total_max_results.filter(|n| *n > 0) {
            selection.entries.truncate(cap as usize);
        }
        Ok(selection)
    }

    /// Every sorted match, ignoring `totalMaxResults`.
    async fn select_all(&self, query: &MetadataQuery) -> Result<Selection> {
        Self::validate(query)?;
        let filter = self.compiler.compile_all(&query.criteria)?;
        let order = OrderBy::parse(query.order_by.as_deref().unwrap_or_default())?;

        let matches: Vec<MetadataEntry> = self
            .repository
            .all_entries()
            .await?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        let matched = matches.len();

        let entries = order.sort(matches);
        Ok(Selection { entries, matched })
    }

    /// Execute a query and return one page of entries.
    #[instrument(skip(self, query), fields(
        subsystem = "query",
        component = "executor",
        op = "execute",
        criteria_count = query.criteria.len(),
    ))]
    pub async fn execute(&self, query: &MetadataQuery) -> Result<QueryResult> {
        let start = Instant::now();
        let selection = self.select(query).await?;
        let available = selection.entries.len();
        let page_size = self.page_size(query);

        let offset = match &query.anchor {
            Some(anchor) => selection
                .entries
                .iter()
                .position(|e| &e.pagepath == anchor)
                .map(|pos| (pos / page_size) * page_size)
                .unwrap_or(0),
            None => {
                let requested = (query.start_index - 1) as usize;
                if requested >= available {
                    // Past the end: clip to the last full or partial page
                    available.saturating_sub(page_size)
                } else {
                    requested
                }
            }
        };

        let entries: Vec<MetadataEntry> = selection
            .entries
            .into_iter()
            .skip(offset)
            .take(page_size)
            .collect();
        let total = query
            .return_total_entries
            .then_some(selection.matched as u64);

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            matched_count = selection.matched,
            result_count = entries.len(),
            start_index = offset + 1,
            page_size,
            duration_ms,
            "Query executed"
        );
        if duration_ms > defaults::SLOW_QUERY_MS {
            warn!(
                duration_ms,
                slow = true,
                criteria = ?query.criteria,
                "Slow metadata query"
            );
        }

        Ok(QueryResult {
            entries,
            total,
            start_index: offset as i64 + 1,
        })
    }

    /// Grouped `(category path, count)` rows of `property` over every match.
    ///
    /// Counts cover the full filtered set; `totalMaxResults` and the query
    /// limit cap the number of rows returned.
    pub async fn execute_category_query(
        &self,
        query: &MetadataQuery,
        property: &str,
    ) -> Result<Vec<CategoryRow>> {
        let selection = self.select_all(query).await?;
        let mut rows = category_rows(&selection.entries, property);

        let mut cap = self.query_limit();
        if let Some(n) = query.total_max_results.filter(|n| *n > 0) {
            cap = cap.min(n);
        }
        rows.truncate(cap.max(1) as usize);

        debug!(
            subsystem = "query",
            component = "executor",
            op = "category_query",
            property,
            matched_count = selection.matched,
            result_count = rows.len(),
            "Category query executed"
        );
        Ok(rows)
    }

    /// Tags of the configured tag property over the matches.
    pub async fn execute_tags(&self, query: &MetadataQuery, sort: TagSort) -> Result<Vec<TagCount>> {
        let selection = self.select(query).await?;
        Ok(aggregate_tags(
            &selection.entries,
            &self.config.tag_property,
            sort,
        ))
    }

    /// Category tree of the configured category property over every match.
    ///
    /// Row caps do not apply; the tree always aggregates all paths.
    pub async fn execute_categories(&self, query: &MetadataQuery) -> Result<CategoryTree> {
        let selection = self.select_all(query).await?;
        let rows = category_rows(&selection.entries, &self.config.category_property);
        Ok(CategoryTree::from_rows(&rows))
    }

    /// Neighbors of `pagepath` in the sorted matches.
    pub async fn blog_window(&self, query: &MetadataQuery, pagepath: &str) -> Result<BlogWindow> {
        let selection = self.select(query).await?;
        Ok(BlogWindow::locate(&selection.entries, pagepath))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pagemeta_core::MetadataProperty;
    use std::sync::Mutex;

    /// Fixed entry set; writes are ignored.
    struct StaticRepository {
        entries: Vec<MetadataEntry>,
        scans: Mutex<usize>,
    }

    impl StaticRepository {
        fn numbered(n: usize) -> Self {
            let entries = (1..=n)
                .map(|i| {
                    MetadataEntry::new(format!("/site/p{:02}", i))
                        .with_site("testsite")
                        .with_property(MetadataProperty::number("seq", i as f64))
                })
                .collect();
            Self::with_entries(entries)
        }

        fn with_entries(entries: Vec<MetadataEntry>) -> Self {
            Self {
                entries,
                scans: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl EntryRepository for StaticRepository {
        async fn save_entry(&self, _entry: MetadataEntry) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _pagepaths: &[String]) -> Result<u64> {
            Ok(0)
        }
        async fn find_entry(&self, pagepath: &str) -> Result<Option<MetadataEntry>> {
            Ok(self.entries.iter().find(|e| e.pagepath == pagepath).cloned())
        }
        async fn all_entries(&self) -> Result<Vec<MetadataEntry>> {
            *self.scans.lock().unwrap() += 1;
            Ok(self.entries.clone())
        }
        async fn delete_all(&self) -> Result<u64> {
            Ok(0)
        }
        async fn count(&self) -> Result<u64> {
            Ok(self.entries.len() as u64)
        }
    }

    fn executor(n: usize) -> QueryExecutor {
        QueryExecutor::new(Arc::new(StaticRepository::numbered(n)), QueryConfig::default())
    }

    fn seq_query() -> MetadataQuery {
        MetadataQuery::new().order_by("seq asc")
    }

    #[tokio::test]
    async fn test_total_is_full_filtered_count() {
        let exec = executor(10);
        let result = exec
            .execute(&seq_query().max_results(3).with_total())
            .await
            .unwrap();
        assert_eq!(result.entries.len(), 3);
        assert_eq!(result.total, Some(10));
    }

    #[tokio::test]
    async fn test_total_absent_unless_requested() {
        let result = executor(4).execute(&seq_query()).await.unwrap();
        assert_eq!(result.total, None);

        let empty = executor(4)
            .execute(&seq_query().criterion("site='nowhere'").with_total())
            .await
            .unwrap();
        assert_eq!(empty.total, Some(0));
        assert!(empty.entries.is_empty());
    }

    #[tokio::test]
    async fn test_start_index_pages() {
        let exec = executor(10);
        let result = exec
            .execute(&seq_query().start_index(4).max_results(3))
            .await
            .unwrap();
        assert_eq!(result.pagepaths(), vec!["/site/p04", "/site/p05", "/site/p06"]);
        assert_eq!(result.start_index, 4);
    }

    #[tokio::test]
    async fn test_start_beyond_end_returns_last_page() {
        let exec = executor(10);
        let last = exec
            .execute(&seq_query().start_index(8).max_results(3))
            .await
            .unwrap();
        for start in [11, 12, 500] {
            let clipped = exec
                .execute(&seq_query().start_index(start).max_results(3))
                .await
                .unwrap();
            assert_eq!(clipped.pagepaths(), last.pagepaths());
            assert_eq!(clipped.start_index, 8);
        }
        assert_eq!(last.pagepaths(), vec!["/site/p08", "/site/p09", "/site/p10"]);

        // Fewer items than one page
        let small = executor(2)
            .execute(&seq_query().start_index(9).max_results(5))
            .await
            .unwrap();
        assert_eq!(small.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let exec = executor(3);
        for query in [
            seq_query().start_index(0),
            seq_query().start_index(-2),
            seq_query().max_results(-1),
            seq_query().total_max_results(-5),
            seq_query().anchor(""),
            seq_query().anchor("relative"),
        ] {
            let err = exec.execute(&query).await.unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{:?}", query);
        }
    }

    #[tokio::test]
    async fn test_malformed_query_skips_repository_scan() {
        let repo = Arc::new(StaticRepository::numbered(3));
        let exec = QueryExecutor::new(repo.clone(), QueryConfig::default());
        let err = exec
            .execute(&MetadataQuery::new().criterion("site = 'x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedQuery { .. }));
        assert_eq!(*repo.scans.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_limit_caps_page() {
        let exec = executor(10);
        exec.set_query_limit(4).unwrap();
        assert_eq!(exec.query_limit(), 4);

        let result = exec
            .execute(&seq_query().max_results(8).with_total())
            .await
            .unwrap();
        assert_eq!(result.entries.len(), 4);
        assert_eq!(result.total, Some(10));

        assert!(exec.set_query_limit(0).is_err());
    }

    #[tokio::test]
    async fn test_zero_max_results_is_unbounded() {
        let result = executor(7).execute(&seq_query().max_results(0)).await.unwrap();
        assert_eq!(result.entries.len(), 7);
    }

    #[tokio::test]
    async fn test_total_max_results_truncates_sorted_set() {
        let exec = executor(10);
        let result = exec
            .execute(&seq_query().order_by("seq desc").total_max_results(4).start_index(99))
            .await
            .unwrap();
        assert_eq!(
            result.pagepaths(),
            vec!["/site/p10", "/site/p09", "/site/p08", "/site/p07"]
        );
    }

    #[tokio::test]
    async fn test_anchor_finds_containing_page() {
        let exec = executor(10);
        let result = exec
            .execute(&seq_query().max_results(3).anchor("/site/p05").start_index(1))
            .await
            .unwrap();
        assert_eq!(result.pagepaths(), vec!["/site/p04", "/site/p05", "/site/p06"]);
        assert_eq!(result.start_index, 4);

        let missing = exec
            .execute(&seq_query().max_results(3).anchor("/site/absent").start_index(7))
            .await
            .unwrap();
        assert_eq!(missing.pagepaths(), vec!["/site/p01", "/site/p02", "/site/p03"]);
    }

    #[tokio::test]
    async fn test_anchor_ignores_invalid_start_index() {
        let result = executor(5)
            .execute(&seq_query().max_results(2).anchor("/site/p05").start_index(0))
            .await
            .unwrap();
        assert_eq!(result.pagepaths(), vec!["/site/p05"]);
    }

    fn subjects(path: &str, subjects: &[&str]) -> MetadataEntry {
        MetadataEntry::new(path).with_properties(
            subjects
                .iter()
                .map(|s| MetadataProperty::string(defaults::CATEGORY_PROPERTY, *s)),
        )
    }

    #[tokio::test]
    async fn test_category_counts_cover_every_match() {
        let mut entries: Vec<_> = (0..10)
            .map(|i| subjects(&format!("/site/a{:02}", i), &["/Cat/A"]))
            .collect();
        entries.push(subjects("/site/b", &["/Cat/B"]));
        let exec = QueryExecutor::new(
            Arc::new(StaticRepository::with_entries(entries)),
            QueryConfig::default(),
        );
        let property = defaults::CATEGORY_PROPERTY;

        let capped = exec
            .execute_category_query(&MetadataQuery::new().total_max_results(1), property)
            .await
            .unwrap();
        assert_eq!(
            capped,
            vec![CategoryRow {
                path: "/Cat/A".into(),
                count: 10
            }]
        );

        let uncapped = exec
            .execute_category_query(&MetadataQuery::new(), property)
            .await
            .unwrap();
        assert_eq!(uncapped.len(), 2);
        assert_eq!(uncapped[0].count, 10);

        exec.set_query_limit(1).unwrap();
        let limited = exec
            .execute_category_query(&MetadataQuery::new(), property)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].count, 10);
    }

    #[tokio::test]
    async fn test_category_tree_ignores_row_caps() {
        let entry = subjects("/site/x", &["/C/A/A1", "/C/A/A2", "/C/B/B1", "/C/B/B2"]);
        let exec = QueryExecutor::new(
            Arc::new(StaticRepository::with_entries(vec![entry])),
            QueryConfig::default(),
        );
        exec.set_query_limit(2).unwrap();

        let tree = exec
            .execute_categories(&MetadataQuery::new().total_max_results(1))
            .await
            .unwrap();
        assert_eq!(tree.roots.len(), 1);
        assert_eq!(tree.roots[0].cumulative_count, 4);
        assert_eq!(tree.find("/C/B").unwrap().cumulative_count, 2);
        assert_eq!(tree.find("/C/B/B2").unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_declared_type_applies_to_criteria() {
        let exec = executor(3).with_declared_type("seq", ValueType::Number);
        let err = exec
            .execute(&MetadataQuery::new().criterion("seq > 'many'"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedQuery { .. }));

        let ok = exec
            .execute(&seq_query().criterion("seq >= 2"))
            .await
            .unwrap();
        assert_eq!(ok.pagepaths(), vec!["/site/p02", "/site/p03"]);
    }
}
