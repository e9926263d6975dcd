//! Visit tracker: buffered hit counting and top-visited rankings.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, instrument, trace};

use pagemeta_core::{Result, TopVisitedFilter, VisitConfig, VisitQuery, VisitRepository, VisitTotal};

use crate::buffer::VisitBuffer;

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Hour buckets written.
    pub records: usize,
    /// Hits contained in those buckets.
    pub hits: u64,
}

impl FlushStats {
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

/// Counts page hits in memory and merges them into a [`VisitRepository`].
///
/// Rankings read only flushed data, so a hit becomes visible within one
/// flush interval.
#[derive(Clone)]
pub struct VisitTracker {
    buffer: Arc<VisitBuffer>,
    repository: Arc<dyn VisitRepository>,
    config: VisitConfig,
}

impl VisitTracker {
    pub fn new(repository: Arc<dyn VisitRepository>, config: VisitConfig) -> Self {
        Self {
            buffer: Arc::new(VisitBuffer::new()),
            repository,
            config,
        }
    }

    /// Replace the hit buffer, e.g. to share one buffer between trackers.
    pub fn with_buffer(mut self, buffer: Arc<VisitBuffer>) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn config(&self) -> &VisitConfig {
        &self.config
    }

    pub fn buffer(&self) -> &Arc<VisitBuffer> {
        &self.buffer
    }

    /// Record one hit on a blog post.
    pub fn track_blog_post(&self, pagepath: &str) -> Result<()> {
        self.buffer.record(pagepath, Utc::now())?;
        trace!(subsystem = "visits", component = "tracker", pagepath, "Hit buffered");
        Ok(())
    }

    /// Merge every buffered hit into the repository.
    ///
    /// On failure the drained hits go back into the buffer and the error is
    /// returned, so the next flush retries them.
    #[instrument(skip(self), fields(subsystem = "visits", component = "tracker", op = "flush"))]
    pub async fn flush(&self) -> Result<FlushStats> {
        let records = self.buffer.drain();
        if records.is_empty() {
            trace!("Nothing to flush");
            return Ok(FlushStats::default());
        }

        let stats = FlushStats {
            records: records.len(),
            hits: records.iter().map(|r| r.hit_count).sum(),
        };
        let start = Instant::now();

        match self.repository.merge(records.clone()).await {
            Ok(()) => {
                info!(
                    record_count = stats.records,
                    hit_count = stats.hits,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Visits flushed"
                );
                Ok(stats)
            }
            Err(e) => {
                error!(
                    record_count = stats.records,
                    hit_count = stats.hits,
                    error = %e,
                    "Visit flush failed, hits returned to buffer"
                );
                self.buffer.restore(records);
                Err(e)
            }
        }
    }

    /// Page paths of the most visited posts, best ranked first.
    pub async fn get_top_visited_blog_posts(&self, query: &VisitQuery) -> Result<Vec<String>> {
        Ok(self
            .top_visited(query)
            .await?
            .into_iter()
            .map(|t| t.pagepath)
            .collect())
    }

    /// Ranked hit totals for the query's window and section.
    #[instrument(skip(self, query), fields(
        subsystem = "visits",
        component = "tracker",
        op = "top_visited",
        time_period = %query.time_period,
        sort_order = ?query.sort_order,
    ))]
    pub async fn top_visited(&self, query: &VisitQuery) -> Result<Vec<VisitTotal>> {
        let section = query.section_path.trim();
        let filter = TopVisitedFilter {
            since: query.time_period.since(Utc::now()),
            section_path: (!section.is_empty()).then(|| section.to_string()),
            order: query.sort_order,
            limit: self.resolve_limit(&query.limit),
        };
        let totals = self.repository.top_visited(&filter).await?;
        debug!(result_count = totals.len(), limit = filter.limit, "Top visited resolved");
        Ok(totals)
    }

    /// Visit records cannot be deleted.
    pub async fn delete(&self, pagepaths: &[String]) -> Result<u64> {
        self.repository.delete(pagepaths).await
    }

    /// Turn the caller's text limit into a row count.
    ///
    /// A positive integer is used as given, even above `max_limit`. Anything
    /// else falls back to `min(default_limit, max_limit)`.
    pub fn resolve_limit(&self, raw: &str) -> usize {
        let fallback = self.config.default_limit.min(self.config.max_limit).max(1);
        match raw.trim().parse::<i64>() {
            Ok(n) if n > 0 => {
                let n = usize::try_from(n).unwrap_or(usize::MAX);
                if n > self.config.max_limit {
                    debug!(
                        requested = n,
                        max_limit = self.config.max_limit,
                        "Requested limit exceeds UI maximum, honoring request"
                    );
                }
                n
            }
            _ => {
                if !raw.trim().is_empty() {
                    debug!(raw, fallback, "Unusable limit, using default");
                }
                fallback
            }
        }
    }
}

impl std::fmt::Debug for VisitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitTracker")
            .field("pending_hits", &self.buffer.pending_hits())
            .field("config", &self.config)
            .finish()
    }
}
