//! In-memory repository implementations.
//!
//! These honor the same contracts as the PostgreSQL repositories and back
//! embedded use and tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use pagemeta_core::{
    defaults, hour_bucket, EntryRepository, MetadataEntry, Result, SaveFailure, SaveReport,
    TopVisitedFilter, VisitRecord, VisitRepository, VisitTotal,
};

use crate::locks::KeyLocks;

// =============================================================================
// ENTRIES
// =============================================================================

/// Entry store held in a sorted map keyed by `pagepath`.
#[derive(Debug, Default)]
pub struct MemoryEntryRepository {
    entries: RwLock<BTreeMap<String, MetadataEntry>>,
    key_locks: KeyLocks,
}

impl MemoryEntryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntryRepository for MemoryEntryRepository {
    async fn save_entry(&self, entry: MetadataEntry) -> Result<()> {
        entry.validate()?;
        let _guard = self.key_locks.lock(&entry.pagepath).await;

        trace!(
            subsystem = "db",
            component = "memory_entries",
            op = "save",
            pagepath = %entry.pagepath,
            property_count = entry.properties.len(),
            "Replacing entry"
        );
        // The whole entry value is swapped, so stale properties cannot survive.
        self.entries
            .write()
            .await
            .insert(entry.pagepath.clone(), entry);
        Ok(())
    }

    async fn save(&self, entries: Vec<MetadataEntry>) -> Result<SaveReport> {
        let outcomes: Vec<(String, Result<()>)> = stream::iter(entries)
            .map(|entry| async move {
                let pagepath = entry.pagepath.clone();
                (pagepath, self.save_entry(entry).await)
            })
            .buffered(defaults::SAVE_CONCURRENCY)
            .collect()
            .await;

        let mut report = SaveReport::default();
        for (pagepath, outcome) in outcomes {
            match outcome {
                Ok(()) => report.saved.push(pagepath),
                Err(e) => report.failed.push(SaveFailure {
                    pagepath,
                    error: e.to_string(),
                }),
            }
        }

        debug!(
            subsystem = "db",
            component = "memory_entries",
            op = "save_bulk",
            saved = report.saved.len(),
            failed = report.failed.len(),
            "Bulk save finished"
        );
        Ok(report)
    }

    async fn delete(&self, pagepaths: &[String]) -> Result<u64> {
        let _guards = self.key_locks.lock_many(pagepaths).await;
        let mut entries = self.entries.write().await;
        let removed = pagepaths
            .iter()
            .filter(|p| entries.remove(p.as_str()).is_some())
            .count() as u64;

        debug!(
            subsystem = "db",
            component = "memory_entries",
            op = "delete",
            requested = pagepaths.len(),
            removed,
            "Deleted entries"
        );
        Ok(removed)
    }

    async fn find_entry(&self, pagepath: &str) -> Result<Option<MetadataEntry>> {
        Ok(self.entries.read().await.get(pagepath).cloned())
    }

    async fn all_entries(&self) -> Result<Vec<MetadataEntry>> {
        Ok(self.entries.read().await.values().cloned().collect())
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let removed = entries.len() as u64;
        entries.clear();
        debug!(
            subsystem = "db",
            component = "memory_entries",
            op = "delete_all",
            removed,
            "Cleared entry store"
        );
        Ok(removed)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.entries.read().await.len() as u64)
    }
}

// =============================================================================
// VISITS
// =============================================================================

/// Visit store holding one aggregated record per path per hour bucket.
#[derive(Debug, Default)]
pub struct MemoryVisitRepository {
    buckets: RwLock<HashMap<(String, DateTime<Utc>), VisitRecord>>,
}

impl MemoryVisitRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted buckets.
    pub async fn bucket_count(&self) -> usize {
        self.buckets.read().await.len()
    }
}

#[async_trait]
impl VisitRepository for MemoryVisitRepository {
    async fn merge(&self, records: Vec<VisitRecord>) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        for record in records {
            let key = (record.pagepath.clone(), hour_bucket(record.hit_date));
            buckets
                .entry(key)
                .and_modify(|existing| {
                    existing.hit_count = existing.hit_count.saturating_add(record.hit_count);
                    existing.hit_date = existing.hit_date.max(record.hit_date);
                })
                .or_insert(record);
        }
        Ok(())
    }

    async fn top_visited(&self, filter: &TopVisitedFilter) -> Result<Vec<VisitTotal>> {
        let buckets = self.buckets.read().await;
        let mut totals: HashMap<&str, VisitTotal> = HashMap::new();

        for record in buckets.values() {
            if filter.since.is_some_and(|since| record.hit_date < since) {
                continue;
            }
            if let Some(prefix) = filter.section_path.as_deref() {
                if !record.pagepath.starts_with(prefix) {
                    continue;
                }
            }
            totals
                .entry(record.pagepath.as_str())
                .and_modify(|t| {
                    t.hit_count = t.hit_count.saturating_add(record.hit_count);
                    t.last_hit = t.last_hit.max(record.hit_date);
                })
                .or_insert_with(|| VisitTotal {
                    pagepath: record.pagepath.clone(),
                    hit_count: record.hit_count,
                    last_hit: record.hit_date,
                });
        }

        let mut ranked: Vec<VisitTotal> = totals.into_values().collect();
        ranked.sort_by(VisitTotal::ranking(filter.order));
        ranked.truncate(filter.limit);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pagemeta_core::{Error, MetadataProperty, SortOrder};
    use std::sync::Arc;

    fn entry(path: &str, tags: &[&str]) -> MetadataEntry {
        MetadataEntry::new(path)
            .with_site("site")
            .with_properties(tags.iter().map(|t| MetadataProperty::string("tag", *t)))
    }

    #[tokio::test]
    async fn test_resave_replaces_property_set() {
        let repo = MemoryEntryRepository::new();
        repo.save_entry(entry("/site/a", &["old-1", "old-2"]))
            .await
            .unwrap();
        repo.save_entry(entry("/site/a", &["new"])).await.unwrap();

        let found = repo.find_entry("/site/a").await.unwrap().unwrap();
        assert_eq!(found.properties, vec![MetadataProperty::string("tag", "new")]);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_twice_is_noop() {
        let repo = MemoryEntryRepository::new();
        repo.save_entry(entry("/site/a", &[])).await.unwrap();

        let paths = vec!["/site/a".to_string()];
        assert_eq!(repo.delete(&paths).await.unwrap(), 1);
        assert!(repo.find_entry("/site/a").await.unwrap().is_none());
        assert_eq!(repo.delete(&paths).await.unwrap(), 0);
        assert!(repo.find_entry("/site/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_entry() {
        let repo = MemoryEntryRepository::new();
        let err = repo.save_entry(MetadataEntry::new("")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_bulk_save_isolates_failures() {
        let repo = MemoryEntryRepository::new();
        let report = repo
            .save(vec![
                entry("/site/a", &[]),
                entry("no-slash", &[]),
                entry("/site/b", &[]),
            ])
            .await
            .unwrap();

        assert_eq!(report.saved, vec!["/site/a".to_string(), "/site/b".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].pagepath, "no-slash");
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_all_and_scan() {
        let repo = MemoryEntryRepository::new();
        repo.save(vec![entry("/s/b", &[]), entry("/s/a", &[])])
            .await
            .unwrap();

        let paths: Vec<_> = repo
            .all_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.pagepath)
            .collect();
        assert_eq!(paths, vec!["/s/a".to_string(), "/s/b".to_string()]);

        assert_eq!(repo.delete_all().await.unwrap(), 2);
        assert!(repo.all_entries().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_same_path_last_writer_wins() {
        let repo = Arc::new(MemoryEntryRepository::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let tag = format!("v{}", i);
                repo.save_entry(entry("/site/hot", &[tag.as_str(), "shared"]))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let found = repo.find_entry("/site/hot").await.unwrap().unwrap();
        // Exactly one writer's full property set survives.
        assert_eq!(found.properties.len(), 2);
        assert_eq!(found.properties[1], MetadataProperty::string("tag", "shared"));
    }

    #[tokio::test]
    async fn test_visits_merge_into_hour_buckets() {
        let repo = MemoryVisitRepository::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap();
        repo.merge(vec![
            VisitRecord::new("/blog/a", t0, 2).unwrap(),
            VisitRecord::new("/blog/a", t0 + Duration::minutes(10), 3).unwrap(),
            VisitRecord::new("/blog/a", t0 + Duration::hours(2), 1).unwrap(),
        ])
        .await
        .unwrap();

        assert_eq!(repo.bucket_count().await, 2);

        let totals = repo
            .top_visited(&TopVisitedFilter {
                since: None,
                section_path: None,
                order: SortOrder::Desc,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].hit_count, 6);
        assert_eq!(totals[0].last_hit, t0 + Duration::hours(2));
    }

    #[tokio::test]
    async fn test_visits_window_section_and_limit() {
        let repo = MemoryVisitRepository::new();
        let now = Utc::now();
        repo.merge(vec![
            VisitRecord::new("/blog/old", now - Duration::days(10), 50).unwrap(),
            VisitRecord::new("/blog/new", now - Duration::hours(1), 2).unwrap(),
            VisitRecord::new("/news/x", now - Duration::hours(1), 9).unwrap(),
        ])
        .await
        .unwrap();

        let week = repo
            .top_visited(&TopVisitedFilter {
                since: Some(now - Duration::days(7)),
                section_path: Some("/blog".into()),
                order: SortOrder::Desc,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].pagepath, "/blog/new");

        let top_one = repo
            .top_visited(&TopVisitedFilter {
                since: None,
                section_path: None,
                order: SortOrder::Desc,
                limit: 1,
            })
            .await
            .unwrap();
        assert_eq!(top_one.len(), 1);
        assert_eq!(top_one[0].pagepath, "/blog/old");
    }

    #[tokio::test]
    async fn test_window_counts_whole_bucket_of_latest_hit() {
        let repo = MemoryVisitRepository::new();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 5, 0).unwrap();
        repo.merge(vec![
            VisitRecord::new("/blog/a", t0, 2).unwrap(),
            VisitRecord::new("/blog/a", t0 + Duration::minutes(45), 3).unwrap(),
            VisitRecord::new("/blog/b", t0 + Duration::minutes(10), 4).unwrap(),
        ])
        .await
        .unwrap();

        // 08:30 falls between the two /blog/a hits; their shared bucket's
        // latest hit is 08:50, so both count. /blog/b's bucket ends at 08:15.
        let totals = repo
            .top_visited(&TopVisitedFilter {
                since: Some(t0 + Duration::minutes(25)),
                section_path: None,
                order: SortOrder::Desc,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].pagepath, "/blog/a");
        assert_eq!(totals[0].hit_count, 5);
    }

    #[tokio::test]
    async fn test_visit_delete_unsupported() {
        let repo = MemoryVisitRepository::new();
        let err = repo.delete(&["/blog/a".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
