//! Core traits for pagemeta storage abstractions.
//!
//! These traits define the durable store boundary the engine consumes,
//! enabling pluggable backends and testability.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{MetadataEntry, SaveFailure, SaveReport};
use crate::visits::{TopVisitedFilter, VisitRecord, VisitTotal};

// =============================================================================
// ENTRY STORE
// =============================================================================

/// Repository of metadata entries keyed by `pagepath`.
///
/// Saving an entry replaces its attributes and its entire property set as
/// one unit. Saves of the same `pagepath` are serialized; saves of different
/// paths may proceed concurrently.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Upsert one entry, replacing all of its properties (all-or-nothing).
    async fn save_entry(&self, entry: MetadataEntry) -> Result<()>;

    /// Upsert many entries. A failure on one entry does not prevent the
    /// others; failures are reported per `pagepath`.
    async fn save(&self, entries: Vec<MetadataEntry>) -> Result<SaveReport> {
        let mut report = SaveReport::default();
        for entry in entries {
            let pagepath = entry.pagepath.clone();
            match self.save_entry(entry).await {
                Ok(()) => report.saved.push(pagepath),
                Err(e) => report.failed.push(SaveFailure {
                    pagepath,
                    error: e.to_string(),
                }),
            }
        }
        Ok(report)
    }

    /// Delete entries and their properties. Missing paths are ignored.
    ///
    /// Returns the number of entries removed.
    async fn delete(&self, pagepaths: &[String]) -> Result<u64>;

    /// Fetch one entry, `None` when absent.
    async fn find_entry(&self, pagepath: &str) -> Result<Option<MetadataEntry>>;

    /// Scan every entry.
    async fn all_entries(&self) -> Result<Vec<MetadataEntry>>;

    /// Remove every entry. Returns the number removed.
    async fn delete_all(&self) -> Result<u64>;

    /// Number of indexed entries.
    async fn count(&self) -> Result<u64>;

    /// Distinct parent directories of all indexed page paths.
    async fn indexed_directories(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .all_entries()
            .await?
            .iter()
            .map(MetadataEntry::directory)
            .collect())
    }
}

// =============================================================================
// VISIT STORE
// =============================================================================

/// Durable store of aggregated page visits.
#[async_trait]
pub trait VisitRepository: Send + Sync {
    /// Add each record's count to the persisted bucket for its path and hour,
    /// creating the bucket when absent.
    async fn merge(&self, records: Vec<VisitRecord>) -> Result<()>;

    /// Sum hits per path within the filter window and rank them.
    async fn top_visited(&self, filter: &TopVisitedFilter) -> Result<Vec<VisitTotal>>;

    /// Visit records cannot be deleted.
    async fn delete(&self, pagepaths: &[String]) -> Result<u64> {
        Err(Error::Unsupported(format!(
            "Deleting visit records is not supported ({} paths requested)",
            pagepaths.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Minimal repository exercising the provided trait methods.
    #[derive(Default)]
    struct VecRepository {
        entries: Mutex<Vec<MetadataEntry>>,
    }

    #[async_trait]
    impl EntryRepository for VecRepository {
        async fn save_entry(&self, entry: MetadataEntry) -> Result<()> {
            entry.validate()?;
            let mut entries = self.entries.lock().unwrap();
            entries.retain(|e| e.pagepath != entry.pagepath);
            entries.push(entry);
            Ok(())
        }

        async fn delete(&self, pagepaths: &[String]) -> Result<u64> {
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|e| !pagepaths.contains(&e.pagepath));
            Ok((before - entries.len()) as u64)
        }

        async fn find_entry(&self, pagepath: &str) -> Result<Option<MetadataEntry>> {
            let entries = self.entries.lock().unwrap();
            Ok(entries.iter().find(|e| e.pagepath == pagepath).cloned())
        }

        async fn all_entries(&self) -> Result<Vec<MetadataEntry>> {
            Ok(self.entries.lock().unwrap().clone())
        }

        async fn delete_all(&self) -> Result<u64> {
            let mut entries = self.entries.lock().unwrap();
            let n = entries.len() as u64;
            entries.clear();
            Ok(n)
        }

        async fn count(&self) -> Result<u64> {
            Ok(self.entries.lock().unwrap().len() as u64)
        }
    }

    struct NullVisits;

    #[async_trait]
    impl VisitRepository for NullVisits {
        async fn merge(&self, _records: Vec<VisitRecord>) -> Result<()> {
            Ok(())
        }

        async fn top_visited(&self, _filter: &TopVisitedFilter) -> Result<Vec<VisitTotal>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_default_save_reports_failures_per_entry() {
        let repo = VecRepository::default();
        let report = repo
            .save(vec![
                MetadataEntry::new("/site/a"),
                MetadataEntry::new(""),
                MetadataEntry::new("/site/b"),
            ])
            .await
            .unwrap();

        assert_eq!(report.saved, vec!["/site/a".to_string(), "/site/b".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].pagepath, "");
        assert!(!report.is_complete());
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_default_indexed_directories_are_distinct_parents() {
        let repo = VecRepository::default();
        repo.save(vec![
            MetadataEntry::new("/site/blog/a"),
            MetadataEntry::new("/site/blog/b"),
            MetadataEntry::new("/site/news/c"),
        ])
        .await
        .unwrap();

        let dirs: Vec<_> = repo.indexed_directories().await.unwrap().into_iter().collect();
        assert_eq!(dirs, vec!["/site/blog".to_string(), "/site/news".to_string()]);
    }

    #[tokio::test]
    async fn test_default_visit_delete_is_unsupported() {
        let err = NullVisits.delete(&["/a".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
