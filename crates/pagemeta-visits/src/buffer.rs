//! In-memory hit buffer.
//!
//! Hits accumulate per page path per UTC hour. A flush takes the whole map in
//! one swap so increments arriving during a flush land in the fresh map.

use std::collections::HashMap;
use std::mem;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use pagemeta_core::{hour_bucket, Error, Result, VisitRecord};

#[derive(Debug, Clone, Copy)]
struct Pending {
    hits: u64,
    last_hit: DateTime<Utc>,
}

type BucketKey = (String, DateTime<Utc>);

#[derive(Debug, Default)]
pub struct VisitBuffer {
    pending: Mutex<HashMap<BucketKey, Pending>>,
}

impl VisitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one hit on `pagepath` at `at`.
    pub fn record(&self, pagepath: &str, at: DateTime<Utc>) -> Result<()> {
        if pagepath.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "Cannot track a blank pagepath".to_string(),
            ));
        }
        let mut pending = self.lock();
        Self::add(&mut pending, pagepath.to_string(), at, 1);
        Ok(())
    }

    /// Take every pending bucket, leaving the buffer empty.
    pub fn drain(&self) -> Vec<VisitRecord> {
        let taken = mem::take(&mut *self.lock());
        taken
            .into_iter()
            .map(|((pagepath, _), p)| VisitRecord {
                pagepath,
                hit_date: p.last_hit,
                hit_count: p.hits,
            })
            .collect()
    }

    /// Put drained records back after a failed flush.
    pub fn restore(&self, records: Vec<VisitRecord>) {
        let mut pending = self.lock();
        for record in records {
            Self::add(&mut pending, record.pagepath, record.hit_date, record.hit_count);
        }
    }

    /// Hits waiting to be flushed.
    pub fn pending_hits(&self) -> u64 {
        self.lock().values().map(|p| p.hits).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn add(map: &mut HashMap<BucketKey, Pending>, pagepath: String, at: DateTime<Utc>, hits: u64) {
        map.entry((pagepath, hour_bucket(at)))
            .and_modify(|p| {
                p.hits = p.hits.saturating_add(hits);
                p.last_hit = p.last_hit.max(at);
            })
            .or_insert(Pending { hits, last_hit: at });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<BucketKey, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
