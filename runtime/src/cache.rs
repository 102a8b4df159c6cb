//! Reference-moment caching — keep today's chart so it is acquired once per day.
//!
//! ## Single slot
//!
//! Only the most recent date's entry is retained. A `put` under any key
//! replaces whatever was stored; there is no timer, an entry goes stale only
//! when a lookup arrives with a different date key.
//!
//! ## Fill deduplication
//!
//! [`ReferenceMomentCache::get_or_fill`] holds a per-key async mutex across
//! the check-then-fill sequence, so concurrent misses for the same date run
//! the fill exactly once and the rest observe the stored value.

use crate::chart::FourPillarSet;
use dashmap::DashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// The cached chart and the date it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub date_key: String,
    pub value: FourPillarSet,
}

/// How a [`ReferenceMomentCache::get_or_fill`] call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Filled,
}

/// Single-slot, date-keyed cache of the reference chart.
#[derive(Default)]
pub struct ReferenceMomentCache {
    slot: RwLock<Option<CacheEntry>>,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl ReferenceMomentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached chart if it was stored under `date_key`.
    pub fn get(&self, date_key: &str) -> Option<FourPillarSet> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(entry) if entry.date_key == date_key => Some(entry.value),
            Some(entry) => {
                tracing::debug!(
                    cached = %entry.date_key,
                    requested = date_key,
                    "reference cache entry is stale"
                );
                None
            }
            None => None,
        }
    }

    /// Store `value` under `date_key`, replacing any previous entry.
    pub fn put(&self, date_key: &str, value: FourPillarSet) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = slot.as_ref().filter(|e| e.date_key != date_key) {
            tracing::info!(old = %old.date_key, new = date_key, "reference cache rolled over");
        }
        *slot = Some(CacheEntry {
            date_key: date_key.to_string(),
            value,
        });
    }

    /// Current entry regardless of key.
    pub fn peek(&self) -> Option<CacheEntry> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Return the entry for `date_key`, running `fill` on a miss and storing
    /// its result. A failed fill leaves the cache untouched.
    pub async fn get_or_fill<F, Fut, E>(
        &self,
        date_key: &str,
        fill: F,
    ) -> Result<(FourPillarSet, CacheOutcome), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<FourPillarSet, E>>,
    {
        if let Some(value) = self.get(date_key) {
            tracing::debug!(date_key, "reference cache hit");
            return Ok((value, CacheOutcome::Hit));
        }

        let lock = self
            .in_flight
            .entry(date_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        // Another caller may have filled the slot while we waited.
        let result = match self.get(date_key) {
            Some(value) => {
                tracing::debug!(date_key, "reference cache filled by concurrent request");
                Ok((value, CacheOutcome::Hit))
            }
            None => fill().await.map(|value| {
                self.put(date_key, value);
                (value, CacheOutcome::Filled)
            }),
        };

        drop(guard);
        self.in_flight
            .remove_if(date_key, |_, m| Arc::ptr_eq(m, &lock) && Arc::strong_count(m) <= 2);
        result
    }
}
