use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use duebell_core::types::{CardId, DedupKey, NotificationEvent};
use serde::Serialize;
use tracing::debug;

/// One obligation that has been delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupRecord {
    pub card_id: CardId,
    pub due_at: DateTime<Utc>,
    pub last_notified_at: DateTime<Utc>,
}

/// Remembers which (card, due date) pairs were already notified.
///
/// Process-local: a restart forgets everything and may notify again.
pub struct DedupTracker {
    retention: Duration,
    records: Mutex<HashMap<DedupKey, DedupRecord>>,
}

impl DedupTracker {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DedupKey, DedupRecord>> {
        // The map stays consistent across a panic mid-insert, so keep using it.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Events whose key has no record. Does not modify state.
    pub fn filter_unnotified(&self, events: Vec<NotificationEvent>) -> Vec<NotificationEvent> {
        let records = self.lock();
        events
            .into_iter()
            .filter(|e| !records.contains_key(&e.key()))
            .collect()
    }

    /// Record `events` as delivered at `at`. Call only after a confirmed publish.
    pub fn record_notified(&self, events: &[NotificationEvent], at: DateTime<Utc>) {
        let mut records = self.lock();
        for e in events {
            records.insert(
                e.key(),
                DedupRecord {
                    card_id: e.card_id.clone(),
                    due_at: e.due_at,
                    last_notified_at: at,
                },
            );
        }
    }

    /// Drop records whose due time is older than the retention horizon.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let horizon = now - self.retention;
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, r| r.due_at >= horizon);
        let evicted = before - records.len();
        if evicted > 0 {
            debug!(evicted, remaining = records.len(), "dedup records evicted");
        }
        evicted
    }

    pub fn get(&self, key: &DedupKey) -> Option<DedupRecord> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
