//! Bounded per-entity event history

use crate::{Category, HistoryRecord};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Caps applied to a history after every append
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowLimits {
    /// Keep at most this many most recent records
    pub max_count: Option<usize>,

    /// Drop records older than this, measured from the appended record
    pub max_age: Option<Duration>,
}

impl WindowLimits {
    /// Count cap only
    pub fn count(max_count: usize) -> Self {
        Self {
            max_count: Some(max_count),
            max_age: None,
        }
    }

    /// Age cap only
    pub fn age(max_age: Duration) -> Self {
        Self {
            max_count: None,
            max_age: Some(max_age),
        }
    }

    /// Add an age cap
    pub fn with_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

type HistoryKey = (Category, String);

fn evict(history: &mut VecDeque<HistoryRecord>, now: DateTime<Utc>, limits: WindowLimits) {
    if let Some(max_age) = limits.max_age {
        history.retain(|r| now - r.timestamp <= max_age);
    }

    if let Some(max_count) = limits.max_count {
        while history.len() > max_count {
            history.pop_front();
        }
    }
}

/// Process-wide store of event sequences, one per (category, entity id)
///
/// Each append holds the entry's shard lock across append, eviction and
/// snapshot, so concurrent calls for the same entity never interleave.
#[derive(Clone, Default)]
pub struct EntityHistoryStore {
    histories: Arc<DashMap<HistoryKey, VecDeque<HistoryRecord>>>,
}

impl EntityHistoryStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record` to its entity's history, evict, and return a snapshot
    ///
    /// Unknown entities start from an empty history. Age eviction is relative
    /// to the appended record's timestamp, then the count cap keeps the
    /// newest records in arrival order.
    pub fn append_and_fetch(&self, record: HistoryRecord, limits: WindowLimits) -> Vec<HistoryRecord> {
        let key = (record.category(), record.entity_id.clone());
        let now = record.timestamp;

        let mut entry = self.histories.entry(key).or_default();
        let history = entry.value_mut();

        history.push_back(record);
        evict(history, now, limits);

        history.iter().cloned().collect()
    }

    /// Evict relative to `now` and return a snapshot without appending
    ///
    /// Unknown entities yield an empty history and are not created.
    pub fn fetch(
        &self,
        category: Category,
        entity_id: &str,
        now: DateTime<Utc>,
        limits: WindowLimits,
    ) -> Vec<HistoryRecord> {
        match self.histories.get_mut(&(category, entity_id.to_string())) {
            Some(mut entry) => {
                let history = entry.value_mut();
                evict(history, now, limits);
                history.iter().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Current history length for an entity
    pub fn len(&self, category: Category, entity_id: &str) -> usize {
        self.histories
            .get(&(category, entity_id.to_string()))
            .map(|h| h.len())
            .unwrap_or(0)
    }

    /// Drop an entity's history (e.g., manual reset)
    pub fn reset(&self, category: Category, entity_id: &str) {
        self.histories.remove(&(category, entity_id.to_string()));
    }

    /// Number of (category, entity) histories held
    pub fn tracked_entities(&self) -> usize {
        self.histories.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventPayload;
    use chrono::{TimeZone, Utc};

    fn request(ip: &str, secs: i64) -> HistoryRecord {
        HistoryRecord::new(
            ip,
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            EventPayload::Request {
                remote_address: ip.to_string(),
            },
        )
    }

    #[test]
    fn test_count_cap_keeps_newest() {
        let store = EntityHistoryStore::new();
        let mut snapshot = Vec::new();
        for i in 0..5 {
            snapshot = store.append_and_fetch(request("10.0.0.1", i), WindowLimits::count(3));
        }

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].timestamp, request("x", 2).timestamp);
        assert_eq!(snapshot[2].timestamp, request("x", 4).timestamp);
    }

    #[test]
    fn test_age_cap_relative_to_new_record() {
        let store = EntityHistoryStore::new();
        let limits = WindowLimits::age(Duration::seconds(90));

        store.append_and_fetch(request("10.0.0.2", 0), limits);
        store.append_and_fetch(request("10.0.0.2", 60), limits);
        let snapshot = store.append_and_fetch(request("10.0.0.2", 120), limits);

        // 120 - 0 > 90 so the first record is gone
        assert_eq!(snapshot.len(), 2);
        assert_eq!(store.len(Category::RequestVelocity, "10.0.0.2"), 2);
    }

    #[test]
    fn test_age_boundary_is_inclusive() {
        let store = EntityHistoryStore::new();
        let limits = WindowLimits::age(Duration::seconds(90));

        store.append_and_fetch(request("10.0.0.3", 0), limits);
        let snapshot = store.append_and_fetch(request("10.0.0.3", 90), limits);
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_fetch_evicts_without_appending() {
        let store = EntityHistoryStore::new();
        let limits = WindowLimits::age(Duration::seconds(90));
        store.append_and_fetch(request("10.0.0.7", 0), limits);
        store.append_and_fetch(request("10.0.0.7", 60), limits);

        let snapshot = store.fetch(Category::RequestVelocity, "10.0.0.7", request("x", 100).timestamp, limits);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(Category::RequestVelocity, "10.0.0.7"), 1);

        let missing = store.fetch(Category::RequestVelocity, "10.0.0.8", request("x", 100).timestamp, limits);
        assert!(missing.is_empty());
        assert_eq!(store.tracked_entities(), 1);
    }

    #[test]
    fn test_entities_isolated() {
        let store = EntityHistoryStore::new();
        store.append_and_fetch(request("10.0.0.4", 0), WindowLimits::default());
        let snapshot = store.append_and_fetch(request("10.0.0.5", 1), WindowLimits::default());

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.tracked_entities(), 2);

        store.reset(Category::RequestVelocity, "10.0.0.4");
        assert_eq!(store.tracked_entities(), 1);
        assert_eq!(store.len(Category::RequestVelocity, "10.0.0.4"), 0);
    }

    #[test]
    fn test_concurrent_appends_not_lost() {
        let store = EntityHistoryStore::new();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.append_and_fetch(request("10.0.0.6", t * 50 + i), WindowLimits::default());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(Category::RequestVelocity, "10.0.0.6"), 400);
    }
}
