//! TTL (Time-To-Live) index for efficient expiration cleanup
//!
//! This module provides TtlIndex that enables efficient queries for expired
//! documents without scanning the entire collection:
//! - Maps expiry_timestamp → Set<DomainId> using BTreeMap for sorted order
//! - find_expired() returns all ids expired at or before a given timestamp
//! - O(expired count) instead of O(total data)

use arbor_core::{DomainId, Timestamp};
use std::collections::{BTreeMap, HashSet};

/// TTL index: expiry_timestamp → document ids
///
/// Enables efficient cleanup of expired documents by maintaining a mapping
/// from expiry timestamps to sets of ids that expire at that time.
///
/// Uses BTreeMap for sorted ordering, allowing efficient range queries
/// for all ids expired at or before a given timestamp.
#[derive(Debug, Default)]
pub struct TtlIndex {
    /// Index mapping expiry timestamp to ids expiring at that time
    index: BTreeMap<Timestamp, HashSet<DomainId>>,
}

impl TtlIndex {
    /// Create a new empty TtlIndex
    pub fn new() -> Self {
        Self {
            index: BTreeMap::new(),
        }
    }

    /// Add an id to the index with the given expiry timestamp
    pub fn insert(&mut self, expiry: Timestamp, id: DomainId) {
        self.index.entry(expiry).or_default().insert(id);
    }

    /// Remove an id from the index at the given expiry timestamp
    ///
    /// Used when a document is deleted or its date field is refreshed.
    /// If the set becomes empty, removes the timestamp entry entirely.
    pub fn remove(&mut self, expiry: Timestamp, id: DomainId) {
        if let Some(ids) = self.index.get_mut(&expiry) {
            ids.remove(&id);
            if ids.is_empty() {
                self.index.remove(&expiry);
            }
        }
    }

    /// Find all ids that have expired at or before the given timestamp
    ///
    /// This is O(expired count) not O(total data) because we use a
    /// BTreeMap range query to only scan expired entries.
    pub fn find_expired(&self, now: Timestamp) -> Vec<DomainId> {
        self.index
            .range(..=now)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Drop all entries expired at or before the given timestamp
    ///
    /// Returns the number of ids removed.
    pub fn remove_expired(&mut self, now: Timestamp) -> usize {
        let expired: Vec<Timestamp> = self.index.range(..=now).map(|(ts, _)| *ts).collect();

        let mut count = 0;
        for ts in expired {
            if let Some(ids) = self.index.remove(&ts) {
                count += ids.len();
            }
        }
        count
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.index.clear();
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Get the total number of ids in the index
    pub fn len(&self) -> usize {
        self.index.values().map(|ids| ids.len()).sum()
    }
}
