//! Distributed object locking
//!
//! Time-boxed, owner+task-scoped exclusive locks on a referenced object,
//! backed by a dedicated lock collection with a unique index on the target
//! field. Correctness rests entirely on the store's atomic
//! update-with-upsert plus that unique index; no in-process mutex is ever
//! taken, because mutual exclusion must hold across process and machine
//! boundaries (multiple pipeline workers).
//!
//! State machine per (owner, task, target) triple:
//! Unlocked → Locked → Unlocked, with a passive Expired transition driven
//! by the storage TTL index (12 hours from the creation date), not by
//! application polling.

use crate::permission::has_read_access;
use arbor_core::{
    DocumentStore, DomainDocument, DomainId, Error, Filter, Page, Reference, Result, SubjectKey,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Collection holding active lock records
pub const LOCK_COLLECTION: &str = "objectLock";

/// Field the unique index is declared on
pub const LOCK_TARGET_FIELD: &str = "target";

/// Time-to-live of a lock record, measured from its creation date
pub const LOCK_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Fixed backoff between contended lock attempts
pub const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// A live lock record
///
/// At most one unexpired record exists per target at any time; the record
/// is refreshed in place when the identical (owner, task, target) triple
/// re-locks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLock {
    /// Record id in the lock collection
    pub id: DomainId,
    /// Subject holding the lock
    pub owner_key: SubjectKey,
    /// Pipeline task the lock is scoped to
    pub task_id: u64,
    /// The locked object, string-encoded in storage
    pub target: Reference,
    /// Human-readable purpose of the lock
    #[serde(default)]
    pub description: String,
    /// When the lock was acquired or last refreshed
    pub creation_date: Timestamp,
}

/// Acquires, renews, and releases distributed locks
pub struct LockManager {
    store: Arc<dyn DocumentStore>,
}

impl LockManager {
    /// Create a lock manager, declaring the lock collection's indexes
    ///
    /// # Errors
    /// Propagates storage failures from the index declarations.
    pub fn new(store: Arc<dyn DocumentStore>) -> Result<Self> {
        store.ensure_unique_index(LOCK_COLLECTION, LOCK_TARGET_FIELD)?;
        store.ensure_ttl_index(LOCK_COLLECTION, "creation_date", LOCK_TTL)?;
        Ok(LockManager { store })
    }

    fn triple_filter(subject: &SubjectKey, target: &Reference, task_id: u64) -> Filter {
        Filter::eq("owner_key", Value::from(subject.as_str()))
            .and_eq("task_id", Value::from(task_id))
            .and_eq(LOCK_TARGET_FIELD, Value::from(target.to_string()))
    }

    /// Acquire (or re-enter) a lock on `target`
    ///
    /// The upsert is keyed on the full (owner, task, target) triple: if a
    /// record with that exact triple exists its creation date and
    /// description are refreshed, so the identical triple may re-lock
    /// freely. A record for the same target under a different triple makes
    /// the unique index reject the write; the call then retries every
    /// 500 ms until it succeeds or `timeout` elapses, returning None on
    /// timeout. Callers must check for None; contention is not an error.
    ///
    /// On success the stored record is re-fetched before returning: the
    /// upsert can race with TTL expiry, and a confirm read that comes back
    /// empty is reported as None after a warning.
    ///
    /// # Errors
    /// Storage failures propagate; contention and timeout do not.
    pub fn lock(
        &self,
        subject: &SubjectKey,
        target: &Reference,
        task_id: u64,
        description: &str,
        timeout: Duration,
    ) -> Result<Option<ObjectLock>> {
        let deadline = Instant::now() + timeout;
        let filter = Self::triple_filter(subject, target, task_id);

        loop {
            let mut fields = Map::new();
            fields.insert("description".to_string(), Value::from(description));
            fields.insert(
                "creation_date".to_string(),
                Value::from(Timestamp::now().as_micros()),
            );

            match self.store.update_with_upsert(LOCK_COLLECTION, &filter, fields) {
                Ok(_) => {
                    let stored = self.store.find(LOCK_COLLECTION, &filter, Page::ALL)?;
                    return match stored.into_iter().next() {
                        Some(value) => {
                            let lock: ObjectLock = serde_json::from_value(value)?;
                            debug!(%target, owner = %subject, task_id, "lock acquired");
                            Ok(Some(lock))
                        }
                        None => {
                            warn!(
                                %target,
                                owner = %subject,
                                task_id,
                                "lock upsert succeeded but confirm read found no record"
                            );
                            Ok(None)
                        }
                    };
                }
                Err(Error::DuplicateKey { .. }) => {
                    if Instant::now() >= deadline {
                        debug!(%target, owner = %subject, task_id, "lock attempt timed out");
                        return Ok(None);
                    }
                    debug!(%target, owner = %subject, task_id, "lock contended, retrying");
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Release a lock held by the exact (owner, task, target) triple
    ///
    /// Returns true only if exactly one record was removed. Unlocking a
    /// lock held by a different subject or task, or one that no longer
    /// exists (already unlocked or expired), returns false; that is a
    /// normal outcome, not an error.
    ///
    /// # Errors
    /// Storage failures propagate.
    pub fn unlock(&self, subject: &SubjectKey, target: &Reference, task_id: u64) -> Result<bool> {
        let filter = Self::triple_filter(subject, target, task_id);
        let removed = self.store.delete_where(LOCK_COLLECTION, &filter)?;
        debug!(%target, owner = %subject, task_id, removed, "unlock");
        Ok(removed == 1)
    }

    /// Inspect the current lock on a target, if any
    ///
    /// # Errors
    /// Storage failures propagate.
    pub fn find_lock(&self, target: &Reference) -> Result<Option<ObjectLock>> {
        let filter = Filter::eq(LOCK_TARGET_FIELD, Value::from(target.to_string()));
        let stored = self.store.find(LOCK_COLLECTION, &filter, Page::ALL)?;
        match stored.into_iter().next() {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Resolve the locked objects for a list of locks, permission-filtered
    ///
    /// Convenience for pipeline dashboards: slot `i` of the result is the
    /// target of `locks[i]`, or None when it vanished or the subject lacks
    /// read access.
    ///
    /// # Errors
    /// Storage failures and data-integrity violations propagate.
    pub fn resolve_targets(
        &self,
        subject: &SubjectKey,
        locks: &[ObjectLock],
    ) -> Result<Vec<Option<DomainDocument>>> {
        let mut results = Vec::with_capacity(locks.len());
        for lock in locks {
            let found = self
                .store
                .find_by_id(lock.target.collection(), lock.target.target_id())?;
            let slot = match found {
                Some(value) => {
                    let doc = DomainDocument::from_value(value)?;
                    has_read_access(&doc, subject)?.then_some(doc)
                }
                None => None,
            };
            results.push(slot);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{DomainId, DomainType, TimebasedIdGenerator};
    use arbor_storage::MemoryDocumentStore;

    fn setup() -> (Arc<MemoryDocumentStore>, LockManager) {
        let store = Arc::new(MemoryDocumentStore::new(Arc::new(
            TimebasedIdGenerator::new(),
        )));
        let locks = LockManager::new(store.clone()).unwrap();
        (store, locks)
    }

    fn sample_ref(id: u64) -> Reference {
        Reference::new(DomainType::Sample, DomainId::new(id))
    }

    #[test]
    fn test_lock_acquire_and_record_fields() {
        let (_, locks) = setup();
        let alice = SubjectKey::user("alice");
        let target = sample_ref(1);

        let lock = locks
            .lock(&alice, &target, 7, "align tiles", Duration::ZERO)
            .unwrap()
            .unwrap();
        assert_eq!(lock.owner_key, alice);
        assert_eq!(lock.task_id, 7);
        assert_eq!(lock.target, target);
        assert_eq!(lock.description, "align tiles");
        assert!(lock.id.is_assigned());
    }

    #[test]
    fn test_lock_is_reentrant_for_identical_triple() {
        let (_, locks) = setup();
        let alice = SubjectKey::user("alice");
        let target = sample_ref(1);

        let first = locks
            .lock(&alice, &target, 7, "step one", Duration::ZERO)
            .unwrap()
            .unwrap();
        let second = locks
            .lock(&alice, &target, 7, "step two", Duration::ZERO)
            .unwrap()
            .unwrap();

        // Same record, refreshed in place.
        assert_eq!(first.id, second.id);
        assert_eq!(first.target, second.target);
        assert_eq!(second.description, "step two");
        assert!(second.creation_date >= first.creation_date);
    }

    #[test]
    fn test_lock_mutual_exclusion_and_timeout() {
        let (_, locks) = setup();
        let alice = SubjectKey::user("alice");
        let bob = SubjectKey::user("bob");
        let target = sample_ref(1);

        assert!(locks
            .lock(&alice, &target, 1, "", Duration::ZERO)
            .unwrap()
            .is_some());

        // Different owner: rejected without error after a bounded retry.
        assert!(locks
            .lock(&bob, &target, 2, "", Duration::ZERO)
            .unwrap()
            .is_none());

        // Same owner, different task: also a different triple, also rejected.
        assert!(locks
            .lock(&alice, &target, 2, "", Duration::ZERO)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unlock_authorization() {
        let (_, locks) = setup();
        let alice = SubjectKey::user("alice");
        let bob = SubjectKey::user("bob");
        let target = sample_ref(1);

        locks.lock(&alice, &target, 1, "", Duration::ZERO).unwrap().unwrap();

        // Foreign owner or task cannot release.
        assert!(!locks.unlock(&bob, &target, 1).unwrap());
        assert!(!locks.unlock(&alice, &target, 2).unwrap());

        // The exact triple releases once.
        assert!(locks.unlock(&alice, &target, 1).unwrap());
        assert!(!locks.unlock(&alice, &target, 1).unwrap());
    }

    #[test]
    fn test_lock_succeeds_after_release() {
        let (_, locks) = setup();
        let alice = SubjectKey::user("alice");
        let bob = SubjectKey::user("bob");
        let target = sample_ref(1);

        locks.lock(&alice, &target, 1, "", Duration::ZERO).unwrap().unwrap();
        assert!(locks.lock(&bob, &target, 2, "", Duration::ZERO).unwrap().is_none());

        assert!(locks.unlock(&alice, &target, 1).unwrap());
        assert!(locks.lock(&bob, &target, 2, "", Duration::ZERO).unwrap().is_some());
    }

    #[test]
    fn test_locks_on_distinct_targets_are_independent() {
        let (_, locks) = setup();
        let alice = SubjectKey::user("alice");
        let bob = SubjectKey::user("bob");

        assert!(locks
            .lock(&alice, &sample_ref(1), 1, "", Duration::ZERO)
            .unwrap()
            .is_some());
        assert!(locks
            .lock(&bob, &sample_ref(2), 2, "", Duration::ZERO)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_find_lock() {
        let (_, locks) = setup();
        let alice = SubjectKey::user("alice");
        let target = sample_ref(1);

        assert!(locks.find_lock(&target).unwrap().is_none());
        locks.lock(&alice, &target, 1, "", Duration::ZERO).unwrap().unwrap();
        let held = locks.find_lock(&target).unwrap().unwrap();
        assert_eq!(held.owner_key, alice);
    }

    #[test]
    fn test_resolve_targets_preserves_order() {
        let (store, locks) = setup();
        let alice = SubjectKey::user("alice");

        let mut doc = DomainDocument::new(DomainType::Sample, "s1", alice.clone());
        doc.id = DomainId::new(1);
        store.insert("sample", doc.to_value().unwrap()).unwrap();

        let held = locks
            .lock(&alice, &sample_ref(1), 1, "", Duration::ZERO)
            .unwrap()
            .unwrap();
        let orphan = locks
            .lock(&alice, &sample_ref(99), 2, "", Duration::ZERO)
            .unwrap()
            .unwrap();

        let targets = locks.resolve_targets(&alice, &[orphan, held]).unwrap();
        assert!(targets[0].is_none());
        assert_eq!(targets[1].as_ref().unwrap().name, "s1");
    }
}
