//! End-to-end distributed locking through the public facade
//!
//! Plays out the pipeline flow: workers locking samples for exclusive
//! processing, contention between owner/task triples, release and handoff,
//! and zipping locks back to their targets.

use std::time::Duration;

use arbordb::{
    in_memory, DomainDocument, DomainId, DomainType, Page, Reference, ReverseReference,
    SubjectKey,
};
use serde_json::json;

#[test]
fn test_lock_contend_release_relock() {
    let access = in_memory().unwrap();
    let owner_x = SubjectKey::user("workerX");
    let owner_y = SubjectKey::user("workerY");

    let sample = access
        .save(
            &owner_x,
            DomainDocument::new(DomainType::Sample, "GMR_57C10", owner_x.clone()),
        )
        .unwrap()
        .unwrap();
    let sample_ref = sample.reference();

    // X takes the lock for task 1.
    let held = access
        .locks()
        .lock(&owner_x, &sample_ref, 1, "stitching", Duration::ZERO)
        .unwrap();
    assert!(held.is_some());

    // Y's immediate attempt for task 2 fails after its own bounded retry.
    let denied = access
        .locks()
        .lock(&owner_y, &sample_ref, 2, "alignment", Duration::ZERO)
        .unwrap();
    assert!(denied.is_none());

    // X releases; Y now succeeds.
    assert!(access.locks().unlock(&owner_x, &sample_ref, 1).unwrap());
    let acquired = access
        .locks()
        .lock(&owner_y, &sample_ref, 2, "alignment", Duration::ZERO)
        .unwrap();
    assert!(acquired.is_some());
    assert_eq!(acquired.unwrap().owner_key, owner_y);
}

#[test]
fn test_reentrant_lock_during_long_pipeline_step() {
    let access = in_memory().unwrap();
    let worker = SubjectKey::user("workerX");
    let target = Reference::new(DomainType::Sample, DomainId::new(42));

    let first = access
        .locks()
        .lock(&worker, &target, 9, "step 1", Duration::ZERO)
        .unwrap()
        .unwrap();
    let second = access
        .locks()
        .lock(&worker, &target, 9, "step 2", Duration::ZERO)
        .unwrap()
        .unwrap();

    assert_eq!(first.target, second.target);
    assert_eq!(first.id, second.id);
    assert_eq!(second.description, "step 2");
}

#[test]
fn test_unlock_is_scoped_to_the_exact_triple() {
    let access = in_memory().unwrap();
    let owner_a = SubjectKey::user("workerA");
    let owner_b = SubjectKey::user("workerB");
    let target = Reference::new(DomainType::Sample, DomainId::new(7));

    access
        .locks()
        .lock(&owner_a, &target, 1, "", Duration::ZERO)
        .unwrap()
        .unwrap();

    assert!(!access.locks().unlock(&owner_b, &target, 1).unwrap());
    assert!(!access.locks().unlock(&owner_a, &target, 9).unwrap());
    assert!(access.locks().unlock(&owner_a, &target, 1).unwrap());
    assert!(!access.locks().unlock(&owner_a, &target, 1).unwrap());
}

#[test]
fn test_zip_locks_back_to_samples() {
    let access = in_memory().unwrap();
    let worker = SubjectKey::user("workerX");

    let data_set = access
        .save(
            &worker,
            DomainDocument::new(DomainType::DataSet, "split_gal4", worker.clone()),
        )
        .unwrap()
        .unwrap();

    let mut locked = Vec::new();
    for i in 0..3u64 {
        let mut sample =
            DomainDocument::new(DomainType::Sample, format!("s{i}"), worker.clone());
        sample.set_attribute("data_set_id", json!(data_set.id.as_u64()));
        let saved = access.save(&worker, sample).unwrap().unwrap();
        let lock = access
            .locks()
            .lock(&worker, &saved.reference(), i, "processing", Duration::ZERO)
            .unwrap()
            .unwrap();
        locked.push(lock);
    }

    // Order-preserving: lock[i] zips to its own sample.
    let targets = access.locks().resolve_targets(&worker, &locked).unwrap();
    assert_eq!(targets.len(), 3);
    for (lock, target) in locked.iter().zip(&targets) {
        let doc = target.as_ref().unwrap();
        assert_eq!(doc.reference(), lock.target);
    }

    // And the data set's membership is queryable while locked.
    let reverse = ReverseReference::new(DomainType::Sample, "data_set_id", data_set.id);
    let members = access.find_referencing(&worker, &reverse, Page::ALL).unwrap();
    assert_eq!(members.len(), 3);
}
