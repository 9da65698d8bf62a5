//! arbordb - Permission-aware domain object store
//!
//! Persistence and domain-modeling layer for imaging pipeline metadata:
//! richly typed domain objects in a document store, layered with per-object
//! access control, reference-based relationships across collections,
//! distributed time-boxed locking for concurrent pipeline processing, and
//! ordered term-tree editing for ontologies.
//!
//! # Quick Start
//!
//! ```
//! use arbordb::{in_memory, DomainDocument, DomainType, SubjectKey};
//!
//! let access = in_memory().unwrap();
//! let alice = SubjectKey::user("alice");
//!
//! // Create a sample owned by alice
//! let sample = DomainDocument::new(DomainType::Sample, "GMR_57C10", alice.clone());
//! let saved = access.save(&alice, sample).unwrap().unwrap();
//!
//! // Fetch it back through the permission-checked facade
//! let fetched = access.get_object(&alice, &saved.reference()).unwrap();
//! assert!(fetched.is_some());
//! ```
//!
//! # Architecture
//!
//! All operations go through [`DomainAccess`], which composes the
//! permission evaluator, reference resolver, distributed lock manager, and
//! ordered-tree mutator over a [`DocumentStore`] backend. The in-memory
//! backend lives in `arbor-storage`; swapping in a networked document
//! database means implementing the same trait.

pub use arbor_access::{
    has_read_access, has_read_access_any, has_write_access, has_write_access_any, DomainAccess,
    LockManager, ObjectLock, ReferenceResolver, TermNode, TreeMutator, LOCK_COLLECTION,
    LOCK_RETRY_INTERVAL, LOCK_TTL, TERMS_FIELD,
};
pub use arbor_core::{
    DocumentStore, DomainDocument, DomainId, DomainType, Error, Filter, IdGenerator, Page,
    Reference, Result, ReverseReference, SubjectKey, TimebasedIdGenerator, Timestamp,
    ENVELOPE_FIELDS,
};
pub use arbor_storage::MemoryDocumentStore;

use std::sync::Arc;

/// Build a facade over a fresh in-memory store
///
/// Wires a time-based id generator and the in-memory backend into a
/// [`DomainAccess`] facade, declaring the lock collection's indexes.
///
/// # Errors
/// Propagates storage failures from the index declarations.
pub fn in_memory() -> Result<DomainAccess> {
    let ids: Arc<dyn IdGenerator> = Arc::new(TimebasedIdGenerator::new());
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new(ids.clone()));
    DomainAccess::new(store, ids)
}
