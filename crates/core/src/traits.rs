//! Storage collaborator contract
//!
//! This module defines the [`DocumentStore`] trait that the access layer is
//! built against. The trait models an ordered document store keyed by
//! collection name, supporting filtered finds with pagination, field-level
//! updates, an atomic update-with-upsert keyed by a compound filter, and
//! per-collection unique and TTL index declarations. Swapping the in-memory
//! implementation for a networked document database must not touch the
//! layers above.

use crate::error::Result;
use crate::query::{Filter, Page};
use crate::types::DomainId;
use serde_json::{Map, Value};
use std::time::Duration;

/// Ordered document store keyed by typed collection name
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync). The distributed lock protocol
/// depends on `update_with_upsert` honoring unique indexes atomically:
/// between the filter match and the write, no other writer may interleave.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id
    ///
    /// Returns None if the document does not exist or is expired.
    ///
    /// # Errors
    /// Returns an error if the storage operation fails.
    fn find_by_id(&self, collection: &str, id: DomainId) -> Result<Option<Value>>;

    /// Fetch documents for a set of ids in one round trip
    ///
    /// Missing and expired ids are simply absent from the result; order is
    /// unspecified (callers needing input order reassemble by id).
    ///
    /// # Errors
    /// Returns an error if the storage operation fails.
    fn find_by_ids(&self, collection: &str, ids: &[DomainId]) -> Result<Vec<Value>>;

    /// Find documents matching a filter, in stable id order
    ///
    /// # Errors
    /// Returns an error if the storage operation fails.
    fn find(&self, collection: &str, filter: &Filter, page: Page) -> Result<Vec<Value>>;

    /// List a collection in stable id order
    ///
    /// # Errors
    /// Returns an error if the storage operation fails.
    fn list(&self, collection: &str, page: Page) -> Result<Vec<Value>>;

    /// Insert a new document
    ///
    /// If the document carries no `id` field the store assigns one.
    /// Returns the document's id.
    ///
    /// # Errors
    /// - [`crate::Error::DuplicateKey`] if a unique index rejects the write
    /// - any storage failure
    fn insert(&self, collection: &str, doc: Value) -> Result<DomainId>;

    /// Update individual fields of an existing document
    ///
    /// This is a field-level merge, not a whole-document replace, so
    /// concurrent writers of unrelated fields do not clobber each other.
    /// Returns false if no document with the id exists.
    ///
    /// # Errors
    /// - [`crate::Error::DuplicateKey`] if a unique index rejects the write
    /// - any storage failure
    fn update_fields(
        &self,
        collection: &str,
        id: DomainId,
        fields: Map<String, Value>,
    ) -> Result<bool>;

    /// Atomically update the document matching `filter`, or insert one
    ///
    /// If a match exists its fields are refreshed from `fields`; otherwise a
    /// new document is built from the filter's equality conditions plus
    /// `fields` and inserted. The whole operation is atomic with respect to
    /// unique index checks. Returns the stored document.
    ///
    /// # Errors
    /// - [`crate::Error::DuplicateKey`] if the insert path violates a
    ///   unique index (the mutual-exclusion signal for lock contention)
    /// - any storage failure
    fn update_with_upsert(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Map<String, Value>,
    ) -> Result<Value>;

    /// Delete a document by id
    ///
    /// Returns true if a document was removed.
    ///
    /// # Errors
    /// Returns an error if the storage operation fails.
    fn delete(&self, collection: &str, id: DomainId) -> Result<bool>;

    /// Delete every document matching a filter
    ///
    /// Returns the number of documents removed.
    ///
    /// # Errors
    /// Returns an error if the storage operation fails.
    fn delete_where(&self, collection: &str, filter: &Filter) -> Result<usize>;

    /// Declare a unique index on a field of a collection
    ///
    /// Subsequent writes that would duplicate an existing value for the
    /// field are rejected with [`crate::Error::DuplicateKey`].
    ///
    /// # Errors
    /// Returns an error if existing documents already violate uniqueness.
    fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<()>;

    /// Declare a TTL index on a date field of a collection
    ///
    /// Documents whose `field` timestamp is older than `ttl` are expired by
    /// the store itself: invisible to reads and reaped on writes. The
    /// access layer never polls for expiry.
    ///
    /// # Errors
    /// Returns an error if the storage operation fails.
    fn ensure_ttl_index(&self, collection: &str, field: &str, ttl: Duration) -> Result<()>;
}
