//! In-memory DocumentStore backend
//!
//! This module implements the DocumentStore trait using:
//! - `DashMap<String, Arc<RwLock<Collection>>>` for the collection map
//! - `parking_lot::RwLock` per collection for thread-safe access
//!
//! Every mutation of a collection (document write, unique index, TTL index)
//! happens inside that collection's single write lock, which is what makes
//! `update_with_upsert` the atomic primitive the distributed lock protocol
//! requires: between the filter match and the write no other writer can
//! interleave.
//!
//! Collections are created implicitly on first use, like a document
//! database; a read against a collection nothing has written to simply
//! returns nothing.

use crate::collection::{doc_id, Collection};
use arbor_core::{
    DocumentStore, DomainId, Error, Filter, IdGenerator, Page, Result, Timestamp,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// In-memory document store
///
/// Thread-safe through per-collection `parking_lot::RwLock`s behind a
/// `DashMap`. Ids for documents inserted without one are drawn from the
/// shared time-based generator.
pub struct MemoryDocumentStore {
    collections: DashMap<String, Arc<RwLock<Collection>>>,
    ids: Arc<dyn IdGenerator>,
}

impl MemoryDocumentStore {
    /// Create an empty store drawing ids from `ids`
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        MemoryDocumentStore {
            collections: DashMap::new(),
            ids,
        }
    }

    fn handle(&self, collection: &str) -> Arc<RwLock<Collection>> {
        self.collections
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Collection::new())))
            .clone()
    }

    /// Stamp an id onto a document, drawing a fresh one if absent
    fn stamp_id(&self, collection: &str, doc: &mut Value) -> Result<DomainId> {
        let fields = doc.as_object_mut().ok_or_else(|| {
            Error::Storage(format!("collection {collection}: document is not an object"))
        })?;
        match fields.get("id").and_then(Value::as_u64) {
            Some(raw) => Ok(DomainId::new(raw)),
            None => {
                let id = self.ids.next_id();
                fields.insert("id".to_string(), Value::from(id.as_u64()));
                Ok(id)
            }
        }
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn find_by_id(&self, collection: &str, id: DomainId) -> Result<Option<Value>> {
        let handle = self.handle(collection);
        let col = handle.read();
        Ok(col.get(id, Timestamp::now()))
    }

    fn find_by_ids(&self, collection: &str, ids: &[DomainId]) -> Result<Vec<Value>> {
        let handle = self.handle(collection);
        let col = handle.read();
        let now = Timestamp::now();
        Ok(ids.iter().filter_map(|&id| col.get(id, now)).collect())
    }

    fn find(&self, collection: &str, filter: &Filter, page: Page) -> Result<Vec<Value>> {
        let handle = self.handle(collection);
        let col = handle.read();
        Ok(page.apply(col.find(filter, Timestamp::now())))
    }

    fn list(&self, collection: &str, page: Page) -> Result<Vec<Value>> {
        self.find(collection, &Filter::new(), page)
    }

    fn insert(&self, collection: &str, mut doc: Value) -> Result<DomainId> {
        let id = self.stamp_id(collection, &mut doc)?;
        let handle = self.handle(collection);
        let mut col = handle.write();
        col.purge_expired(Timestamp::now());
        col.insert(collection, id, doc)?;
        Ok(id)
    }

    fn update_fields(
        &self,
        collection: &str,
        id: DomainId,
        fields: Map<String, Value>,
    ) -> Result<bool> {
        let handle = self.handle(collection);
        let mut col = handle.write();
        col.purge_expired(Timestamp::now());
        Ok(col.apply_fields(collection, id, &fields)?.is_some())
    }

    fn update_with_upsert(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Map<String, Value>,
    ) -> Result<Value> {
        let handle = self.handle(collection);
        let mut col = handle.write();
        let now = Timestamp::now();
        col.purge_expired(now);

        if let Some(id) = col.find_first_id(filter, now) {
            let merged = col
                .apply_fields(collection, id, &fields)?
                .ok_or_else(|| Error::Storage(format!("{collection}: matched id {id} vanished")))?;
            debug!(collection, %id, "upsert refreshed existing document");
            return Ok(merged);
        }

        // No match: build a new document from the filter's equality
        // conditions plus the update fields.
        let mut doc = Map::new();
        for (field, value) in filter.conditions() {
            doc.insert(field.clone(), value.clone());
        }
        for (field, value) in fields {
            doc.insert(field, value);
        }
        let mut doc = Value::Object(doc);
        let id = self.stamp_id(collection, &mut doc)?;
        col.insert(collection, id, doc.clone())?;
        debug!(collection, %id, "upsert inserted new document");
        Ok(doc)
    }

    fn delete(&self, collection: &str, id: DomainId) -> Result<bool> {
        let handle = self.handle(collection);
        let mut col = handle.write();
        col.purge_expired(Timestamp::now());
        Ok(col.remove(id).is_some())
    }

    fn delete_where(&self, collection: &str, filter: &Filter) -> Result<usize> {
        let handle = self.handle(collection);
        let mut col = handle.write();
        let now = Timestamp::now();
        col.purge_expired(now);
        let matching: Vec<DomainId> = col
            .find(filter, now)
            .iter()
            .filter_map(doc_id)
            .collect();
        let mut removed = 0;
        for id in matching {
            if col.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<()> {
        let handle = self.handle(collection);
        let mut col = handle.write();
        col.purge_expired(Timestamp::now());
        col.ensure_unique(collection, field)?;
        info!(collection, field, "declared unique index");
        Ok(())
    }

    fn ensure_ttl_index(&self, collection: &str, field: &str, ttl: Duration) -> Result<()> {
        let handle = self.handle(collection);
        let mut col = handle.write();
        col.ensure_ttl(field, ttl);
        info!(collection, field, ttl_secs = ttl.as_secs(), "declared TTL index");
        Ok(())
    }
}
