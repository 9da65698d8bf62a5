//! A single document collection
//!
//! Documents are JSON objects keyed by their numeric `id` field in an
//! ordered BTreeMap, so scans are stable in id order (roughly
//! chronological, since ids are time-based). Each collection maintains its
//! unique indexes and TTL bookkeeping inside the same mutation path as the
//! data itself; the store wraps every mutation in one write lock, so index
//! state never diverges from document state.
//!
//! TTL expiration is logical: expired documents are invisible to reads and
//! reaped at the start of every write (`purge_expired`), rather than by a
//! background thread.

use crate::ttl::TtlIndex;
use arbor_core::{DomainId, Error, Filter, Result, Timestamp};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Unique index over one document field
///
/// Entries map the canonical JSON rendering of the field value to the id of
/// the document holding it.
#[derive(Debug)]
struct UniqueIndex {
    field: String,
    entries: HashMap<String, DomainId>,
}

/// TTL declaration for a collection: date field plus time-to-live
#[derive(Debug, Clone)]
struct TtlSpec {
    field: String,
    ttl: Duration,
}

/// Extract the id field of a raw document
pub(crate) fn doc_id(doc: &Value) -> Option<DomainId> {
    doc.get("id").and_then(Value::as_u64).map(DomainId::new)
}

/// Canonical index key for a field value
fn index_key(value: &Value) -> String {
    value.to_string()
}

/// One collection: ordered documents plus index state
#[derive(Debug, Default)]
pub(crate) struct Collection {
    docs: BTreeMap<DomainId, Value>,
    unique: Vec<UniqueIndex>,
    ttl: Option<TtlSpec>,
    ttl_index: TtlIndex,
}

impl Collection {
    pub(crate) fn new() -> Self {
        Collection::default()
    }

    /// Expiry timestamp of a document under the current TTL spec
    fn expiry_of(&self, doc: &Value) -> Option<Timestamp> {
        let spec = self.ttl.as_ref()?;
        let stamp = doc.get(&spec.field)?.as_u64()?;
        Some(Timestamp::from_micros(stamp).saturating_add(spec.ttl))
    }

    fn is_expired(&self, doc: &Value, now: Timestamp) -> bool {
        matches!(self.expiry_of(doc), Some(expiry) if expiry <= now)
    }

    /// Reap every document expired at or before `now`
    ///
    /// Called at the start of every mutation so that, for example, an
    /// expired lock no longer occupies its unique index slot when a new
    /// holder races to claim it.
    pub(crate) fn purge_expired(&mut self, now: Timestamp) -> usize {
        let expired = self.ttl_index.find_expired(now);
        let count = expired.len();
        for id in expired {
            self.remove(id);
        }
        count
    }

    fn index_doc(&mut self, id: DomainId, doc: &Value) {
        for index in &mut self.unique {
            if let Some(value) = doc.get(&index.field) {
                index.entries.insert(index_key(value), id);
            }
        }
        if let Some(expiry) = self.expiry_of(doc) {
            self.ttl_index.insert(expiry, id);
        }
    }

    fn unindex_doc(&mut self, id: DomainId, doc: &Value) {
        for index in &mut self.unique {
            if let Some(value) = doc.get(&index.field) {
                let key = index_key(value);
                if index.entries.get(&key) == Some(&id) {
                    index.entries.remove(&key);
                }
            }
        }
        if let Some(expiry) = self.expiry_of(doc) {
            self.ttl_index.remove(expiry, id);
        }
    }

    /// First unique-index violation `doc` would cause, ignoring `exempt`
    fn unique_violation(&self, doc: &Value, exempt: DomainId) -> Option<(&str, String)> {
        for index in &self.unique {
            if let Some(value) = doc.get(&index.field) {
                let key = index_key(value);
                if let Some(&holder) = index.entries.get(&key) {
                    if holder != exempt {
                        return Some((&index.field, key));
                    }
                }
            }
        }
        None
    }

    pub(crate) fn get(&self, id: DomainId, now: Timestamp) -> Option<Value> {
        self.docs
            .get(&id)
            .filter(|doc| !self.is_expired(doc, now))
            .cloned()
    }

    /// Insert a new document under `id`
    pub(crate) fn insert(&mut self, name: &str, id: DomainId, doc: Value) -> Result<()> {
        if self.docs.contains_key(&id) {
            return Err(Error::Storage(format!(
                "collection {name} already contains id {id}"
            )));
        }
        if let Some((field, value)) = self.unique_violation(&doc, id) {
            return Err(Error::DuplicateKey {
                collection: name.to_string(),
                field: field.to_string(),
                value,
            });
        }
        self.index_doc(id, &doc);
        self.docs.insert(id, doc);
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: DomainId) -> Option<Value> {
        let doc = self.docs.remove(&id)?;
        self.unindex_doc(id, &doc);
        Some(doc)
    }

    /// Merge `fields` into the document with the given id
    ///
    /// Returns the merged document, or None if the id is absent.
    pub(crate) fn apply_fields(
        &mut self,
        name: &str,
        id: DomainId,
        fields: &Map<String, Value>,
    ) -> Result<Option<Value>> {
        let Some(current) = self.docs.get(&id).cloned() else {
            return Ok(None);
        };
        let mut merged = current.clone();
        if let Some(target) = merged.as_object_mut() {
            for (field, value) in fields {
                target.insert(field.clone(), value.clone());
            }
        } else {
            return Err(Error::Storage(format!(
                "collection {name} document {id} is not an object"
            )));
        }
        if let Some((field, value)) = self.unique_violation(&merged, id) {
            return Err(Error::DuplicateKey {
                collection: name.to_string(),
                field: field.to_string(),
                value,
            });
        }
        self.unindex_doc(id, &current);
        self.index_doc(id, &merged);
        self.docs.insert(id, merged.clone());
        Ok(Some(merged))
    }

    /// All unexpired documents matching `filter`, in id order
    pub(crate) fn find(&self, filter: &Filter, now: Timestamp) -> Vec<Value> {
        self.docs
            .values()
            .filter(|doc| !self.is_expired(doc, now) && filter.matches(doc))
            .cloned()
            .collect()
    }

    /// Id of the first unexpired document matching `filter`
    pub(crate) fn find_first_id(&self, filter: &Filter, now: Timestamp) -> Option<DomainId> {
        self.docs
            .iter()
            .find(|(_, doc)| !self.is_expired(doc, now) && filter.matches(doc))
            .map(|(id, _)| *id)
    }

    /// Declare a unique index on `field`, indexing existing documents
    pub(crate) fn ensure_unique(&mut self, name: &str, field: &str) -> Result<()> {
        if self.unique.iter().any(|index| index.field == field) {
            return Ok(());
        }
        let mut entries = HashMap::new();
        for (&id, doc) in &self.docs {
            if let Some(value) = doc.get(field) {
                let key = index_key(value);
                if entries.insert(key.clone(), id).is_some() {
                    return Err(Error::DuplicateKey {
                        collection: name.to_string(),
                        field: field.to_string(),
                        value: key,
                    });
                }
            }
        }
        self.unique.push(UniqueIndex {
            field: field.to_string(),
            entries,
        });
        Ok(())
    }

    /// Declare (or redeclare) the TTL index on `field`
    pub(crate) fn ensure_ttl(&mut self, field: &str, ttl: Duration) {
        self.ttl = Some(TtlSpec {
            field: field.to_string(),
            ttl,
        });
        self.ttl_index.clear();
        let entries: Vec<(DomainId, Timestamp)> = self
            .docs
            .iter()
            .filter_map(|(&id, doc)| self.expiry_of(doc).map(|expiry| (id, expiry)))
            .collect();
        for (id, expiry) in entries {
            self.ttl_index.insert(expiry, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: u64, target: &str) -> Value {
        json!({"id": id, "target": target, "creation_date": 1_000_000})
    }

    #[test]
    fn test_insert_and_get() {
        let mut col = Collection::new();
        col.insert("c", DomainId::new(1), doc(1, "Sample#1")).unwrap();
        assert!(col.get(DomainId::new(1), Timestamp::now()).is_some());
        assert!(col.get(DomainId::new(2), Timestamp::now()).is_none());
    }

    #[test]
    fn test_insert_duplicate_id_is_storage_error() {
        let mut col = Collection::new();
        col.insert("c", DomainId::new(1), doc(1, "a")).unwrap();
        let err = col.insert("c", DomainId::new(1), doc(1, "b")).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_unique_index_rejects_second_holder() {
        let mut col = Collection::new();
        col.ensure_unique("c", "target").unwrap();
        col.insert("c", DomainId::new(1), doc(1, "Sample#9")).unwrap();

        let err = col
            .insert("c", DomainId::new(2), doc(2, "Sample#9"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));

        // A different value is fine.
        col.insert("c", DomainId::new(3), doc(3, "Sample#10")).unwrap();
    }

    #[test]
    fn test_unique_index_frees_slot_on_remove() {
        let mut col = Collection::new();
        col.ensure_unique("c", "target").unwrap();
        col.insert("c", DomainId::new(1), doc(1, "Sample#9")).unwrap();
        col.remove(DomainId::new(1));
        col.insert("c", DomainId::new(2), doc(2, "Sample#9")).unwrap();
    }

    #[test]
    fn test_ensure_unique_fails_on_existing_duplicates() {
        let mut col = Collection::new();
        col.insert("c", DomainId::new(1), doc(1, "x")).unwrap();
        col.insert("c", DomainId::new(2), doc(2, "x")).unwrap();
        let err = col.ensure_unique("c", "target").unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
    }

    #[test]
    fn test_apply_fields_merges_and_reindexes() {
        let mut col = Collection::new();
        col.ensure_unique("c", "target").unwrap();
        col.insert("c", DomainId::new(1), doc(1, "Sample#9")).unwrap();

        let mut fields = Map::new();
        fields.insert("target".to_string(), json!("Sample#10"));
        fields.insert("description".to_string(), json!("moved"));
        let merged = col.apply_fields("c", DomainId::new(1), &fields).unwrap().unwrap();
        assert_eq!(merged["target"], json!("Sample#10"));
        assert_eq!(merged["description"], json!("moved"));

        // The old slot is free, the new one occupied.
        col.insert("c", DomainId::new(2), doc(2, "Sample#9")).unwrap();
        let err = col.insert("c", DomainId::new(3), doc(3, "Sample#10")).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
    }

    #[test]
    fn test_apply_fields_missing_id() {
        let mut col = Collection::new();
        let fields = Map::new();
        assert!(col.apply_fields("c", DomainId::new(9), &fields).unwrap().is_none());
    }

    #[test]
    fn test_ttl_expiry_is_logical() {
        let mut col = Collection::new();
        col.ensure_ttl("creation_date", Duration::from_secs(10));
        // creation_date = 1s; expires at 11s.
        col.insert("c", DomainId::new(1), doc(1, "a")).unwrap();

        let before = Timestamp::from_secs(5);
        let after = Timestamp::from_secs(12);
        assert!(col.get(DomainId::new(1), before).is_some());
        assert!(col.get(DomainId::new(1), after).is_none());
        assert!(col.find(&Filter::new(), after).is_empty());

        // Still physically present until a write purges it.
        assert_eq!(col.purge_expired(after), 1);
        assert_eq!(col.purge_expired(after), 0);
    }

    #[test]
    fn test_purge_frees_unique_slot_of_expired_doc() {
        let mut col = Collection::new();
        col.ensure_unique("c", "target").unwrap();
        col.ensure_ttl("creation_date", Duration::from_secs(10));
        col.insert("c", DomainId::new(1), doc(1, "Sample#9")).unwrap();

        let after = Timestamp::from_secs(12);
        col.purge_expired(after);
        col.insert("c", DomainId::new(2), doc(2, "Sample#9")).unwrap();
    }

    #[test]
    fn test_find_is_in_id_order() {
        let mut col = Collection::new();
        for id in [5u64, 1, 3] {
            col.insert("c", DomainId::new(id), doc(id, &format!("t{id}"))).unwrap();
        }
        let found = col.find(&Filter::new(), Timestamp::now());
        let ids: Vec<u64> = found.iter().map(|d| d["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn test_find_first_id_respects_filter() {
        let mut col = Collection::new();
        col.insert("c", DomainId::new(1), doc(1, "a")).unwrap();
        col.insert("c", DomainId::new(2), doc(2, "b")).unwrap();
        let first = col.find_first_id(&Filter::eq("target", json!("b")), Timestamp::now());
        assert_eq!(first, Some(DomainId::new(2)));
        assert_eq!(
            col.find_first_id(&Filter::eq("target", json!("zzz")), Timestamp::now()),
            None
        );
    }
}
