//! Top-level domain access facade
//!
//! Composes the permission evaluator, reference resolver, lock manager,
//! and tree mutator behind the operations service-layer callers use:
//! permission-checked CRUD, order-preserving bulk fetches, accessibility
//! listings, and reverse-reference queries.
//!
//! The null convention: mutating operations return `Ok(None)`/`Ok(false)`
//! both when the caller lacks permission and when the target has vanished;
//! thrown validation errors mean the caller supplied bad input. The two
//! must stay distinguishable.

use crate::lock::LockManager;
use crate::permission::{has_read_access, has_write_access};
use crate::resolver::ReferenceResolver;
use crate::tree::TreeMutator;
use arbor_core::{
    DocumentStore, DomainDocument, DomainId, DomainType, Error, IdGenerator, Page, Reference,
    Result, ReverseReference, SubjectKey, Timestamp,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Envelope fields that field-level updates may never touch directly
const PROTECTED_FIELDS: [&str; 6] = [
    "id",
    "type",
    "owner_key",
    "readers",
    "writers",
    "creation_date",
];

/// Permission-aware entry point for domain object operations
pub struct DomainAccess {
    store: Arc<dyn DocumentStore>,
    ids: Arc<dyn IdGenerator>,
    resolver: ReferenceResolver,
    locks: LockManager,
    trees: TreeMutator,
}

impl DomainAccess {
    /// Create the facade over a store and id generator
    ///
    /// Declares the lock collection's unique and TTL indexes.
    ///
    /// # Errors
    /// Propagates storage failures from the index declarations.
    pub fn new(store: Arc<dyn DocumentStore>, ids: Arc<dyn IdGenerator>) -> Result<Self> {
        let resolver = ReferenceResolver::new(store.clone());
        let locks = LockManager::new(store.clone())?;
        let trees = TreeMutator::new(store.clone(), ids.clone());
        Ok(DomainAccess {
            store,
            ids,
            resolver,
            locks,
            trees,
        })
    }

    /// The composed reference resolver
    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    /// The composed distributed lock manager
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// The composed ordered-tree mutator
    pub fn trees(&self) -> &TreeMutator {
        &self.trees
    }

    /// Fetch one object the subject can read
    ///
    /// # Errors
    /// Storage failures and data-integrity violations propagate.
    pub fn get_object(
        &self,
        subject: &SubjectKey,
        reference: &Reference,
    ) -> Result<Option<DomainDocument>> {
        self.resolver.resolve(subject, reference)
    }

    /// Fetch many objects of one type, order-preserving
    ///
    /// Slot `i` corresponds to `ids[i]`; unreadable and missing ids
    /// resolve to None alike.
    ///
    /// # Errors
    /// Storage failures and data-integrity violations propagate.
    pub fn get_objects_by_ids(
        &self,
        subject: &SubjectKey,
        doc_type: DomainType,
        ids: &[DomainId],
    ) -> Result<Vec<Option<DomainDocument>>> {
        let references: Vec<Reference> =
            ids.iter().map(|&id| Reference::new(doc_type, id)).collect();
        self.resolver.resolve_batch(subject, &references)
    }

    /// Create or update a document
    ///
    /// A document with an unassigned id is created: it receives a fresh
    /// generated id and timestamps. A document with an assigned id updates
    /// the stored record field by field after a write-access check against
    /// the *stored* permissions; None means not permitted or vanished.
    ///
    /// # Errors
    /// [`Error::DataIntegrity`] when the supplied document is missing its
    /// owner or access sets; storage failures propagate.
    pub fn save(
        &self,
        subject: &SubjectKey,
        mut doc: DomainDocument,
    ) -> Result<Option<DomainDocument>> {
        if !doc.id.is_assigned() {
            return self.create(doc).map(Some);
        }

        let collection = doc.doc_type.collection();
        let Some(stored) = self.store.find_by_id(collection, doc.id)? else {
            return Ok(None);
        };
        let current = DomainDocument::from_value(stored)?;
        if !has_write_access(&current, subject)? {
            debug!(reference = %doc.reference(), %subject, "save denied");
            return Ok(None);
        }

        doc.touch(Timestamp::now());
        let mut fields = match doc.to_value()? {
            Value::Object(fields) => fields,
            _ => return Err(Error::Serialization("document is not an object".to_string())),
        };
        // The id is immutable and the creation date was assigned once at
        // insert; field-level updates never rewrite them.
        fields.remove("id");
        fields.remove("creation_date");
        self.store.update_fields(collection, doc.id, fields)?;
        self.fetch(collection, doc.id)
    }

    /// Insert a new document with a fresh id and timestamps
    fn create(&self, mut doc: DomainDocument) -> Result<DomainDocument> {
        // Never persist a document that would violate the construction
        // invariants.
        doc.owner_key()?;
        doc.readers()?;
        doc.writers()?;

        doc.id = self.ids.next_id();
        let now = Timestamp::now();
        doc.creation_date = now;
        doc.updated_date = now;
        self.store
            .insert(doc.doc_type.collection(), doc.to_value()?)?;
        debug!(reference = %doc.reference(), "created");
        Ok(doc)
    }

    /// Delete a document the subject owns or can write
    ///
    /// Cascades are the caller's responsibility; dependents are not
    /// touched. Returns false when the subject lacks write access or the
    /// document is already gone.
    ///
    /// # Errors
    /// Storage failures and data-integrity violations propagate.
    pub fn remove(&self, subject: &SubjectKey, reference: &Reference) -> Result<bool> {
        let Some(stored) = self
            .store
            .find_by_id(reference.collection(), reference.target_id())?
        else {
            return Ok(false);
        };
        let doc = DomainDocument::from_value(stored)?;
        if !has_write_access(&doc, subject)? {
            debug!(%reference, %subject, "remove denied");
            return Ok(false);
        }
        self.store.delete(reference.collection(), reference.target_id())
    }

    /// List documents of a type the subject can read
    ///
    /// The permission filter runs before the page window, so offsets index
    /// the subject's accessible sequence.
    ///
    /// # Errors
    /// Storage failures and data-integrity violations propagate.
    pub fn list_accessible(
        &self,
        subject: &SubjectKey,
        doc_type: DomainType,
        page: Page,
    ) -> Result<Vec<DomainDocument>> {
        let values = self.store.list(doc_type.collection(), Page::ALL)?;
        let mut accessible = Vec::new();
        for value in values {
            let doc = DomainDocument::from_value(value)?;
            if has_read_access(&doc, subject)? {
                accessible.push(doc);
            }
        }
        Ok(page.apply(accessible))
    }

    /// List documents of a type the subject owns
    ///
    /// # Errors
    /// Storage failures and data-integrity violations propagate.
    pub fn list_owned(
        &self,
        subject: &SubjectKey,
        doc_type: DomainType,
        page: Page,
    ) -> Result<Vec<DomainDocument>> {
        let values = self.store.list(doc_type.collection(), Page::ALL)?;
        let mut owned = Vec::new();
        for value in values {
            let doc = DomainDocument::from_value(value)?;
            if doc.owner_key()? == subject {
                owned.push(doc);
            }
        }
        Ok(page.apply(owned))
    }

    /// List documents pointing at a target through a named field
    ///
    /// The cross-collection operation behind "all samples of a data set
    /// the caller can read".
    ///
    /// # Errors
    /// Storage failures and data-integrity violations propagate.
    pub fn find_referencing(
        &self,
        subject: &SubjectKey,
        reverse: &ReverseReference,
        page: Page,
    ) -> Result<Vec<DomainDocument>> {
        self.resolver.resolve_reverse(subject, reverse, page)
    }

    /// Update a single field of a document the subject can write
    ///
    /// Stamps the updated date alongside. None means not permitted or
    /// vanished.
    ///
    /// # Errors
    /// [`Error::Validation`] for protected envelope fields (id, type,
    /// owner, access sets, creation date); storage failures propagate.
    pub fn update_field(
        &self,
        subject: &SubjectKey,
        reference: &Reference,
        field: &str,
        value: Value,
    ) -> Result<Option<DomainDocument>> {
        if PROTECTED_FIELDS.contains(&field) {
            return Err(Error::Validation(format!(
                "Field {field} cannot be updated directly"
            )));
        }
        let Some(stored) = self
            .store
            .find_by_id(reference.collection(), reference.target_id())?
        else {
            return Ok(None);
        };
        let doc = DomainDocument::from_value(stored)?;
        if !has_write_access(&doc, subject)? {
            debug!(%reference, %subject, field, "field update denied");
            return Ok(None);
        }

        let mut fields = Map::new();
        fields.insert(field.to_string(), value);
        fields.insert(
            "updated_date".to_string(),
            Value::from(Timestamp::now().as_micros()),
        );
        self.store
            .update_fields(reference.collection(), reference.target_id(), fields)?;
        self.fetch(reference.collection(), reference.target_id())
    }

    /// Set a grantee's access to a document to exactly the given level
    ///
    /// Granting write implies read. Revoking both removes the grantee from
    /// both sets. Requires write access; None means not permitted or
    /// vanished.
    ///
    /// # Errors
    /// Storage failures and data-integrity violations propagate.
    pub fn set_permissions(
        &self,
        subject: &SubjectKey,
        reference: &Reference,
        grantee: &SubjectKey,
        read: bool,
        write: bool,
    ) -> Result<Option<DomainDocument>> {
        let Some(stored) = self
            .store
            .find_by_id(reference.collection(), reference.target_id())?
        else {
            return Ok(None);
        };
        let mut doc = DomainDocument::from_value(stored)?;
        if !has_write_access(&doc, subject)? {
            debug!(%reference, %subject, grantee = %grantee, "permission change denied");
            return Ok(None);
        }

        doc.set_reader(grantee, read || write)?;
        doc.set_writer(grantee, write)?;

        let mut fields = Map::new();
        fields.insert("readers".to_string(), serde_json::to_value(doc.readers()?)?);
        fields.insert("writers".to_string(), serde_json::to_value(doc.writers()?)?);
        fields.insert(
            "updated_date".to_string(),
            Value::from(Timestamp::now().as_micros()),
        );
        self.store
            .update_fields(reference.collection(), reference.target_id(), fields)?;
        self.fetch(reference.collection(), reference.target_id())
    }

    fn fetch(&self, collection: &str, id: DomainId) -> Result<Option<DomainDocument>> {
        match self.store.find_by_id(collection, id)? {
            Some(value) => Ok(Some(DomainDocument::from_value(value)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::TimebasedIdGenerator;
    use arbor_storage::MemoryDocumentStore;
    use serde_json::json;

    fn facade() -> DomainAccess {
        let ids = Arc::new(TimebasedIdGenerator::new());
        let store = Arc::new(MemoryDocumentStore::new(ids.clone()));
        DomainAccess::new(store, ids).unwrap()
    }

    fn alice() -> SubjectKey {
        SubjectKey::user("alice")
    }

    #[test]
    fn test_save_creates_with_fresh_id_and_timestamps() {
        let access = facade();
        let doc = DomainDocument::new(DomainType::Sample, "s1", alice());

        let saved = access.save(&alice(), doc).unwrap().unwrap();
        assert!(saved.id.is_assigned());
        assert_eq!(saved.name, "s1");

        let fetched = access.get_object(&alice(), &saved.reference()).unwrap().unwrap();
        assert_eq!(fetched, saved);
    }

    #[test]
    fn test_save_update_stamps_updated_date() {
        let access = facade();
        let saved = access
            .save(&alice(), DomainDocument::new(DomainType::Sample, "s1", alice()))
            .unwrap()
            .unwrap();

        let mut edited = saved.clone();
        edited.name = "renamed".to_string();
        let updated = access.save(&alice(), edited).unwrap().unwrap();

        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.creation_date, saved.creation_date);
        assert!(updated.updated_date >= saved.updated_date);
    }

    #[test]
    fn test_save_denied_for_non_writer() {
        let access = facade();
        let saved = access
            .save(&alice(), DomainDocument::new(DomainType::Sample, "s1", alice()))
            .unwrap()
            .unwrap();

        let mut edited = saved.clone();
        edited.name = "hijacked".to_string();
        let result = access.save(&SubjectKey::user("eve"), edited).unwrap();
        assert!(result.is_none());

        let current = access.get_object(&alice(), &saved.reference()).unwrap().unwrap();
        assert_eq!(current.name, "s1");
    }

    #[test]
    fn test_save_vanished_returns_none() {
        let access = facade();
        let mut doc = DomainDocument::new(DomainType::Sample, "ghost", alice());
        doc.id = DomainId::new(12345);
        assert!(access.save(&alice(), doc).unwrap().is_none());
    }

    #[test]
    fn test_get_objects_by_ids_preserves_order() {
        let access = facade();
        let a = access
            .save(&alice(), DomainDocument::new(DomainType::Sample, "a", alice()))
            .unwrap()
            .unwrap();
        let b = access
            .save(&alice(), DomainDocument::new(DomainType::Sample, "b", alice()))
            .unwrap()
            .unwrap();

        let results = access
            .get_objects_by_ids(
                &alice(),
                DomainType::Sample,
                &[b.id, DomainId::new(404), a.id],
            )
            .unwrap();
        assert_eq!(results[0].as_ref().unwrap().name, "b");
        assert!(results[1].is_none());
        assert_eq!(results[2].as_ref().unwrap().name, "a");
    }

    #[test]
    fn test_remove_requires_write_access() {
        let access = facade();
        let saved = access
            .save(&alice(), DomainDocument::new(DomainType::Sample, "s1", alice()))
            .unwrap()
            .unwrap();
        let reference = saved.reference();

        assert!(!access.remove(&SubjectKey::user("eve"), &reference).unwrap());
        assert!(access.get_object(&alice(), &reference).unwrap().is_some());

        assert!(access.remove(&alice(), &reference).unwrap());
        assert!(access.get_object(&alice(), &reference).unwrap().is_none());
        assert!(!access.remove(&alice(), &reference).unwrap());
    }

    #[test]
    fn test_list_accessible_filters_then_pages() {
        let access = facade();
        let bob = SubjectKey::user("bob");
        for i in 0..3 {
            access
                .save(
                    &alice(),
                    DomainDocument::new(DomainType::Sample, format!("mine{i}"), alice()),
                )
                .unwrap();
        }
        access
            .save(&bob, DomainDocument::new(DomainType::Sample, "private", bob.clone()))
            .unwrap();

        let mine = access
            .list_accessible(&alice(), DomainType::Sample, Page::ALL)
            .unwrap();
        assert_eq!(mine.len(), 3);

        let window = access
            .list_accessible(&alice(), DomainType::Sample, Page::new(1, 1))
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].name, "mine1");
    }

    #[test]
    fn test_list_owned_excludes_merely_readable() {
        let access = facade();
        let bob = SubjectKey::user("bob");
        let shared = access
            .save(&bob, DomainDocument::new(DomainType::Sample, "shared", bob.clone()))
            .unwrap()
            .unwrap();
        access
            .set_permissions(&bob, &shared.reference(), &alice(), true, false)
            .unwrap()
            .unwrap();
        access
            .save(&alice(), DomainDocument::new(DomainType::Sample, "mine", alice()))
            .unwrap();

        let owned = access.list_owned(&alice(), DomainType::Sample, Page::ALL).unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].name, "mine");

        // But the shared one is accessible.
        let accessible = access
            .list_accessible(&alice(), DomainType::Sample, Page::ALL)
            .unwrap();
        assert_eq!(accessible.len(), 2);
    }

    #[test]
    fn test_find_referencing_samples_of_data_set() {
        let access = facade();
        let data_set = access
            .save(&alice(), DomainDocument::new(DomainType::DataSet, "split_gal4", alice()))
            .unwrap()
            .unwrap();

        for i in 0..2 {
            let mut sample =
                DomainDocument::new(DomainType::Sample, format!("s{i}"), alice());
            sample.set_attribute("data_set_id", json!(data_set.id.as_u64()));
            access.save(&alice(), sample).unwrap();
        }

        let reverse = ReverseReference::new(DomainType::Sample, "data_set_id", data_set.id);
        let members = access.find_referencing(&alice(), &reverse, Page::ALL).unwrap();
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn test_update_field() {
        let access = facade();
        let saved = access
            .save(&alice(), DomainDocument::new(DomainType::Sample, "s1", alice()))
            .unwrap()
            .unwrap();

        let updated = access
            .update_field(&alice(), &saved.reference(), "status", json!("complete"))
            .unwrap()
            .unwrap();
        assert_eq!(updated.attribute("status"), Some(&json!("complete")));

        // Denied for strangers, protected for envelope fields.
        assert!(access
            .update_field(&SubjectKey::user("eve"), &saved.reference(), "status", json!("x"))
            .unwrap()
            .is_none());
        assert!(matches!(
            access.update_field(&alice(), &saved.reference(), "owner_key", json!("user:eve")),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_set_permissions_grants_and_revokes() {
        let access = facade();
        let bob = SubjectKey::user("bob");
        let saved = access
            .save(&alice(), DomainDocument::new(DomainType::Sample, "s1", alice()))
            .unwrap()
            .unwrap();
        let reference = saved.reference();

        // Bob cannot see it yet.
        assert!(access.get_object(&bob, &reference).unwrap().is_none());

        // Grant read.
        access
            .set_permissions(&alice(), &reference, &bob, true, false)
            .unwrap()
            .unwrap();
        assert!(access.get_object(&bob, &reference).unwrap().is_some());
        assert!(access.remove(&bob, &reference).is_ok_and(|removed| !removed));

        // Upgrade to write: implies read.
        let updated = access
            .set_permissions(&alice(), &reference, &bob, false, true)
            .unwrap()
            .unwrap();
        assert!(updated.readers().unwrap().contains(&bob));
        assert!(updated.writers().unwrap().contains(&bob));

        // Revoke everything.
        let revoked = access
            .set_permissions(&alice(), &reference, &bob, false, false)
            .unwrap()
            .unwrap();
        assert!(!revoked.readers().unwrap().contains(&bob));
        assert!(!revoked.writers().unwrap().contains(&bob));
        assert!(access.get_object(&bob, &reference).unwrap().is_none());
    }

    #[test]
    fn test_set_permissions_requires_write_access() {
        let access = facade();
        let bob = SubjectKey::user("bob");
        let saved = access
            .save(&alice(), DomainDocument::new(DomainType::Sample, "s1", alice()))
            .unwrap()
            .unwrap();

        assert!(access
            .set_permissions(&bob, &saved.reference(), &bob, true, true)
            .unwrap()
            .is_none());
    }
}
