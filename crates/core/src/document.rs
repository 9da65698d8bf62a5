//! Domain document envelope
//!
//! Every domain object shares a common envelope: id, type, name, owner key,
//! reader/writer sets, and creation/updated timestamps. Type-specific fields
//! live in a flattened attribute map, which is how the ~100 concrete domain
//! classes of the pipeline pass through this layer without being modeled
//! here.
//!
//! ## Null handling
//!
//! By construction readers and writers are never null: the "no extra
//! access" state is an empty set. The owner and both sets are nevertheless
//! deserialized as optional so that corrupt stored documents are
//! *detectable*; the accessors turn a missing owner or set into a loud
//! [`Error::DataIntegrity`] instead of silently treating it as "no access".

use crate::error::{Error, Result};
use crate::reference::Reference;
use crate::registry::DomainType;
use crate::timestamp::Timestamp;
use crate::types::{DomainId, SubjectKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Envelope fields shared by every domain document
///
/// These names are reserved; attribute names must not collide with them.
pub const ENVELOPE_FIELDS: [&str; 8] = [
    "id",
    "type",
    "name",
    "owner_key",
    "readers",
    "writers",
    "creation_date",
    "updated_date",
];

/// A typed record in a domain collection
///
/// ## Lifecycle
///
/// Created with [`DomainDocument::new`] (unassigned id, owner in both
/// access sets, fresh timestamps); the facade assigns the real id and
/// stamps `updated_date` on every mutation. Documents are updated via
/// field-level operations, never whole-document replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDocument {
    /// Unique id within the type's collection
    pub id: DomainId,
    /// Collection discriminator
    #[serde(rename = "type")]
    pub doc_type: DomainType,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Owning subject; implicitly has read and write access
    #[serde(default)]
    owner_key: Option<SubjectKey>,
    /// Subjects with read access beyond the owner
    #[serde(default)]
    readers: Option<HashSet<SubjectKey>>,
    /// Subjects with write access beyond the owner
    #[serde(default)]
    writers: Option<HashSet<SubjectKey>>,
    /// When the document was first persisted
    pub creation_date: Timestamp,
    /// When the document was last mutated
    pub updated_date: Timestamp,
    /// Type-specific fields, stored at the top level of the document
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl DomainDocument {
    /// Create a new, not-yet-persisted document owned by `owner`
    ///
    /// The owner is placed in both access sets; readers/writers start as
    /// those singletons, never as null.
    pub fn new(doc_type: DomainType, name: impl Into<String>, owner: SubjectKey) -> Self {
        let now = Timestamp::now();
        let mut singleton = HashSet::new();
        singleton.insert(owner.clone());
        DomainDocument {
            id: DomainId::UNASSIGNED,
            doc_type,
            name: name.into(),
            owner_key: Some(owner),
            readers: Some(singleton.clone()),
            writers: Some(singleton),
            creation_date: now,
            updated_date: now,
            attributes: Map::new(),
        }
    }

    /// The (type, id) reference addressing this document
    pub fn reference(&self) -> Reference {
        Reference::new(self.doc_type, self.id)
    }

    /// The owning subject
    ///
    /// # Errors
    /// [`Error::DataIntegrity`] if the stored document has a null owner.
    pub fn owner_key(&self) -> Result<&SubjectKey> {
        self.owner_key.as_ref().ok_or_else(|| {
            Error::DataIntegrity(format!("document {} has null owner key", self.reference()))
        })
    }

    /// Subjects with read access beyond the owner
    ///
    /// # Errors
    /// [`Error::DataIntegrity`] if the stored document has a null reader set.
    pub fn readers(&self) -> Result<&HashSet<SubjectKey>> {
        self.readers.as_ref().ok_or_else(|| {
            Error::DataIntegrity(format!("document {} has null reader set", self.reference()))
        })
    }

    /// Subjects with write access beyond the owner
    ///
    /// # Errors
    /// [`Error::DataIntegrity`] if the stored document has a null writer set.
    pub fn writers(&self) -> Result<&HashSet<SubjectKey>> {
        self.writers.as_ref().ok_or_else(|| {
            Error::DataIntegrity(format!("document {} has null writer set", self.reference()))
        })
    }

    /// Grant or revoke read access for a subject
    ///
    /// # Errors
    /// [`Error::DataIntegrity`] if the stored reader set is null.
    pub fn set_reader(&mut self, subject: &SubjectKey, granted: bool) -> Result<()> {
        let reference = self.reference();
        let readers = self.readers.as_mut().ok_or_else(|| {
            Error::DataIntegrity(format!("document {reference} has null reader set"))
        })?;
        if granted {
            readers.insert(subject.clone());
        } else {
            readers.remove(subject);
        }
        Ok(())
    }

    /// Grant or revoke write access for a subject
    ///
    /// # Errors
    /// [`Error::DataIntegrity`] if the stored writer set is null.
    pub fn set_writer(&mut self, subject: &SubjectKey, granted: bool) -> Result<()> {
        let reference = self.reference();
        let writers = self.writers.as_mut().ok_or_else(|| {
            Error::DataIntegrity(format!("document {reference} has null writer set"))
        })?;
        if granted {
            writers.insert(subject.clone());
        } else {
            writers.remove(subject);
        }
        Ok(())
    }

    /// Read a type-specific attribute
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Set a type-specific attribute
    ///
    /// Attribute names must not collide with [`ENVELOPE_FIELDS`].
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    /// Stamp the updated date
    pub fn touch(&mut self, now: Timestamp) {
        self.updated_date = now;
    }

    /// Serialize into a raw storage document
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from a raw storage document
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
