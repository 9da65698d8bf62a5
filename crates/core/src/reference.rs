//! Typed cross-collection pointers
//!
//! A [`Reference`] is the uniform way to address any domain object: a
//! (type, id) pair, immutable once constructed, with structural equality.
//! References are embedded in documents and lock records in their encoded
//! string form, `"Sample#2345"`.
//!
//! A [`ReverseReference`] describes the inverse query: "all records of type
//! X whose field F equals id Y", used when no forward pointer is stored on
//! the target.

use crate::error::{Error, Result};
use crate::registry::DomainType;
use crate::types::DomainId;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Immutable (type, id) pointer to a domain object in another collection
///
/// ## Invariants
///
/// - Immutable once constructed (fields are private)
/// - Equality and hashing are structural (type + id)
/// - Serialized form is the encoded string `"{TypeName}#{id}"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reference {
    target_type: DomainType,
    target_id: DomainId,
}

impl Reference {
    /// Create a reference to an object of the given type and id
    pub const fn new(target_type: DomainType, target_id: DomainId) -> Self {
        Reference {
            target_type,
            target_id,
        }
    }

    /// The collection discriminator of the target
    pub const fn target_type(&self) -> DomainType {
        self.target_type
    }

    /// The target's id within its collection
    pub const fn target_id(&self) -> DomainId {
        self.target_id
    }

    /// The collection the target lives in
    pub fn collection(&self) -> &'static str {
        self.target_type.collection()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.target_type.type_name(), self.target_id)
    }
}

impl FromStr for Reference {
    type Err = Error;

    /// Parse an encoded reference of the form `"Sample#2345"`
    ///
    /// # Errors
    /// - [`Error::UnknownDomainType`] for a type name outside the registry
    /// - [`Error::Serialization`] for a malformed encoding
    fn from_str(s: &str) -> Result<Self> {
        let (type_name, id) = s
            .split_once('#')
            .ok_or_else(|| Error::Serialization(format!("malformed reference: {s}")))?;
        let target_type = DomainType::from_name(type_name)?;
        let target_id = id
            .parse::<DomainId>()
            .map_err(|_| Error::Serialization(format!("malformed reference id: {s}")))?;
        Ok(Reference::new(target_type, target_id))
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}

/// Query descriptor for "who points at me"
///
/// Answers reverse lookups without a back-pointer stored on the target:
/// all documents in `referencing_type`'s collection whose
/// `referencing_field` holds the raw id `referenced_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReverseReference {
    /// The collection that holds the pointers
    pub referencing_type: DomainType,
    /// The field holding the referenced id
    pub referencing_field: String,
    /// The id being pointed at
    pub referenced_id: DomainId,
}

impl ReverseReference {
    /// Create a reverse reference descriptor
    pub fn new(
        referencing_type: DomainType,
        referencing_field: impl Into<String>,
        referenced_id: DomainId,
    ) -> Self {
        ReverseReference {
            referencing_type,
            referencing_field: referencing_field.into(),
            referenced_id,
        }
    }
}
