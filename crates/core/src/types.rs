//! Foundational identifier types
//!
//! This module defines:
//! - DomainId: unique identifier for a domain object, unique within its
//!   collection, roughly chronological by construction
//! - SubjectKey: identifier for a user or group ("user:alice", "group:lab1")

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a domain object
///
/// Ids are assigned once, server-side, by a time-based generator, which
/// makes them globally unique and roughly chronologically sortable. An id
/// is only unique within its collection; a [`crate::Reference`] pairs it
/// with a domain type to form a global address.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct DomainId(u64);

impl DomainId {
    /// Sentinel for a document that has not been persisted yet
    ///
    /// [`crate::DomainDocument::new`] starts documents here; the facade
    /// assigns a real id at insert time.
    pub const UNASSIGNED: DomainId = DomainId(0);

    /// Create an id from its raw value
    pub const fn new(raw: u64) -> Self {
        DomainId(raw)
    }

    /// Get the raw value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Whether this id has been assigned by the generator
    pub const fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DomainId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(DomainId)
    }
}

/// Identifier for a user or group subject
///
/// Subject keys are strings of the form `"user:alice"` or `"group:lab1"`.
/// Permission checks compare subject keys structurally; expanding a user key
/// into its group closure is the identity service's responsibility, outside
/// this crate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectKey(String);

impl SubjectKey {
    /// Prefix for user subjects
    pub const USER_PREFIX: &'static str = "user:";

    /// Prefix for group subjects
    pub const GROUP_PREFIX: &'static str = "group:";

    /// Create a subject key from a raw string
    pub fn new(raw: impl Into<String>) -> Self {
        SubjectKey(raw.into())
    }

    /// Create a user subject key (`"user:{name}"`)
    pub fn user(name: &str) -> Self {
        SubjectKey(format!("{}{}", Self::USER_PREFIX, name))
    }

    /// Create a group subject key (`"group:{name}"`)
    pub fn group(name: &str) -> Self {
        SubjectKey(format!("{}{}", Self::GROUP_PREFIX, name))
    }

    /// Get the raw key string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key identifies a user
    pub fn is_user(&self) -> bool {
        self.0.starts_with(Self::USER_PREFIX)
    }

    /// Whether this key identifies a group
    pub fn is_group(&self) -> bool {
        self.0.starts_with(Self::GROUP_PREFIX)
    }

    /// The name part after the `user:`/`group:` prefix
    ///
    /// Returns the whole key for keys without a recognized prefix.
    pub fn name(&self) -> &str {
        self.0
            .split_once(':')
            .map(|(_, name)| name)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubjectKey {
    fn from(raw: &str) -> Self {
        SubjectKey::new(raw)
    }
}
