//! Core types and traits for the arbor domain object store
//!
//! This crate defines the foundational types used throughout the system:
//! - DomainId / SubjectKey: identifier types
//! - Timestamp: microsecond-precision canonical time representation
//! - Reference / ReverseReference: typed cross-collection pointers
//! - DomainType: closed registry of domain types and their collections
//! - DomainDocument: common envelope for all domain objects
//! - IdGenerator: time-based id allocation
//! - Filter / Page: query descriptors
//! - DocumentStore: storage collaborator contract
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod id;
pub mod query;
pub mod reference;
pub mod registry;
pub mod timestamp;
pub mod traits;
pub mod types;

pub use document::{DomainDocument, ENVELOPE_FIELDS};
pub use error::{Error, Result};
pub use id::{IdGenerator, TimebasedIdGenerator};
pub use query::{Filter, Page};
pub use reference::{Reference, ReverseReference};
pub use registry::DomainType;
pub use timestamp::Timestamp;
pub use traits::DocumentStore;
pub use types::{DomainId, SubjectKey};
