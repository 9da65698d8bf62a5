//! Permission-aware access layer for arbor domain objects
//!
//! This crate is the access/locking/reference engine built atop the
//! generic document store contract from `arbor-core`:
//! - `permission`: pure read/write access checks
//! - `resolver`: reference and reverse-reference resolution, batched and
//!   order-preserving, with cycle-safe ancestor traversal
//! - `lock`: distributed, TTL-bounded, owner+task-scoped object locks
//! - `tree`: ordered term-tree mutation with positional invariants
//! - `facade`: the composed entry point for service-layer callers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod facade;
pub mod lock;
pub mod permission;
pub mod resolver;
pub mod tree;

pub use facade::DomainAccess;
pub use lock::{LockManager, ObjectLock, LOCK_COLLECTION, LOCK_RETRY_INTERVAL, LOCK_TTL};
pub use permission::{
    has_read_access, has_read_access_any, has_write_access, has_write_access_any,
};
pub use resolver::ReferenceResolver;
pub use tree::{TermNode, TreeMutator, TERMS_FIELD};
