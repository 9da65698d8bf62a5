//! In-memory document store backend for arbor
//!
//! Implements the `DocumentStore` contract from `arbor-core`:
//! - `MemoryDocumentStore`: DashMap of collections, each an ordered
//!   BTreeMap behind a `parking_lot::RwLock`
//! - per-collection unique indexes (duplicate-key rejection is the
//!   mutual-exclusion primitive the distributed lock protocol builds on)
//! - per-collection TTL indexes with logical expiration (expired documents
//!   are filtered at read time and reaped on writes)

#![warn(missing_docs)]
#![warn(clippy::all)]

mod collection;
pub mod memory;
pub mod ttl;

pub use memory::MemoryDocumentStore;
pub use ttl::TtlIndex;
