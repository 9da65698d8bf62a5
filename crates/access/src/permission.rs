//! Permission checks at the data-access boundary
//!
//! Pure functions over in-memory state: no storage access, no side effects.
//! The owner implicitly has read and write access; membership in `writers`
//! implies read access. Expanding a user's subject key into its group
//! closure is the identity service's job; the `_any` variants accept that
//! pre-expanded set.
//!
//! A null owner or null reader/writer set on a stored document is a
//! data-integrity violation and fails loudly (the accessor errors are
//! propagated, never mapped to "no access").

use arbor_core::{DomainDocument, Result, SubjectKey};
use std::collections::HashSet;

/// Whether `subject` may read `doc`
///
/// True if the subject is the owner, a reader, or a writer (write implies
/// read).
///
/// # Errors
/// [`arbor_core::Error::DataIntegrity`] if the document's owner or access
/// sets are null.
pub fn has_read_access(doc: &DomainDocument, subject: &SubjectKey) -> Result<bool> {
    if doc.owner_key()? == subject {
        return Ok(true);
    }
    Ok(doc.readers()?.contains(subject) || doc.writers()?.contains(subject))
}

/// Whether `subject` may write `doc`
///
/// True if the subject is the owner or a writer.
///
/// # Errors
/// [`arbor_core::Error::DataIntegrity`] if the document's owner or writer
/// set is null.
pub fn has_write_access(doc: &DomainDocument, subject: &SubjectKey) -> Result<bool> {
    if doc.owner_key()? == subject {
        return Ok(true);
    }
    Ok(doc.writers()?.contains(subject))
}

/// Whether any subject in a pre-expanded closure may read `doc`
///
/// # Errors
/// [`arbor_core::Error::DataIntegrity`] if the document's owner or access
/// sets are null.
pub fn has_read_access_any(doc: &DomainDocument, subjects: &HashSet<SubjectKey>) -> Result<bool> {
    if subjects.contains(doc.owner_key()?) {
        return Ok(true);
    }
    Ok(!doc.readers()?.is_disjoint(subjects) || !doc.writers()?.is_disjoint(subjects))
}

/// Whether any subject in a pre-expanded closure may write `doc`
///
/// # Errors
/// [`arbor_core::Error::DataIntegrity`] if the document's owner or writer
/// set is null.
pub fn has_write_access_any(doc: &DomainDocument, subjects: &HashSet<SubjectKey>) -> Result<bool> {
    if subjects.contains(doc.owner_key()?) {
        return Ok(true);
    }
    Ok(!doc.writers()?.is_disjoint(subjects))
}
