//! Reference resolution
//!
//! Turns typed (type, id) references into concrete documents, respecting
//! permissions and batching by target collection to minimize round trips.
//!
//! Permission filtering never leaks existence: a document the caller may
//! not read resolves exactly like one that does not exist.

use crate::permission::has_read_access;
use arbor_core::{
    DocumentStore, DomainDocument, DomainId, DomainType, Filter, Page, Reference, Result,
    ReverseReference, SubjectKey,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Resolves references against the document store
pub struct ReferenceResolver {
    store: Arc<dyn DocumentStore>,
}

impl ReferenceResolver {
    /// Create a resolver over the given store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        ReferenceResolver { store }
    }

    /// Resolve a single reference
    ///
    /// Returns None when the target does not exist, is expired, or the
    /// subject lacks read access (indistinguishable by design).
    ///
    /// # Errors
    /// Storage failures and data-integrity violations propagate.
    pub fn resolve(
        &self,
        subject: &SubjectKey,
        reference: &Reference,
    ) -> Result<Option<DomainDocument>> {
        let Some(value) = self
            .store
            .find_by_id(reference.collection(), reference.target_id())?
        else {
            return Ok(None);
        };
        let doc = DomainDocument::from_value(value)?;
        if has_read_access(&doc, subject)? {
            Ok(Some(doc))
        } else {
            Ok(None)
        }
    }

    /// Resolve many references, one result slot per input
    ///
    /// The result has the same length and order as the input: `result[i]`
    /// corresponds to `references[i]`, so callers can zip it back against
    /// parallel lists. Internally the references are grouped by target
    /// collection and fetched with one bulk query per collection.
    ///
    /// # Errors
    /// Storage failures and data-integrity violations propagate.
    pub fn resolve_batch(
        &self,
        subject: &SubjectKey,
        references: &[Reference],
    ) -> Result<Vec<Option<DomainDocument>>> {
        let mut by_type: HashMap<DomainType, Vec<DomainId>> = HashMap::new();
        for reference in references {
            by_type
                .entry(reference.target_type())
                .or_default()
                .push(reference.target_id());
        }

        let mut resolved: HashMap<Reference, DomainDocument> = HashMap::new();
        for (target_type, ids) in by_type {
            for value in self.store.find_by_ids(target_type.collection(), &ids)? {
                let doc = DomainDocument::from_value(value)?;
                if has_read_access(&doc, subject)? {
                    resolved.insert(doc.reference(), doc);
                }
            }
        }

        Ok(references
            .iter()
            .map(|reference| resolved.get(reference).cloned())
            .collect())
    }

    /// Resolve a reverse reference: all documents pointing at a target
    ///
    /// Queries the referencing collection for documents whose named field
    /// holds the target's raw id, filters by read access, then applies the
    /// page window. Filtering happens before pagination so offsets index
    /// the subject's accessible sequence and pages stay stable.
    ///
    /// # Errors
    /// Storage failures and data-integrity violations propagate.
    pub fn resolve_reverse(
        &self,
        subject: &SubjectKey,
        reverse: &ReverseReference,
        page: Page,
    ) -> Result<Vec<DomainDocument>> {
        let filter = Filter::eq(
            reverse.referencing_field.clone(),
            Value::from(reverse.referenced_id.as_u64()),
        );
        let values = self
            .store
            .find(reverse.referencing_type.collection(), &filter, Page::ALL)?;

        let mut accessible = Vec::new();
        for value in values {
            let doc = DomainDocument::from_value(value)?;
            if has_read_access(&doc, subject)? {
                accessible.push(doc);
            }
        }
        Ok(page.apply(accessible))
    }

    /// Walk the ancestor graph from a starting reference
    ///
    /// Breadth-first over `fetch_direct_ancestors`, calling `visit` once
    /// per newly discovered ancestor (the start itself is not visited).
    /// The underlying graph is not guaranteed to be a strict tree, so the
    /// walk tracks a visited set keyed by reference identity and
    /// terminates on cycles. `max_depth = -1` means unbounded.
    ///
    /// # Errors
    /// Errors from `fetch_direct_ancestors` propagate and abort the walk.
    pub fn traverse_ancestors<F, V>(
        &self,
        start: &Reference,
        mut fetch_direct_ancestors: F,
        mut visit: V,
        max_depth: i64,
    ) -> Result<()>
    where
        F: FnMut(&Reference) -> Result<HashSet<Reference>>,
        V: FnMut(&Reference),
    {
        let mut visited: HashSet<Reference> = HashSet::new();
        visited.insert(*start);
        let mut queue: VecDeque<(Reference, i64)> = VecDeque::new();
        queue.push_back((*start, 0));

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth >= 0 && depth >= max_depth {
                continue;
            }
            for ancestor in fetch_direct_ancestors(&current)? {
                if visited.insert(ancestor) {
                    visit(&ancestor);
                    queue.push_back((ancestor, depth + 1));
                }
            }
        }
        Ok(())
    }
}
