//! Ordered-tree mutation for hierarchical domain objects
//!
//! Ontology-style objects carry a tree of terms in their `terms` field;
//! the order of each child list is the display and traversal order, so
//! every edit is positional. Operations address a parent term by id (the
//! root document's own id addresses the top-level list), mutate that
//! term's immediate-children list, and persist the whole tree back as a
//! single field replace, which is what keeps each mutation atomic to
//! readers.
//!
//! The read-modify-write is deliberately not wrapped in a transaction or
//! version token, matching the storage model this layer targets: two
//! writers racing on the same root can lose an update. See DESIGN.md.

use crate::permission::has_write_access;
use arbor_core::{
    DocumentStore, DomainDocument, DomainId, Error, IdGenerator, Reference, Result, SubjectKey,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Document field holding the ordered term tree
pub const TERMS_FIELD: &str = "terms";

/// A node in an ordered term tree
///
/// Child order is semantically meaningful. Ids are assigned by the mutator
/// at insertion time, never by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermNode {
    /// Term id, unique within the tree's store
    pub id: DomainId,
    /// Term label
    pub name: String,
    /// Ordered children
    #[serde(default)]
    pub terms: Vec<TermNode>,
}

impl TermNode {
    /// Create a leaf term; the id is assigned at insertion
    pub fn new(name: impl Into<String>) -> Self {
        TermNode {
            id: DomainId::UNASSIGNED,
            name: name.into(),
            terms: Vec::new(),
        }
    }

    /// Create a term with children; ids are assigned at insertion
    pub fn with_children(name: impl Into<String>, terms: Vec<TermNode>) -> Self {
        TermNode {
            id: DomainId::UNASSIGNED,
            name: name.into(),
            terms,
        }
    }

    /// Find the node with the given id in a forest, depth-first
    fn find_mut(list: &mut [TermNode], id: DomainId) -> Option<&mut TermNode> {
        for node in list {
            if node.id == id {
                return Some(node);
            }
            if let Some(found) = TermNode::find_mut(&mut node.terms, id) {
                return Some(found);
            }
        }
        None
    }
}

/// Render an order array the way validation messages expect: `[2, 3]`
fn format_order(order: &[usize]) -> String {
    let rendered: Vec<String> = order.iter().map(|v| v.to_string()).collect();
    format!("[{}]", rendered.join(", "))
}

/// Validate a reorder window against the current child list
///
/// Every value must index into the window being reordered (not merely the
/// full child list), the window cannot be longer than the child list, and
/// duplicate values are rejected because they would silently drop terms.
fn validate_order(order: &[usize], child_count: usize) -> Result<()> {
    for &value in order {
        if value >= order.len() {
            return Err(Error::Validation(format!(
                "Index value {} greater than array length {} in term order array {}",
                value,
                order.len(),
                format_order(order)
            )));
        }
    }
    if order.len() > child_count {
        return Err(Error::Validation(format!(
            "Term order array {} longer than term list of length {}",
            format_order(order),
            child_count
        )));
    }
    let mut seen = vec![false; order.len()];
    for &value in order {
        if seen[value] {
            return Err(Error::Validation(format!(
                "Duplicate index value {} in term order array {}",
                value,
                format_order(order)
            )));
        }
        seen[value] = true;
    }
    Ok(())
}

/// Mutates ordered term trees with write-access enforcement
pub struct TreeMutator {
    store: Arc<dyn DocumentStore>,
    ids: Arc<dyn IdGenerator>,
}

impl TreeMutator {
    /// Create a mutator drawing term ids from `ids`
    pub fn new(store: Arc<dyn DocumentStore>, ids: Arc<dyn IdGenerator>) -> Self {
        TreeMutator { store, ids }
    }

    fn assign_ids(&self, term: &mut TermNode) {
        term.id = self.ids.next_id();
        for child in &mut term.terms {
            self.assign_ids(child);
        }
    }

    /// Fetch, permission-check, edit, persist, re-fetch
    ///
    /// Returns None without mutating when the root is missing, the subject
    /// lacks write access, or the parent term has vanished. The edit
    /// closure returns whether anything changed; an unchanged tree skips
    /// the write and returns the root as-is.
    fn mutate<F>(
        &self,
        subject: &SubjectKey,
        root: &Reference,
        parent_term_id: DomainId,
        edit: F,
    ) -> Result<Option<DomainDocument>>
    where
        F: FnOnce(&mut Vec<TermNode>) -> Result<bool>,
    {
        let Some(value) = self
            .store
            .find_by_id(root.collection(), root.target_id())?
        else {
            return Ok(None);
        };
        let doc = DomainDocument::from_value(value)?;
        if !has_write_access(&doc, subject)? {
            debug!(%root, subject = %subject, "tree mutation denied");
            return Ok(None);
        }

        let mut terms: Vec<TermNode> = match doc.attribute(TERMS_FIELD) {
            Some(raw) => serde_json::from_value(raw.clone())?,
            None => Vec::new(),
        };

        let children: &mut Vec<TermNode> = if parent_term_id == root.target_id() {
            &mut terms
        } else {
            match TermNode::find_mut(&mut terms, parent_term_id) {
                Some(parent) => &mut parent.terms,
                None => return Ok(None),
            }
        };

        if !edit(children)? {
            return Ok(Some(doc));
        }

        let mut fields = Map::new();
        fields.insert(TERMS_FIELD.to_string(), serde_json::to_value(&terms)?);
        fields.insert(
            "updated_date".to_string(),
            Value::from(Timestamp::now().as_micros()),
        );
        self.store
            .update_fields(root.collection(), root.target_id(), fields)?;

        match self
            .store
            .find_by_id(root.collection(), root.target_id())?
        {
            Some(refreshed) => Ok(Some(DomainDocument::from_value(refreshed)?)),
            None => Ok(None),
        }
    }

    /// Insert terms into a parent's child list at a position
    ///
    /// Children at and after `position` shift right; the final order is
    /// `[0, position) + new_terms + [position, end)`. Every inserted node
    /// (including nested descendants) receives a fresh generated id.
    ///
    /// Returns None without mutating when the subject lacks write access
    /// or the root/parent is gone.
    ///
    /// # Errors
    /// [`Error::Validation`] when `position` exceeds the child count.
    pub fn insert_terms(
        &self,
        subject: &SubjectKey,
        root: &Reference,
        parent_term_id: DomainId,
        mut new_terms: Vec<TermNode>,
        position: usize,
    ) -> Result<Option<DomainDocument>> {
        self.mutate(subject, root, parent_term_id, |children| {
            if position > children.len() {
                return Err(Error::Validation(format!(
                    "Insert position {} greater than term list length {}",
                    position,
                    children.len()
                )));
            }
            if new_terms.is_empty() {
                return Ok(false);
            }
            for term in &mut new_terms {
                self.assign_ids(term);
            }
            children.splice(position..position, new_terms);
            Ok(true)
        })
    }

    /// Rearrange a prefix of a parent's child list
    ///
    /// `order` is interpreted positionally: the child that should occupy
    /// position `i` is the one currently at index `order[i]`. The window
    /// may be shorter than the child list; the remaining suffix keeps its
    /// original relative order.
    ///
    /// Returns None without mutating when the subject lacks write access
    /// or the root/parent is gone.
    ///
    /// # Errors
    /// [`Error::Validation`] for an index outside the reorder window, a
    /// window longer than the child list, or duplicate indices. The child
    /// list is left completely unchanged in every error case.
    pub fn reorder_terms(
        &self,
        subject: &SubjectKey,
        root: &Reference,
        parent_term_id: DomainId,
        order: &[usize],
    ) -> Result<Option<DomainDocument>> {
        self.mutate(subject, root, parent_term_id, |children| {
            validate_order(order, children.len())?;
            if order.is_empty() {
                return Ok(false);
            }
            let mut rearranged: Vec<TermNode> = Vec::with_capacity(children.len());
            for &from in order {
                rearranged.push(children[from].clone());
            }
            rearranged.extend_from_slice(&children[order.len()..]);
            *children = rearranged;
            Ok(true)
        })
    }

    /// Remove the child with the given id from a parent's child list
    ///
    /// A child id not present among the current children is a no-op
    /// returning the unchanged root.
    ///
    /// Returns None without mutating when the subject lacks write access
    /// or the root/parent is gone.
    ///
    /// # Errors
    /// Storage failures propagate.
    pub fn remove_term(
        &self,
        subject: &SubjectKey,
        root: &Reference,
        parent_term_id: DomainId,
        term_id: DomainId,
    ) -> Result<Option<DomainDocument>> {
        self.mutate(subject, root, parent_term_id, |children| {
            let before = children.len();
            children.retain(|term| term.id != term_id);
            Ok(children.len() != before)
        })
    }
}
