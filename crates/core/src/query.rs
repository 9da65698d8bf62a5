//! Query descriptors for the storage collaborator
//!
//! The core issues queries as (collection, filter, page) tuples; the exact
//! query language is an implementation detail of the chosen storage engine.
//! A [`Filter`] is a conjunction of top-level field equality conditions,
//! which is all this access layer needs: id lookups, compound lock-triple
//! matches, and reverse-reference field matches.

use serde_json::Value;

/// Conjunction of field equality conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// A filter matching every document
    pub fn new() -> Self {
        Filter::default()
    }

    /// Start a filter with a single equality condition
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Filter {
            conditions: vec![(field.into(), value)],
        }
    }

    /// Add another equality condition (conjunction)
    pub fn and_eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.conditions.push((field.into(), value));
        self
    }

    /// The equality conditions in insertion order
    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// Whether a document satisfies every condition
    ///
    /// Non-object documents match only the empty filter.
    pub fn matches(&self, doc: &Value) -> bool {
        match doc.as_object() {
            Some(fields) => self
                .conditions
                .iter()
                .all(|(field, value)| fields.get(field) == Some(value)),
            None => self.conditions.is_empty(),
        }
    }
}

/// Pagination window
///
/// `limit = -1` means "all remaining results".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Number of leading results to skip
    pub offset: usize,
    /// Maximum results to return, or -1 for all
    pub limit: i64,
}

impl Page {
    /// The unbounded page: no offset, no limit
    pub const ALL: Page = Page {
        offset: 0,
        limit: -1,
    };

    /// Create a page window
    pub fn new(offset: usize, limit: i64) -> Self {
        Page { offset, limit }
    }

    /// Apply this window to an ordered result list
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        if self.limit < 0 {
            iter.collect()
        } else {
            iter.take(self.limit as usize).collect()
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::ALL
    }
}
