//! Set-valued provenance with explicit lazy clone-on-write
//!
//! A [`Provenance`] is a set of `(order, payload)` entries. Two kinds exist:
//! [`TransformationProvenance`] (which callable ran, with which arguments and
//! RNG state) and [`FeatureProvenance`] (which token spans changed).
//!
//! Sharing is tracked explicitly. A value starts out safe to mutate; once
//! [`Provenance::mark_shared`] is called (for example when the value is stored
//! in a record that children derive from) in-place mutation through
//! [`Provenance::push`] is refused and the consuming helpers clone first.

mod feature;
mod order;
mod transformation;

pub use feature::{FeatureEdit, FeatureProvenance};
pub use order::OrderKey;
pub use transformation::TransformationProvenance;

use crate::errors::{LineageError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One history entry; uniqueness is by the full `(order, payload)` tuple
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProvenanceEntry<P> {
    pub order: OrderKey,
    pub payload: P,
}

impl<P: Clone> ProvenanceEntry<P> {
    pub fn new(order: OrderKey, payload: P) -> Self {
        Self { order, payload }
    }

    fn with_branch(&self, branch: u64) -> Self {
        Self {
            order: self.order.with_branch(branch),
            payload: self.payload.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Provenance<P: Ord> {
    entries: BTreeSet<ProvenanceEntry<P>>,
    shared: bool,
}

impl<P: Ord> Default for Provenance<P> {
    fn default() -> Self {
        Self {
            entries: BTreeSet::new(),
            shared: false,
        }
    }
}

/// A clone is a new, exclusively owned value
impl<P: Ord + Clone> Clone for Provenance<P> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            shared: false,
        }
    }
}

/// Equality is over entries only; the sharing flag is bookkeeping
impl<P: Ord> PartialEq for Provenance<P> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<P: Ord> Eq for Provenance<P> {}

impl<P: Ord + Clone> FromIterator<ProvenanceEntry<P>> for Provenance<P> {
    fn from_iter<I: IntoIterator<Item = ProvenanceEntry<P>>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            shared: false,
        }
    }
}

impl<P: Ord + Clone> Provenance<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in order-key order, which for an unmerged branch is insertion order
    pub fn entries(&self) -> impl Iterator<Item = &ProvenanceEntry<P>> {
        self.entries.iter()
    }

    pub fn payloads(&self) -> impl Iterator<Item = &P> {
        self.entries.iter().map(|e| &e.payload)
    }

    pub fn contains(&self, entry: &ProvenanceEntry<P>) -> bool {
        self.entries.contains(entry)
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Declare that another owner may now observe this value
    pub fn mark_shared(&mut self) {
        self.shared = true;
    }

    /// Hand back an exclusively owned value, copying only if shared
    pub fn clone_if_shared(self) -> Self {
        if self.shared {
            self.clone()
        } else {
            self
        }
    }

    fn next_order(&self) -> OrderKey {
        OrderKey::root(self.entries.len() as u64)
    }

    /// A new provenance equal to `self` plus one entry at `order = len`
    ///
    /// `self` is never touched, so any number of children can derive from the
    /// same parent without observing each other's entries.
    pub fn add(&self, payload: P) -> Self {
        let mut next = self.clone();
        let order = next.next_order();
        next.entries.insert(ProvenanceEntry::new(order, payload));
        next
    }

    /// Consuming variant of [`add`](Self::add): extends in place unless shared
    pub fn into_added(self, payload: P) -> Self {
        let mut owned = self.clone_if_shared();
        let order = owned.next_order();
        owned.entries.insert(ProvenanceEntry::new(order, payload));
        owned
    }

    /// Append in place, returning the new entry's order
    ///
    /// # Errors
    ///
    /// `SharedProvenanceMutation` if the value has been marked shared.
    pub fn push(&mut self, payload: P) -> Result<OrderKey> {
        if self.shared {
            return Err(LineageError::SharedProvenanceMutation);
        }
        let order = self.next_order();
        self.entries
            .insert(ProvenanceEntry::new(order.clone(), payload));
        Ok(order)
    }

    /// Copy of `self` with every order key prefixed by `branch`
    pub fn with_branch_prefix(&self, branch: u64) -> Self {
        self.entries.iter().map(|e| e.with_branch(branch)).collect()
    }

    /// Union of `self` (branch 0) and `others[i]` (branch `i + 1`)
    ///
    /// Only meaningful when joining several parent branches into one child.
    pub fn merge(&self, others: &[&Self]) -> Self {
        let mut merged = self.with_branch_prefix(0);
        for (i, other) in others.iter().enumerate() {
            merged
                .entries
                .extend(other.entries.iter().map(|e| e.with_branch(i as u64 + 1)));
        }
        merged
    }

    /// Entries in `self` that are not in `other` (pure set difference)
    pub fn subtract(&self, other: &Self) -> Self {
        self.entries
            .difference(&other.entries)
            .cloned()
            .collect()
    }

    /// The one entry added since `parent`
    ///
    /// # Errors
    ///
    /// `ProvenanceDeltaMismatch` unless exactly one entry is new.
    pub fn single_delta(&self, parent: &Self) -> Result<ProvenanceEntry<P>> {
        let mut delta = self.entries.difference(&parent.entries);
        match (delta.next(), delta.next()) {
            (Some(entry), None) => Ok(entry.clone()),
            _ => Err(LineageError::ProvenanceDeltaMismatch {
                expected: 1,
                actual: self.entries.difference(&parent.entries).count(),
            }),
        }
    }
}
