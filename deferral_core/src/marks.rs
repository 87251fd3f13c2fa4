// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identity-keyed side tables for idempotency markers.
//!
//! The runtime needs to remember which elements it has already registered
//! for observation and which it has already revealed. Rather than stamping a
//! marker onto caller-owned elements, it keeps the marker in a side table
//! keyed by element identity. Hosts pick the representation: the web backend
//! uses a JS `WeakSet`; hosts whose node handles are [`Ord`] can use
//! [`OrdMarks`].

use alloc::collections::BTreeSet;

/// A set of marked nodes, keyed by node identity.
pub trait NodeMarks<N> {
    /// Marks `node`. Returns `true` if it was not marked before.
    fn mark(&mut self, node: &N) -> bool;

    /// Returns `true` if `node` is marked.
    fn is_marked(&self, node: &N) -> bool;

    /// Clears the mark on `node`, if any.
    fn unmark(&mut self, node: &N);
}

/// [`NodeMarks`] for node handles with a total order.
#[derive(Clone, Debug)]
pub struct OrdMarks<N: Ord> {
    marked: BTreeSet<N>,
}

impl<N: Ord> Default for OrdMarks<N> {
    fn default() -> Self {
        Self {
            marked: BTreeSet::new(),
        }
    }
}

impl<N: Ord> OrdMarks<N> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of marked nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.marked.len()
    }

    /// Returns `true` if nothing is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }
}

impl<N: Ord + Clone> NodeMarks<N> for OrdMarks<N> {
    fn mark(&mut self, node: &N) -> bool {
        self.marked.insert(node.clone())
    }

    fn is_marked(&self, node: &N) -> bool {
        self.marked.contains(node)
    }

    fn unmark(&mut self, node: &N) {
        self.marked.remove(node);
    }
}
