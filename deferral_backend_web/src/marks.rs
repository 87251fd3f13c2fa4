// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element side tables backed by a JS `WeakSet`.

use deferral_core::marks::NodeMarks;
use js_sys::WeakSet;
use web_sys::Element;

/// [`NodeMarks`] over a `WeakSet`: marking never keeps an element alive,
/// and elements removed from the page drop out of the table with them.
#[derive(Clone, Debug)]
pub struct WeakMarks {
    set: WeakSet,
}

impl WeakMarks {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            set: WeakSet::new(),
        }
    }
}

impl Default for WeakMarks {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeMarks<Element> for WeakMarks {
    fn mark(&mut self, node: &Element) -> bool {
        if self.set.has(node) {
            return false;
        }
        self.set.add(node);
        true
    }

    fn is_marked(&self, node: &Element) -> bool {
        self.set.has(node)
    }

    fn unmark(&mut self, node: &Element) {
        self.set.delete(node);
    }
}
