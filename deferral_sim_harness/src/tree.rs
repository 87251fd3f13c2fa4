// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element arena for the simulated page.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use deferral_core::host::Settle;

/// Handle to a simulated element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

pub(crate) struct Element {
    pub(crate) tag: String,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) text: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) settle: Option<Box<dyn FnOnce(Settle)>>,
    pub(crate) reloads: u32,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            settle: None,
            reloads: 0,
        }
    }

    pub(crate) fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn set_attribute(&mut self, name: &str, value: &str) {
        match self
            .attributes
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value.to_string(),
            None => self
                .attributes
                .push((name.to_ascii_lowercase(), value.to_string())),
        }
    }

    pub(crate) fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|c| c.split_ascii_whitespace().any(|c| c == class))
    }
}

/// The element tree: a root `html` element with `head` and `body`.
pub(crate) struct Tree {
    elements: Vec<Element>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
}

impl Tree {
    pub(crate) fn new() -> Self {
        let (root, head, body) = (NodeId(0), NodeId(1), NodeId(2));
        let mut tree = Self {
            elements: vec![
                Element::new("html"),
                Element::new("head"),
                Element::new("body"),
            ],
            root,
            head,
            body,
        };
        tree.append(root, head);
        tree.append(root, body);
        tree
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn head(&self) -> NodeId {
        self.head
    }

    pub(crate) fn body(&self) -> NodeId {
        self.body
    }

    pub(crate) fn get(&self, node: NodeId) -> &Element {
        &self.elements[node.index()]
    }

    pub(crate) fn get_mut(&mut self, node: NodeId) -> &mut Element {
        &mut self.elements[node.index()]
    }

    pub(crate) fn create(&mut self, tag: &str) -> NodeId {
        let id = NodeId(u32::try_from(self.elements.len()).unwrap_or(u32::MAX));
        self.elements.push(Element::new(tag));
        id
    }

    pub(crate) fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.get_mut(node).parent.take() {
            self.get_mut(parent).children.retain(|&c| c != node);
        }
    }

    pub(crate) fn append(&mut self, parent: NodeId, node: NodeId) {
        self.detach(node);
        self.get_mut(node).parent = Some(parent);
        self.get_mut(parent).children.push(node);
    }

    /// Puts `new` at `old`'s position and detaches `old`.
    ///
    /// Returns `false` if `old` has no parent.
    pub(crate) fn replace(&mut self, old: NodeId, new: NodeId) -> bool {
        let Some(parent) = self.get(old).parent else {
            return false;
        };
        self.detach(new);
        let children = &mut self.get_mut(parent).children;
        if let Some(slot) = children.iter_mut().find(|c| **c == old) {
            *slot = new;
        }
        self.get_mut(new).parent = Some(parent);
        self.get_mut(old).parent = None;
        true
    }

    pub(crate) fn is_connected(&self, node: NodeId) -> bool {
        self.ancestors(node).last().unwrap_or(node) == self.root
    }

    /// Ancestors from the parent up to the topmost.
    pub(crate) fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        core::iter::successors(self.get(node).parent, |&n| self.get(n).parent)
    }

    /// Descendants of `node` in document order, excluding `node`.
    pub(crate) fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.get(node).children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.get(n).children.iter().rev().copied());
        }
        out
    }
}
