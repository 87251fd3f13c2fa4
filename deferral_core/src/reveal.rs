// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reveal engine.
//!
//! Markup defers a resource by writing its attributes under a placeholder
//! prefix (`data-src`, `data-srcset`, `data-style`, ...). Revealing a node
//! promotes each such attribute to its live name (`src`, `srcset`, `style`),
//! which makes the host start fetching.
//!
//! [`reveal`] does this for one node:
//!
//! 1. Skip the node if it was revealed before (side table, see
//!    [`marks`](crate::marks)).
//! 2. Ask the resolver, if any. `false` leaves the node and everything below
//!    it untouched and unmarked.
//! 3. Mark the node.
//! 4. Reveal descendant `source`/`img` nodes, depth-first.
//! 5. Promote the node's placeholder attributes.
//! 6. Add the unveiled class names.
//! 7. Ask the host to reload the node's media, if it has any.
//!
//! No borrow of the side table is held while the resolver runs, so a
//! resolver may itself reveal other nodes.

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::error::HostError;
use crate::host::Document;
use crate::marks::NodeMarks;

/// Gate consulted before a node is revealed. Returning `false` declines.
pub type Resolver<N> = Rc<dyn Fn(&N) -> bool>;

/// Naming conventions used by the reveal engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealConfig {
    /// Prefix marking a placeholder attribute.
    pub placeholder_prefix: &'static str,
    /// Selector for descendants revealed along with their ancestor.
    pub descendant_selector: &'static str,
}

impl RevealConfig {
    /// The web convention: `data-*` placeholders, `source`/`img` children.
    pub const WEB: Self = Self {
        placeholder_prefix: "data-",
        descendant_selector: "source,img",
    };
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self::WEB
    }
}

/// What a successful reveal changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RevealReport {
    /// Placeholder attributes promoted on the node itself.
    pub promoted: usize,
    /// Descendants revealed along with the node.
    pub descendants: usize,
    /// Whether unveiled class names were added.
    pub tagged: bool,
    /// Whether the host reloaded the node's media.
    pub reloaded: bool,
}

/// Result of [`reveal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The node was revealed now.
    Revealed(RevealReport),
    /// The node had been revealed before; nothing changed.
    AlreadyRevealed,
    /// The resolver returned `false`; nothing changed.
    Declined,
}

/// Maps placeholder attributes to `(live name, value)` pairs.
///
/// Attributes whose name is just the prefix are ignored.
#[must_use]
pub fn promotions(attributes: &[(String, String)], prefix: &str) -> Vec<(String, String)> {
    attributes
        .iter()
        .filter_map(|(name, value)| {
            let live = name.strip_prefix(prefix)?;
            (!live.is_empty()).then(|| (live.to_string(), value.clone()))
        })
        .collect()
}

/// Splits a class string into its individual class names.
pub fn class_names(classes: &str) -> impl Iterator<Item = &str> {
    classes.split_ascii_whitespace()
}

/// Reveals `node`. See the [module docs](self) for the exact steps.
pub fn reveal<D>(
    doc: &D,
    revealed: &RefCell<D::Marks>,
    config: &RevealConfig,
    node: &D::Node,
    unveiled_class: Option<&str>,
    resolver: Option<&Resolver<D::Node>>,
) -> Result<Outcome, HostError>
where
    D: Document + ?Sized,
{
    if revealed.borrow().is_marked(node) {
        return Ok(Outcome::AlreadyRevealed);
    }
    if let Some(resolver) = resolver
        && !resolver(node)
    {
        return Ok(Outcome::Declined);
    }
    if !revealed.borrow_mut().mark(node) {
        // The resolver revealed it in the meantime.
        return Ok(Outcome::AlreadyRevealed);
    }

    let mut report = RevealReport::default();

    for child in doc.query_all(config.descendant_selector, Some(node))? {
        if let Outcome::Revealed(_) = reveal(doc, revealed, config, &child, None, None)? {
            report.descendants += 1;
        }
    }

    for (live, value) in promotions(&doc.attributes(node), config.placeholder_prefix) {
        doc.set_attribute(node, &live, &value)?;
        report.promoted += 1;
    }

    if let Some(classes) = unveiled_class {
        for class in class_names(classes) {
            doc.add_class(node, class)?;
            report.tagged = true;
        }
    }

    report.reloaded = doc.reload_media(node);
    Ok(Outcome::Revealed(report))
}
