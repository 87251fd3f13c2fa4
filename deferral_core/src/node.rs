// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Idempotent element creation.
//!
//! [`create_node`] builds an element from a tag name and a [`NodeSpec`]. If
//! it carries an identifier and an element with that id already
//! exists, the existing element is returned instead, which is what keeps
//! `css`/`js` calls with the same id from inserting a resource twice.
//!
//! Attaching the element is always a separate, explicit step.

use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::HostError;
use crate::host::{Document, Settle};

/// The `idOrAttributes` argument: how to identify or decorate a new element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum NodeSpec {
    /// No identifier, no extra attributes.
    #[default]
    Anonymous,
    /// Just an `id`.
    Id(String),
    /// Arbitrary attributes, applied in order. An `id` entry doubles as the
    /// identifier.
    Attributes(Vec<(String, String)>),
}

impl NodeSpec {
    /// Returns the identifier, if there is one.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Id(id) => Some(id.as_str()).filter(|id| !id.is_empty()),
            Self::Attributes(attrs) => attrs
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("id"))
                .map(|(_, value)| value.as_str())
                .filter(|id| !id.is_empty()),
        }
    }

    /// Builds a node spec from `(name, value)` pairs.
    #[must_use]
    pub fn attributes<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::Attributes(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<&str> for NodeSpec {
    fn from(id: &str) -> Self {
        Self::Id(id.to_owned())
    }
}

impl From<String> for NodeSpec {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

/// Result of [`create_node`].
#[derive(Clone, Debug)]
pub struct Created<N> {
    /// The element.
    pub node: N,
    /// `false` if an existing element with the same id was returned.
    pub fresh: bool,
}

/// Returns the element identified by `spec`, or creates it.
///
/// A fresh element gets the id or attributes from `spec` and, if given, `on_load`
/// bound to its load event (not its error event). An existing element is
/// returned untouched.
pub fn create_node<D>(
    doc: &D,
    tag: &str,
    spec: &NodeSpec,
    on_load: Option<Box<dyn FnOnce()>>,
) -> Result<Created<D::Node>, HostError>
where
    D: Document + ?Sized,
{
    if let Some(existing) = spec.id().and_then(|id| doc.element_by_id(id)) {
        return Ok(Created {
            node: existing,
            fresh: false,
        });
    }

    let node = doc.create_element(tag)?;
    match spec {
        NodeSpec::Anonymous => {}
        NodeSpec::Id(id) => doc.set_attribute(&node, "id", id)?,
        NodeSpec::Attributes(attrs) => {
            for (name, value) in attrs {
                doc.set_attribute(&node, name, value)?;
            }
        }
    }
    if let Some(on_load) = on_load {
        doc.on_settle(
            &node,
            Box::new(move |settle| {
                if settle == Settle::Loaded {
                    on_load();
                }
            }),
        );
    }
    Ok(Created { node, fresh: true })
}
