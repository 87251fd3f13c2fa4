// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ordered script reinjection.
//!
//! Deferred scripts are written with a marker `type` (`type="deferjs"`) so the
//! host parses but never runs them. Reinjection swaps each one for a freshly
//! created equivalent, which the host does run. A new element is required:
//! re-typing or moving the old one does not trigger evaluation.
//!
//! Order matters. A *blocking* script (one with a `src` and no `async`
//! attribute) must finish loading, or fail, before the next script is
//! attached, exactly as the parser would have run them. Everything else
//! advances at once.
//!
//! [`Reinjection`] is that ordering rule as an explicit continuation state
//! machine, free of any host:
//!
//! ```text
//!   new(scripts) ──► preload_hints()          (all hints, before any step)
//!        │
//!        ▼
//!   next_step() ──► Step { Gate::Free }     ──► next_step() ...
//!         └──► Step { Gate::Blocking } ──► next_step() == None
//!                                           until settle(seq)
//! ```
//!
//! The runtime binds `settle(seq)` to the replacement's load/error event and
//! keeps calling `next_step()` until it returns `None`.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

/// Attributes copied from a script onto its preload hint.
pub const CACHE_ATTRIBUTES: [&str; 4] = ["crossorigin", "integrity", "referrerpolicy", "nonce"];

/// `type` values that already denote an executable script.
const EXECUTABLE_TYPES: [&str; 4] = ["", "module", "text/javascript", "application/javascript"];

/// A script element waiting to be reinjected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingScript<N> {
    /// The original element.
    pub node: N,
    /// Its attributes, in declaration order.
    pub attributes: Vec<(String, String)>,
    /// Its inline text.
    pub text: String,
}

impl<N> PendingScript<N> {
    /// Creates a pending script from a snapshot of the element.
    #[must_use]
    pub fn new(node: N, attributes: Vec<(String, String)>, text: String) -> Self {
        Self {
            node,
            attributes,
            text,
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the resource URL, if the script has a non-empty `src`.
    #[must_use]
    pub fn src(&self) -> Option<&str> {
        self.attribute("src").filter(|s| !s.is_empty())
    }

    /// Returns `true` if the script carries the `async` marker.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.attribute("async").is_some()
    }

    /// Returns `true` if later scripts must wait for this one to settle.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.src().is_some() && !self.is_async()
    }

    /// Attributes for the replacement element.
    ///
    /// Everything is copied except a `type` that only served as the
    /// deferral marker.
    #[must_use]
    pub fn replacement_attributes(&self) -> Vec<(String, String)> {
        self.attributes
            .iter()
            .filter(|(name, value)| {
                !name.eq_ignore_ascii_case("type")
                    || EXECUTABLE_TYPES
                        .iter()
                        .any(|t| value.trim().eq_ignore_ascii_case(t))
            })
            .cloned()
            .collect()
    }

    /// The preload hint for this script, if it has a resource URL.
    #[must_use]
    pub fn preload_hint(&self) -> Option<PreloadHint> {
        let href = self.src()?;
        let mut attributes = Vec::with_capacity(3 + CACHE_ATTRIBUTES.len());
        attributes.push(("rel".into(), "preload".into()));
        attributes.push(("as".into(), "script".into()));
        attributes.push(("href".into(), href.into()));
        for name in CACHE_ATTRIBUTES {
            if let Some(value) = self.attribute(name) {
                attributes.push((name.into(), value.into()));
            }
        }
        Some(PreloadHint { attributes })
    }
}

/// A `<link rel=preload as=script>` to attach before any script runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreloadHint {
    /// Attributes of the link element, in order.
    pub attributes: Vec<(String, String)>,
}

impl PreloadHint {
    /// Returns the hinted URL.
    #[must_use]
    pub fn href(&self) -> &str {
        self.attributes
            .iter()
            .find(|(n, _)| n == "href")
            .map_or("", |(_, v)| v.as_str())
    }
}

/// Whether a step gates the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gate {
    /// Advance only after this script settles.
    Blocking,
    /// Advance at once.
    Free,
}

/// One script to replace now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step<N> {
    /// Position in the original document order.
    pub seq: usize,
    /// The script.
    pub script: PendingScript<N>,
    /// Whether to wait for it.
    pub gate: Gate,
}

/// Continuation state machine for one reinjection pass.
#[derive(Debug)]
pub struct Reinjection<N> {
    queue: VecDeque<PendingScript<N>>,
    next_seq: usize,
    awaiting: Option<usize>,
    hints: Vec<PreloadHint>,
}

impl<N> Reinjection<N> {
    /// Plans a pass over `scripts`, which must be in document order.
    #[must_use]
    pub fn new(scripts: Vec<PendingScript<N>>) -> Self {
        let hints = scripts
            .iter()
            .filter_map(PendingScript::preload_hint)
            .collect();
        Self {
            queue: scripts.into(),
            next_seq: 0,
            awaiting: None,
            hints,
        }
    }

    /// Preload hints for every script with a resource URL, in order.
    #[must_use]
    pub fn preload_hints(&self) -> &[PreloadHint] {
        &self.hints
    }

    /// Returns the next step, or `None` if the pass is finished or waiting
    /// on a blocking script.
    pub fn next_step(&mut self) -> Option<Step<N>> {
        if self.awaiting.is_some() {
            return None;
        }
        let script = self.queue.pop_front()?;
        let seq = self.next_seq;
        self.next_seq += 1;
        let gate = if script.is_blocking() {
            self.awaiting = Some(seq);
            Gate::Blocking
        } else {
            Gate::Free
        };
        Some(Step { seq, script, gate })
    }

    /// Resolves the continuation of blocking step `seq`.
    ///
    /// Returns `true` if that step was the one being waited on. Duplicate or
    /// stale settles return `false` and change nothing.
    pub fn settle(&mut self, seq: usize) -> bool {
        if self.awaiting == Some(seq) {
            self.awaiting = None;
            true
        } else {
            false
        }
    }

    /// Returns the step currently being waited on.
    #[must_use]
    pub fn awaiting(&self) -> Option<usize> {
        self.awaiting
    }

    /// Returns `true` once every script has been handed out and nothing is
    /// pending.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.queue.is_empty() && self.awaiting.is_none()
    }
}
