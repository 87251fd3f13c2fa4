// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visibility watching.
//!
//! A [`Watch`] takes nodes and, at some point, reports each one as visible.
//! There are two implementations:
//!
//! - the host's intersection observer ([`Visibility::Observer`]), which
//!   reports a node the first time it enters the viewport, and
//! - [`ImmediateWatch`], which reports every node as visible on the spot.
//!
//! Which one is used is decided once, when the runtime is built, by
//! [`Capability::detect`]. [`Watcher`] wraps either behind one type.
//!
//! [`Visibility::Observer`]: crate::host::Visibility::Observer

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::host::Visibility;

/// Options for an intersection observer.
///
/// Mirrors the `rootMargin` and `threshold` members of the web
/// `IntersectionObserverInit` dictionary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObserverOptions {
    /// Margin grown around the viewport before testing intersection, in CSS
    /// margin syntax (e.g. `"50%"` or `"0px 0px 200px 0px"`).
    pub root_margin: Option<String>,
    /// Visible-area ratios at which to report. Empty means the host default.
    pub thresholds: Vec<f64>,
}

impl ObserverOptions {
    /// Options with only a root margin set.
    #[must_use]
    pub fn with_root_margin(margin: impl Into<String>) -> Self {
        Self {
            root_margin: Some(margin.into()),
            thresholds: Vec::new(),
        }
    }
}

/// Something that reports watched nodes as visible.
pub trait Watch<N> {
    /// Starts watching `node`.
    fn watch(&self, node: N);
}

/// A [`Watch`] that reports every node as visible immediately.
pub struct ImmediateWatch<N> {
    on_visible: Rc<dyn Fn(N)>,
}

impl<N> ImmediateWatch<N> {
    /// Creates a watcher that forwards each node straight to `on_visible`.
    #[must_use]
    pub fn new(on_visible: Rc<dyn Fn(N)>) -> Self {
        Self { on_visible }
    }
}

impl<N> Watch<N> for ImmediateWatch<N> {
    fn watch(&self, node: N) {
        (self.on_visible)(node);
    }
}

impl<N> fmt::Debug for ImmediateWatch<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImmediateWatch").finish_non_exhaustive()
    }
}

/// Which visibility strategy the host supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Observe viewport intersection.
    Intersection,
    /// No observation; reveal at once.
    Immediate,
}

impl Capability {
    /// Feature-detects the host's capability.
    #[must_use]
    pub fn detect<V: Visibility + ?Sized>(host: &V) -> Self {
        if host.supports_intersection() {
            Self::Intersection
        } else {
            Self::Immediate
        }
    }
}

/// Either the host's observer or the immediate fallback.
pub enum Watcher<O, N> {
    /// Host intersection observer.
    Observer(O),
    /// Immediate fallback.
    Immediate(ImmediateWatch<N>),
}

impl<O, N> Watcher<O, N>
where
    O: Watch<N>,
{
    /// Builds the watcher for `capability`.
    ///
    /// With [`Capability::Intersection`], `make_observer` is asked for the
    /// host observer; if it fails, this falls back to [`ImmediateWatch`].
    pub fn select<E>(
        capability: Capability,
        on_visible: Rc<dyn Fn(N)>,
        make_observer: impl FnOnce(Rc<dyn Fn(N)>) -> Result<O, E>,
    ) -> Result<Self, (E, Self)> {
        match capability {
            Capability::Immediate => Ok(Self::Immediate(ImmediateWatch::new(on_visible))),
            Capability::Intersection => match make_observer(Rc::clone(&on_visible)) {
                Ok(observer) => Ok(Self::Observer(observer)),
                Err(e) => Err((e, Self::Immediate(ImmediateWatch::new(on_visible)))),
            },
        }
    }

    /// Returns `true` if this is the immediate fallback.
    #[must_use]
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Immediate(_))
    }
}

impl<O: Watch<N>, N> Watch<N> for Watcher<O, N> {
    fn watch(&self, node: N) {
        match self {
            Self::Observer(o) => o.watch(node),
            Self::Immediate(i) => i.watch(node),
        }
    }
}

impl<O, N> fmt::Debug for Watcher<O, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Observer(_) => f.write_str("Watcher::Observer"),
            Self::Immediate(_) => f.write_str("Watcher::Immediate"),
        }
    }
}
