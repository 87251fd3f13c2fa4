// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Convenience built on the runtime.
//!
//! - [`Debounce`] and [`Throttle`] rate-limit an action on the host timer.
//! - [`lazy_media`] watches images, frames and videos with the usual
//!   presets, fades them in once loaded and flags the root element.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::Cell;
use core::fmt;

use crate::defer::{Defer, DomOptions, WeakDefer};
use crate::host::{Document, Host, Settle, Timer, TimerId};
use crate::time::Delay;
use crate::trace::Operation;
use crate::watch::ObserverOptions;

/// Selector for lazily revealed images and styled elements.
pub const IMAGE_SELECTOR: &str = "img[data-src],[data-style]";

/// Selector for lazily revealed frames and videos.
pub const FRAME_SELECTOR: &str = "iframe[data-src],frame[data-src],video[data-src]";

/// Class added to media revealed by [`lazy_media`].
pub const MEDIA_CLASS: &str = "lazied";

/// Delay before [`lazy_media`] queries the page.
pub const MEDIA_DELAY: Delay = Delay(10);

/// Class added to revealed media once its source has loaded.
pub const LOADED_CLASS: &str = "in";

/// Root element class removed by [`lazy_media`].
pub const ROOT_PENDING_CLASS: &str = "no-deferjs";

/// Root element class added by [`lazy_media`].
pub const ROOT_READY_CLASS: &str = "deferjs";

/// Watches page media for lazy reveal.
///
/// Images and `data-style` elements are revealed once within half a viewport
/// of being visible; frames and videos within a full viewport. Revealed
/// elements get the [`MEDIA_CLASS`] class, and [`LOADED_CLASS`] when their
/// source finishes loading.
///
/// The root element trades [`ROOT_PENDING_CLASS`] for [`ROOT_READY_CLASS`]
/// right away, so stylesheets can tell the runtime is present.
pub fn lazy_media<H: Host>(defer: &Defer<H>) {
    flag_root(defer);
    defer.dom(
        DomOptions::new()
            .selector(IMAGE_SELECTOR)
            .delay(MEDIA_DELAY)
            .unveiled_class(MEDIA_CLASS)
            .resolver(fade_in(defer))
            .observer(ObserverOptions::with_root_margin("50%")),
    );
    defer.dom(
        DomOptions::new()
            .selector(FRAME_SELECTOR)
            .delay(MEDIA_DELAY)
            .unveiled_class(MEDIA_CLASS)
            .resolver(fade_in(defer))
            .observer(ObserverOptions::with_root_margin("100%")),
    );
}

fn flag_root<H: Host>(defer: &Defer<H>) {
    let host = defer.host();
    let Some(root) = host.root_element() else {
        return;
    };
    let flagged = host
        .remove_class(&root, ROOT_PENDING_CLASS)
        .and_then(|()| host.add_class(&root, ROOT_READY_CLASS));
    if let Err(error) = flagged {
        defer.report(Operation::Reveal, error);
    }
}

/// A resolver that never declines. It adds [`LOADED_CLASS`] once the element
/// loads, or at once when its `src` already is the deferred one.
fn fade_in<H: Host>(defer: &Defer<H>) -> impl Fn(&H::Node) -> bool + 'static {
    let weak = defer.downgrade();
    move |node: &H::Node| {
        let Some(defer) = weak.upgrade() else {
            return true;
        };
        let host = defer.host();
        let current = host.attribute(node, "src");
        if current.is_some() && current == host.attribute(node, "data-src") {
            mark_loaded(&defer, node);
        } else {
            let weak = defer.downgrade();
            let loaded = node.clone();
            host.on_settle(
                node,
                Box::new(move |settle| {
                    if settle == Settle::Loaded {
                        if let Some(defer) = weak.upgrade() {
                            mark_loaded(&defer, &loaded);
                        }
                    }
                }),
            );
        }
        true
    }
}

fn mark_loaded<H: Host>(defer: &Defer<H>, node: &H::Node) {
    if let Err(error) = defer.host().add_class(node, LOADED_CLASS) {
        defer.report(Operation::Reveal, error);
    }
}

/// Shared state of a rate limiter.
struct Limiter<H: Host> {
    defer: Defer<H>,
    delay: Delay,
    pending: Rc<Cell<Option<TimerId>>>,
    action: Rc<dyn Fn()>,
}

impl<H: Host> Limiter<H> {
    fn new(defer: &Defer<H>, delay: Delay, action: Rc<dyn Fn()>) -> Self {
        Self {
            defer: defer.clone(),
            delay,
            pending: Rc::new(Cell::new(None)),
            action,
        }
    }

    fn arm(&self) {
        let pending = Rc::clone(&self.pending);
        let action = Rc::clone(&self.action);
        let id = self.defer.host().set_timeout(
            Box::new(move || {
                pending.set(None);
                action();
            }),
            self.delay,
        );
        self.pending.set(Some(id));
    }

    fn cancel(&self) {
        if let Some(id) = self.pending.take() {
            self.defer.host().clear_timeout(id);
        }
    }

    fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}

/// Runs an action once calls stop arriving for a quiet period.
///
/// Each [`call`](Self::call) restarts the timer, so a burst of calls runs the
/// action once, `delay` after the last of them.
pub struct Debounce<H: Host> {
    limiter: Limiter<H>,
}

impl<H: Host> Debounce<H> {
    /// Wraps `action`.
    pub fn new(defer: &Defer<H>, delay: Delay, action: impl Fn() + 'static) -> Self {
        Self {
            limiter: Limiter::new(defer, delay, Rc::new(action)),
        }
    }

    /// Requests a run.
    pub fn call(&self) {
        self.limiter.cancel();
        self.limiter.arm();
    }

    /// Drops a pending run.
    pub fn cancel(&self) {
        self.limiter.cancel();
    }

    /// Returns `true` if a run is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.limiter.is_pending()
    }
}

impl<H: Host> fmt::Debug for Debounce<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounce")
            .field("delay", &self.limiter.delay)
            .field("pending", &self.limiter.is_pending())
            .finish_non_exhaustive()
    }
}

/// Runs an action at most once per window.
///
/// The first [`call`](Self::call) opens a window of `delay`; the action runs
/// when it closes. Calls inside an open window are absorbed.
pub struct Throttle<H: Host> {
    limiter: Limiter<H>,
}

impl<H: Host> Throttle<H> {
    /// Wraps `action`.
    pub fn new(defer: &Defer<H>, delay: Delay, action: impl Fn() + 'static) -> Self {
        Self {
            limiter: Limiter::new(defer, delay, Rc::new(action)),
        }
    }

    /// Requests a run.
    pub fn call(&self) {
        if !self.limiter.is_pending() {
            self.limiter.arm();
        }
    }

    /// Drops a pending run.
    pub fn cancel(&self) {
        self.limiter.cancel();
    }

    /// Returns `true` if a window is open.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.limiter.is_pending()
    }
}

impl<H: Host> fmt::Debug for Throttle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("delay", &self.limiter.delay)
            .field("pending", &self.limiter.is_pending())
            .finish_non_exhaustive()
    }
}
