// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host contract for page integrations.
//!
//! The runtime never touches a real page. Everything it needs from its
//! environment is split into four traits, each a seam that a *host* crate
//! implements:
//!
//! - **[`Timer`]**: the macrotask dispatcher. It hands a [`Task`] plus a
//!   [`Delay`] to the host timer (`setTimeout` on the web), reads the clock
//!   and cancels pending timers.
//!
//! - **[`Lifecycle`]**: whether the load-equivalent event has
//!   already happened, a one-shot load handler, and the qualifying user
//!   gesture listeners.
//!
//! - **[`Document`]**: element query, creation, attributes, text, class
//!   list, head attachment, replacement, media reload, and load/error events.
//!
//! - **[`Visibility`]**: the optional intersection-observation capability.
//!   Hosts without it report `false` from
//!   [`supports_intersection`](Visibility::supports_intersection) and the
//!   runtime falls back to immediate reveal.
//!
//! [`Host`] is the union of all four and is what
//! [`Defer`](crate::defer::Defer) is generic over.
//!
//! # Crate boundaries
//!
//! `deferral_core` owns scheduling, reveal, reinjection and this contract
//! module. `deferral_backend_web` implements it on a browser page with
//! `web-sys`; `deferral_sim_harness` implements it on a deterministic
//! simulated page for tests.
//!
//! # Callbacks
//!
//! All host callbacks are delivered serially on one thread. Hosts must not
//! invoke a callback synchronously from inside the call that registered it
//! (e.g. `set_timeout` never runs its task inline); the runtime relies on
//! that to keep its interior borrows short.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::HostError;
use crate::marks::NodeMarks;
use crate::time::{Delay, HostTime};
use crate::watch::{ObserverOptions, Watch};

/// A unit of deferred work handed to the host timer.
pub type Task = Box<dyn FnOnce()>;

/// Handle to a pending host timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(pub i32);

/// Outcome of a resource element's load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Settle {
    /// The `load` event fired.
    Loaded,
    /// The `error` event fired.
    Failed,
}

/// The macrotask dispatcher and clock.
pub trait Timer {
    /// Returns the current host time.
    fn now(&self) -> HostTime;

    /// Runs `task` on a future macrotask, no earlier than `delay` from now.
    fn set_timeout(&self, task: Task, delay: Delay) -> TimerId;

    /// Cancels a timer that has not fired yet. Unknown ids are ignored.
    fn clear_timeout(&self, id: TimerId);
}

/// Page lifecycle events.
pub trait Lifecycle {
    /// Returns `true` if the load-equivalent event has already fired.
    fn is_loaded(&self) -> bool;

    /// Registers a one-shot handler for the load-equivalent event.
    fn on_page_load(&self, handler: Task);

    /// Attaches `handler` to every qualifying gesture event (touch, mouse
    /// move, mouse down, key, wheel). Replaces any previous handler.
    fn listen_gestures(&self, handler: Rc<dyn Fn()>);

    /// Detaches the gesture handler. A no-op if none is attached.
    fn unlisten_gestures(&self);
}

/// Element operations on the host document.
pub trait Document {
    /// An element handle. Clones refer to the same element.
    type Node: Clone + 'static;

    /// The identity-keyed side table used for idempotency markers.
    type Marks: NodeMarks<Self::Node> + 'static;

    /// Returns a fresh, empty side table.
    fn new_marks(&self) -> Self::Marks;

    /// Returns every element matching `selector`, in document order.
    ///
    /// With `scope`, only descendants of that element are considered.
    fn query_all(
        &self,
        selector: &str,
        scope: Option<&Self::Node>,
    ) -> Result<Vec<Self::Node>, HostError>;

    /// Returns the element with the given `id` attribute, if any.
    fn element_by_id(&self, id: &str) -> Option<Self::Node>;

    /// Returns the root element of the document.
    fn root_element(&self) -> Option<Self::Node>;

    /// Creates a detached element.
    fn create_element(&self, tag: &str) -> Result<Self::Node, HostError>;

    /// Returns all attributes of `node` in declaration order.
    fn attributes(&self, node: &Self::Node) -> Vec<(String, String)>;

    /// Returns one attribute value.
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Sets one attribute.
    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str) -> Result<(), HostError>;

    /// Returns the inline text content.
    fn text(&self, node: &Self::Node) -> String;

    /// Replaces the inline text content.
    fn set_text(&self, node: &Self::Node, text: &str);

    /// Adds one class name to the class list (no duplicates).
    fn add_class(&self, node: &Self::Node, class: &str) -> Result<(), HostError>;

    /// Removes one class name from the class list, if present.
    fn remove_class(&self, node: &Self::Node, class: &str) -> Result<(), HostError>;

    /// Appends `node` to the document head.
    fn append_to_head(&self, node: &Self::Node) -> Result<(), HostError>;

    /// Puts `new` where `old` is in the tree and detaches `old`.
    ///
    /// If `old` is detached, `new` is appended to the head instead.
    fn replace(&self, old: &Self::Node, new: &Self::Node) -> Result<(), HostError>;

    /// Invokes the element's media reload capability, if it has one.
    ///
    /// Returns `false` for elements without one.
    fn reload_media(&self, node: &Self::Node) -> bool;

    /// Binds a one-shot handler to the element's `load` and `error` events.
    ///
    /// Whichever fires first calls `handler`; later events are ignored.
    fn on_settle(&self, node: &Self::Node, handler: Box<dyn FnOnce(Settle)>);
}

/// The optional intersection-observation capability.
pub trait Visibility: Document {
    /// The observer type handed out by
    /// [`intersection_observer`](Self::intersection_observer).
    type Observer: Watch<Self::Node> + 'static;

    /// Returns `true` if the host can observe viewport intersection.
    fn supports_intersection(&self) -> bool;

    /// Creates an observer that, when a watched node first intersects,
    /// stops watching it and calls `on_visible` with it.
    fn intersection_observer(
        &self,
        options: &ObserverOptions,
        on_visible: Rc<dyn Fn(Self::Node)>,
    ) -> Result<Self::Observer, HostError>;
}

/// Everything the runtime needs from its environment.
pub trait Host: Timer + Lifecycle + Visibility + 'static {}

impl<T> Host for T where T: Timer + Lifecycle + Visibility + 'static {}
