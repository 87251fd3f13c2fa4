// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A deterministic simulated page for exercising `deferral_core`.
//!
//! [`SimHost`] implements the whole host contract without a browser:
//!
//! - a virtual millisecond clock and timer queue, driven explicitly with
//!   [`advance`](SimHost::advance) and
//!   [`run_until_idle`](SimHost::run_until_idle),
//! - an element tree (`html` > `head`, `body`) with a small selector matcher,
//! - a network: scripts and stylesheets attached to the document "fetch"
//!   their URL and settle after a per-URL [`Route`],
//! - page load and user gestures, fired with
//!   [`fire_load`](SimHost::fire_load) and [`gesture`](SimHost::gesture),
//! - optional intersection observation, driven with
//!   [`scroll_into_view`](SimHost::scroll_into_view).
//!
//! Everything the runtime does to the page that a user could notice is
//! appended to a [`PageEvent`] journal.
//!
//! Callbacks never run from inside the call that registered them; they run
//! when the test drives the clock or fires an event, with no interior borrow
//! held.

#![no_std]

extern crate alloc;

mod selector;
mod tree;

#[cfg(test)]
mod scenarios;

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::rc::{Rc, Weak};
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use deferral_core::error::HostError;
use deferral_core::host::{Document, Lifecycle, Settle, Task, Timer, TimerId, Visibility};
use deferral_core::marks::OrdMarks;
use deferral_core::time::{Delay, HostTime};
use deferral_core::watch::{ObserverOptions, Watch};

use crate::selector::Selector;
use crate::tree::Tree;
pub use crate::tree::NodeId;

/// `type` values under which a script element runs.
const EXECUTABLE_TYPES: [&str; 4] = ["", "module", "text/javascript", "application/javascript"];

/// Elements that load a new `src` in place.
const MEDIA_TAGS: [&str; 5] = ["img", "iframe", "frame", "video", "audio"];

/// Guard against tasks that keep re-arming themselves forever.
const IDLE_STEP_LIMIT: usize = 100_000;

/// Something the runtime did to the page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageEvent {
    /// An element was connected to the document.
    Attached {
        /// Lowercase tag name.
        tag: String,
        /// The URL it fetches, if any.
        url: Option<String>,
    },
    /// A fetch finished.
    Settled {
        /// Lowercase tag name of the fetching element.
        tag: String,
        /// The fetched URL.
        url: String,
        /// Load or error.
        settle: Settle,
    },
    /// An inline script ran.
    Executed {
        /// The script text.
        text: String,
    },
}

/// How the simulated network answers one URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    /// Load or error.
    pub settle: Settle,
    /// Time from attachment to settle.
    pub latency: Delay,
}

impl Route {
    /// A successful fetch after `latency` milliseconds.
    #[must_use]
    pub const fn ok(latency: u32) -> Self {
        Self {
            settle: Settle::Loaded,
            latency: Delay(latency),
        }
    }

    /// A failed fetch after `latency` milliseconds.
    #[must_use]
    pub const fn fail(latency: u32) -> Self {
        Self {
            settle: Settle::Failed,
            latency: Delay(latency),
        }
    }
}

/// What an intersection observer was created with and is still watching.
#[derive(Clone, Debug, PartialEq)]
pub struct ObserverInfo {
    /// Root margin it was created with.
    pub root_margin: Option<String>,
    /// Nodes still being watched.
    pub watching: Vec<NodeId>,
}

struct PendingTimer {
    id: i32,
    due: u64,
    seq: u64,
    task: Task,
}

struct ObserverRecord {
    root_margin: Option<String>,
    on_visible: Rc<dyn Fn(NodeId)>,
    watching: Vec<NodeId>,
}

struct Page {
    now: u64,
    next_id: i32,
    next_seq: u64,
    timers: Vec<PendingTimer>,
    tree: Tree,
    loaded: bool,
    load_handlers: Vec<Task>,
    gestures: Option<Rc<dyn Fn()>>,
    intersection: bool,
    observers_fail: bool,
    observers: Vec<ObserverRecord>,
    visible: BTreeSet<NodeId>,
    routes: BTreeMap<String, Route>,
    default_route: Route,
    journal: Vec<(HostTime, PageEvent)>,
}

impl Page {
    fn push_timer(&mut self, task: Task, delay: Delay) -> TimerId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(PendingTimer {
            id,
            due: self.now.saturating_add(u64::from(delay.millis())),
            seq,
            task,
        });
        TimerId(id)
    }

    fn record(&mut self, event: PageEvent) {
        self.journal.push((HostTime(self.now), event));
    }
}

/// A simulated page. Clones share the same page.
#[derive(Clone)]
pub struct SimHost {
    page: Rc<RefCell<Page>>,
}

impl fmt::Debug for SimHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let page = self.page.borrow();
        f.debug_struct("SimHost")
            .field("now", &page.now)
            .field("loaded", &page.loaded)
            .field("timers", &page.timers.len())
            .field("intersection", &page.intersection)
            .finish_non_exhaustive()
    }
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// A page that has not loaded yet, without intersection observation.
    /// Unrouted URLs load after 10 ms.
    #[must_use]
    pub fn new() -> Self {
        Self {
            page: Rc::new(RefCell::new(Page {
                now: 0,
                next_id: 1,
                next_seq: 0,
                timers: Vec::new(),
                tree: Tree::new(),
                loaded: false,
                load_handlers: Vec::new(),
                gestures: None,
                intersection: false,
                observers_fail: false,
                observers: Vec::new(),
                visible: BTreeSet::new(),
                routes: BTreeMap::new(),
                default_route: Route::ok(10),
                journal: Vec::new(),
            })),
        }
    }

    fn from_weak(page: &Weak<RefCell<Page>>) -> Option<Self> {
        page.upgrade().map(|page| Self { page })
    }

    // -- setup -------------------------------------------------------------

    /// Enables intersection observation.
    #[must_use]
    pub fn with_intersection(self) -> Self {
        self.page.borrow_mut().intersection = true;
        self
    }

    /// Makes observer construction fail while still reporting support.
    #[must_use]
    pub fn with_failing_observers(self) -> Self {
        {
            let mut page = self.page.borrow_mut();
            page.intersection = true;
            page.observers_fail = true;
        }
        self
    }

    /// Starts the page in the loaded state.
    #[must_use]
    pub fn already_loaded(self) -> Self {
        self.page.borrow_mut().loaded = true;
        self
    }

    /// Routes `url` through the simulated network.
    pub fn route(&self, url: &str, route: Route) {
        self.page.borrow_mut().routes.insert(url.to_string(), route);
    }

    /// Returns the `head` element.
    #[must_use]
    pub fn head(&self) -> NodeId {
        self.page.borrow().tree.head()
    }

    /// Returns the `html` element.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.page.borrow().tree.root()
    }

    /// Returns the `body` element.
    #[must_use]
    pub fn body(&self) -> NodeId {
        self.page.borrow().tree.body()
    }

    /// Adds markup: appends a new element under `parent`.
    ///
    /// Markup is not journaled and fetches nothing.
    pub fn element(&self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let mut page = self.page.borrow_mut();
        let node = page.tree.create(tag);
        for (name, value) in attributes {
            page.tree.get_mut(node).set_attribute(name, value);
        }
        page.tree.append(parent, node);
        node
    }

    /// Adds markup: an inline script with `text` under `parent`.
    pub fn inline_script(&self, parent: NodeId, attributes: &[(&str, &str)], text: &str) -> NodeId {
        let node = self.element(parent, "script", attributes);
        self.page.borrow_mut().tree.get_mut(node).text = text.to_string();
        node
    }

    /// Detaches `node` from the document.
    pub fn detach(&self, node: NodeId) {
        self.page.borrow_mut().tree.detach(node);
    }

    // -- inspection --------------------------------------------------------

    /// Returns an attribute value.
    #[must_use]
    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.page
            .borrow()
            .tree
            .get(node)
            .attribute(name)
            .map(ToString::to_string)
    }

    /// Returns the class names of `node`.
    #[must_use]
    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.attr(node, "class")
            .map(|c| c.split_ascii_whitespace().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    /// Returns the lowercase tag name.
    #[must_use]
    pub fn tag(&self, node: NodeId) -> String {
        self.page.borrow().tree.get(node).tag.clone()
    }

    /// Returns the children of `node`, in order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.page.borrow().tree.get(node).children.clone()
    }

    /// Returns `true` if `node` is in the document.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.page.borrow().tree.is_connected(node)
    }

    /// Returns how often the node's media was reloaded.
    #[must_use]
    pub fn reloads(&self, node: NodeId) -> u32 {
        self.page.borrow().tree.get(node).reloads
    }

    /// Returns the number of connected elements matching `selector`.
    ///
    /// Unparsable selectors count zero.
    #[must_use]
    pub fn count(&self, selector: &str) -> usize {
        self.query_all(selector, None).map_or(0, |nodes| nodes.len())
    }

    /// Returns the journal without timestamps.
    #[must_use]
    pub fn journal(&self) -> Vec<PageEvent> {
        self.page
            .borrow()
            .journal
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Returns the journal with the time of each event.
    #[must_use]
    pub fn timeline(&self) -> Vec<(HostTime, PageEvent)> {
        self.page.borrow().journal.clone()
    }

    /// Returns the number of timers not yet fired.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.page.borrow().timers.len()
    }

    /// Returns `true` if gesture listeners are attached.
    #[must_use]
    pub fn listening_for_gestures(&self) -> bool {
        self.page.borrow().gestures.is_some()
    }

    /// Returns every observer created so far.
    #[must_use]
    pub fn observers(&self) -> Vec<ObserverInfo> {
        self.page
            .borrow()
            .observers
            .iter()
            .map(|o| ObserverInfo {
                root_margin: o.root_margin.clone(),
                watching: o.watching.clone(),
            })
            .collect()
    }

    // -- driving -----------------------------------------------------------

    /// Moves the clock forward by `ms`, running every timer due on the way
    /// in order.
    pub fn advance(&self, ms: u64) {
        let target = self.page.borrow().now.saturating_add(ms);
        while let Some(task) = self.pop_timer(Some(target)) {
            task();
        }
        self.page.borrow_mut().now = target;
    }

    /// Runs timers until none are left. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while ran < IDLE_STEP_LIMIT {
            let Some(task) = self.pop_timer(None) else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }

    /// Fires the load-equivalent event.
    pub fn fire_load(&self) {
        let handlers = {
            let mut page = self.page.borrow_mut();
            page.loaded = true;
            core::mem::take(&mut page.load_handlers)
        };
        for handler in handlers {
            handler();
        }
    }

    /// Performs a qualifying user gesture. Returns `true` if a listener was
    /// attached.
    pub fn gesture(&self) -> bool {
        let handler = self.page.borrow().gestures.clone();
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    /// Scrolls `node` into the viewport, notifying every observer watching
    /// it. The node stays visible for observers created later.
    pub fn scroll_into_view(&self, node: NodeId) {
        let callbacks: Vec<_> = {
            let mut page = self.page.borrow_mut();
            page.visible.insert(node);
            page.observers
                .iter_mut()
                .filter_map(|o| {
                    let pos = o.watching.iter().position(|&n| n == node)?;
                    o.watching.remove(pos);
                    Some(Rc::clone(&o.on_visible))
                })
                .collect()
        };
        for on_visible in callbacks {
            on_visible(node);
        }
    }

    fn pop_timer(&self, limit: Option<u64>) -> Option<Task> {
        let mut page = self.page.borrow_mut();
        let (pos, due) = page
            .timers
            .iter()
            .enumerate()
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, t)| (i, t.due))?;
        if limit.is_some_and(|limit| due > limit) {
            return None;
        }
        let timer = page.timers.remove(pos);
        page.now = page.now.max(timer.due);
        Some(timer.task)
    }

    /// Applies what connecting `node` does on a real page.
    fn connected(&self, node: NodeId) {
        let mut page = self.page.borrow_mut();
        if !page.tree.is_connected(node) {
            return;
        }
        let element = page.tree.get(node);
        let tag = element.tag.clone();
        let executable = EXECUTABLE_TYPES
            .iter()
            .any(|t| element.attribute("type").unwrap_or("").eq_ignore_ascii_case(t));
        let url = match tag.as_str() {
            "script" if executable => element.attribute("src"),
            "link" => element
                .attribute("rel")
                .filter(|rel| matches!(*rel, "stylesheet" | "preload"))
                .and(element.attribute("href")),
            _ => None,
        }
        .filter(|url| !url.is_empty())
        .map(ToString::to_string);
        let inline = (tag == "script" && executable && url.is_none()).then(|| element.text.clone());

        page.record(PageEvent::Attached {
            tag,
            url: url.clone(),
        });
        if let Some(text) = inline {
            page.record(PageEvent::Executed { text });
        }
        if let Some(url) = url {
            self.fetch(&mut page, node, url);
        }
    }

    /// Applies what a new `src` does to a connected media element: it loads
    /// the URL without being reattached.
    fn source_changed(&self, node: NodeId) {
        let mut page = self.page.borrow_mut();
        if !page.tree.is_connected(node) {
            return;
        }
        let element = page.tree.get(node);
        if !MEDIA_TAGS.contains(&element.tag.as_str()) {
            return;
        }
        let Some(url) = element.attribute("src").filter(|url| !url.is_empty()) else {
            return;
        };
        let url = url.to_string();
        self.fetch(&mut page, node, url);
    }

    fn fetch(&self, page: &mut Page, node: NodeId, url: String) {
        let route = page.routes.get(&url).copied().unwrap_or(page.default_route);
        let weak = Rc::downgrade(&self.page);
        page.push_timer(
            Box::new(move || {
                if let Some(host) = Self::from_weak(&weak) {
                    host.settle(node, url, route.settle);
                }
            }),
            route.latency,
        );
    }

    fn settle(&self, node: NodeId, url: String, settle: Settle) {
        let handler = {
            let mut page = self.page.borrow_mut();
            let tag = page.tree.get(node).tag.clone();
            page.record(PageEvent::Settled { tag, url, settle });
            page.tree.get_mut(node).settle.take()
        };
        if let Some(handler) = handler {
            handler(settle);
        }
    }

    fn deliver(&self, observer: usize, node: NodeId) {
        let on_visible = {
            let mut page = self.page.borrow_mut();
            let Some(record) = page.observers.get_mut(observer) else {
                return;
            };
            let Some(pos) = record.watching.iter().position(|&n| n == node) else {
                return;
            };
            record.watching.remove(pos);
            Rc::clone(&record.on_visible)
        };
        on_visible(node);
    }
}

// ---------------------------------------------------------------------------
// Host contract
// ---------------------------------------------------------------------------

impl Timer for SimHost {
    fn now(&self) -> HostTime {
        HostTime(self.page.borrow().now)
    }

    fn set_timeout(&self, task: Task, delay: Delay) -> TimerId {
        self.page.borrow_mut().push_timer(task, delay)
    }

    fn clear_timeout(&self, id: TimerId) {
        self.page.borrow_mut().timers.retain(|t| t.id != id.0);
    }
}

impl Lifecycle for SimHost {
    fn is_loaded(&self) -> bool {
        self.page.borrow().loaded
    }

    fn on_page_load(&self, handler: Task) {
        self.page.borrow_mut().load_handlers.push(handler);
    }

    fn listen_gestures(&self, handler: Rc<dyn Fn()>) {
        self.page.borrow_mut().gestures = Some(handler);
    }

    fn unlisten_gestures(&self) {
        self.page.borrow_mut().gestures = None;
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, '"' | '\'' | '>' | '/' | '='))
}

impl Document for SimHost {
    type Node = NodeId;
    type Marks = OrdMarks<NodeId>;

    fn new_marks(&self) -> Self::Marks {
        OrdMarks::new()
    }

    fn query_all(&self, selector: &str, scope: Option<&NodeId>) -> Result<Vec<NodeId>, HostError> {
        let selector = Selector::parse(selector)?;
        let page = self.page.borrow();
        let start = scope.copied().unwrap_or(page.tree.root());
        Ok(page
            .tree
            .descendants(start)
            .into_iter()
            .filter(|&n| selector.matches(&page.tree, n))
            .collect())
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let page = self.page.borrow();
        page.tree
            .descendants(page.tree.root())
            .into_iter()
            .find(|&n| page.tree.get(n).attribute("id") == Some(id))
    }

    fn root_element(&self) -> Option<NodeId> {
        Some(self.page.borrow().tree.root())
    }

    fn create_element(&self, tag: &str) -> Result<NodeId, HostError> {
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(HostError::CreateFailed(tag.to_string()));
        }
        Ok(self.page.borrow_mut().tree.create(tag))
    }

    fn attributes(&self, node: &NodeId) -> Vec<(String, String)> {
        self.page.borrow().tree.get(*node).attributes.clone()
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.attr(*node, name)
    }

    fn set_attribute(&self, node: &NodeId, name: &str, value: &str) -> Result<(), HostError> {
        if !valid_name(name) {
            return Err(HostError::InvalidAttribute(name.to_string()));
        }
        self.page
            .borrow_mut()
            .tree
            .get_mut(*node)
            .set_attribute(name, value);
        if name.eq_ignore_ascii_case("src") {
            self.source_changed(*node);
        }
        Ok(())
    }

    fn text(&self, node: &NodeId) -> String {
        self.page.borrow().tree.get(*node).text.clone()
    }

    fn set_text(&self, node: &NodeId, text: &str) {
        self.page.borrow_mut().tree.get_mut(*node).text = text.to_string();
    }

    fn add_class(&self, node: &NodeId, class: &str) -> Result<(), HostError> {
        if class.is_empty() || class.chars().any(char::is_whitespace) {
            return Err(HostError::InvalidAttribute("class".to_string()));
        }
        let mut page = self.page.borrow_mut();
        let element = page.tree.get_mut(*node);
        if !element.has_class(class) {
            let classes = match element.attribute("class") {
                Some(existing) if !existing.trim().is_empty() => {
                    alloc::format!("{} {class}", existing.trim())
                }
                _ => class.to_string(),
            };
            element.set_attribute("class", &classes);
        }
        Ok(())
    }

    fn remove_class(&self, node: &NodeId, class: &str) -> Result<(), HostError> {
        if class.is_empty() || class.chars().any(char::is_whitespace) {
            return Err(HostError::InvalidAttribute("class".to_string()));
        }
        let mut page = self.page.borrow_mut();
        let element = page.tree.get_mut(*node);
        if element.has_class(class) {
            let classes: Vec<_> = element
                .attribute("class")
                .unwrap_or_default()
                .split_ascii_whitespace()
                .filter(|c| *c != class)
                .map(ToString::to_string)
                .collect();
            element.set_attribute("class", &classes.join(" "));
        }
        Ok(())
    }

    fn append_to_head(&self, node: &NodeId) -> Result<(), HostError> {
        {
            let mut page = self.page.borrow_mut();
            let head = page.tree.head();
            if !page.tree.is_connected(head) {
                return Err(HostError::MissingHead);
            }
            page.tree.append(head, *node);
        }
        self.connected(*node);
        Ok(())
    }

    fn replace(&self, old: &NodeId, new: &NodeId) -> Result<(), HostError> {
        let replaced = self.page.borrow_mut().tree.replace(*old, *new);
        if replaced {
            self.connected(*new);
            Ok(())
        } else {
            self.append_to_head(new)
        }
    }

    fn reload_media(&self, node: &NodeId) -> bool {
        let mut page = self.page.borrow_mut();
        let element = page.tree.get_mut(*node);
        if matches!(element.tag.as_str(), "video" | "audio") {
            element.reloads += 1;
            true
        } else {
            false
        }
    }

    fn on_settle(&self, node: &NodeId, handler: Box<dyn FnOnce(Settle)>) {
        self.page.borrow_mut().tree.get_mut(*node).settle = Some(handler);
    }
}

/// Intersection observer on a [`SimHost`].
#[derive(Debug)]
pub struct SimObserver {
    page: Weak<RefCell<Page>>,
    index: usize,
}

impl Watch<NodeId> for SimObserver {
    fn watch(&self, node: NodeId) {
        let Some(host) = SimHost::from_weak(&self.page) else {
            return;
        };
        let mut page = host.page.borrow_mut();
        let Some(record) = page.observers.get_mut(self.index) else {
            return;
        };
        if record.watching.contains(&node) {
            return;
        }
        record.watching.push(node);
        if page.visible.contains(&node) {
            // Already visible: report on the next task, like a real observer.
            let weak = Rc::downgrade(&host.page);
            let index = self.index;
            page.push_timer(
                Box::new(move || {
                    if let Some(host) = SimHost::from_weak(&weak) {
                        host.deliver(index, node);
                    }
                }),
                Delay::ZERO,
            );
        }
    }
}

impl Visibility for SimHost {
    type Observer = SimObserver;

    fn supports_intersection(&self) -> bool {
        self.page.borrow().intersection
    }

    fn intersection_observer(
        &self,
        options: &ObserverOptions,
        on_visible: Rc<dyn Fn(NodeId)>,
    ) -> Result<SimObserver, HostError> {
        let mut page = self.page.borrow_mut();
        if page.observers_fail {
            return Err(HostError::CreateFailed("IntersectionObserver".to_string()));
        }
        page.observers.push(ObserverRecord {
            root_margin: options.root_margin.clone(),
            on_visible,
            watching: Vec::new(),
        });
        Ok(SimObserver {
            page: Rc::downgrade(&self.page),
            index: page.observers.len() - 1,
        })
    }
}
