// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The host contract on a browser page.
//!
//! Timers go through the global `setTimeout`/`clearTimeout`, page load is the
//! `pageshow` event (or `load` where `pageshow` does not exist), and the
//! document operations map one-to-one onto DOM calls. Failed DOM calls become
//! [`HostError`]s; nothing here throws into JS.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use deferral_core::error::HostError;
use deferral_core::host::{Document, Lifecycle, Settle, Task, Timer, TimerId, Visibility};
use deferral_core::time::{Delay, HostTime};
use deferral_core::watch::ObserverOptions;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{AddEventListenerOptions, Element, Event, HtmlMediaElement, Window};

use crate::marks::WeakMarks;
use crate::observer::WebObserver;

// Direct global bindings: the timer functions are needed on every task and
// never fail, unlike their `web_sys::Window` counterparts.
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = performance, js_name = "now")]
    pub(crate) fn performance_now() -> f64;

    #[wasm_bindgen(js_name = "setTimeout")]
    fn global_set_timeout(callback: &JsValue, ms: i32) -> i32;

    #[wasm_bindgen(js_name = "clearTimeout")]
    fn global_clear_timeout(id: i32);
}

/// Events that count as the user starting to interact with the page.
pub const GESTURE_EVENTS: [&str; 5] = ["touchstart", "mousemove", "mousedown", "keydown", "wheel"];

/// `"key" in target`, without throwing.
pub(crate) fn has_property(target: &JsValue, key: &str) -> bool {
    js_sys::Reflect::has(target, &JsValue::from_str(key)).unwrap_or(false)
}

/// A readable message for a caught DOM exception.
fn describe(error: &JsValue) -> String {
    error
        .as_string()
        .or_else(|| {
            js_sys::Reflect::get(error, &JsValue::from_str("message"))
                .ok()
                .and_then(|message| message.as_string())
        })
        .unwrap_or_else(|| "DOM exception".to_string())
}

fn listener_options(once: bool) -> AddEventListenerOptions {
    let options = AddEventListenerOptions::new();
    options.set_once(once);
    options.set_passive(true);
    options
}

struct WebState {
    window: Window,
    document: web_sys::Document,
    /// Listener shared by every gesture event while attached.
    gestures: RefCell<Option<Closure<dyn Fn()>>>,
}

/// The host contract implemented on the current browser window.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct WebHost {
    state: Rc<WebState>,
}

impl fmt::Debug for WebHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebHost")
            .field("ready_state", &self.state.document.ready_state())
            .field("listening_for_gestures", &self.state.gestures.borrow().is_some())
            .finish_non_exhaustive()
    }
}

impl WebHost {
    /// Binds to the current window.
    ///
    /// Returns `None` where there is no window with a document, e.g. in a
    /// worker.
    #[must_use]
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self {
            state: Rc::new(WebState {
                window,
                document,
                gestures: RefCell::new(None),
            }),
        })
    }

    /// Returns the window.
    #[must_use]
    pub fn window(&self) -> &Window {
        &self.state.window
    }

    /// Returns the document.
    #[must_use]
    pub fn document(&self) -> &web_sys::Document {
        &self.state.document
    }

    /// `pageshow` also fires on back/forward cache restores; older engines
    /// only have `load`.
    fn load_event(&self) -> &'static str {
        if has_property(&self.state.window, "onpageshow") {
            "pageshow"
        } else {
            "load"
        }
    }
}

impl Timer for WebHost {
    fn now(&self) -> HostTime {
        crate::now()
    }

    fn set_timeout(&self, task: Task, delay: Delay) -> TimerId {
        // A cleared timer's closure is only reclaimed with the page.
        let callback = Closure::once_into_js(move || task());
        TimerId(global_set_timeout(&callback, delay.as_timeout()))
    }

    fn clear_timeout(&self, id: TimerId) {
        global_clear_timeout(id.0);
    }
}

impl Lifecycle for WebHost {
    fn is_loaded(&self) -> bool {
        self.state.document.ready_state() == "complete"
    }

    fn on_page_load(&self, handler: Task) {
        let callback = Closure::once_into_js(move || handler());
        let _ = self
            .state
            .window
            .add_event_listener_with_callback_and_add_event_listener_options(
                self.load_event(),
                callback.unchecked_ref(),
                &listener_options(true),
            );
    }

    fn listen_gestures(&self, handler: Rc<dyn Fn()>) {
        self.unlisten_gestures();
        let listener = Closure::wrap(Box::new(move || handler()) as Box<dyn Fn()>);
        let options = listener_options(false);
        for event in GESTURE_EVENTS {
            let _ = self
                .state
                .window
                .add_event_listener_with_callback_and_add_event_listener_options(
                    event,
                    listener.as_ref().unchecked_ref(),
                    &options,
                );
        }
        *self.state.gestures.borrow_mut() = Some(listener);
    }

    fn unlisten_gestures(&self) {
        let Some(listener) = self.state.gestures.borrow_mut().take() else {
            return;
        };
        for event in GESTURE_EVENTS {
            let _ = self
                .state
                .window
                .remove_event_listener_with_callback(event, listener.as_ref().unchecked_ref());
        }
        // Usually dropped from inside its own invocation; wasm-bindgen defers
        // the free until the call returns.
        drop(listener);
    }
}

impl Document for WebHost {
    type Node = Element;
    type Marks = WeakMarks;

    fn new_marks(&self) -> WeakMarks {
        WeakMarks::new()
    }

    fn query_all(&self, selector: &str, scope: Option<&Element>) -> Result<Vec<Element>, HostError> {
        let list = match scope {
            Some(scope) => scope.query_selector_all(selector),
            None => self.state.document.query_selector_all(selector),
        }
        .map_err(|_| HostError::InvalidSelector(selector.to_string()))?;
        Ok((0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect())
    }

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.state.document.get_element_by_id(id)
    }

    fn root_element(&self) -> Option<Element> {
        self.state.document.document_element()
    }

    fn create_element(&self, tag: &str) -> Result<Element, HostError> {
        self.state
            .document
            .create_element(tag)
            .map_err(|_| HostError::CreateFailed(tag.to_string()))
    }

    fn attributes(&self, node: &Element) -> Vec<(String, String)> {
        let map = node.attributes();
        (0..map.length())
            .filter_map(|i| map.item(i))
            .map(|attr| (attr.name(), attr.value()))
            .collect()
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&self, node: &Element, name: &str, value: &str) -> Result<(), HostError> {
        node.set_attribute(name, value)
            .map_err(|_| HostError::InvalidAttribute(name.to_string()))
    }

    fn text(&self, node: &Element) -> String {
        node.text_content().unwrap_or_default()
    }

    fn set_text(&self, node: &Element, text: &str) {
        node.set_text_content(Some(text));
    }

    fn add_class(&self, node: &Element, class: &str) -> Result<(), HostError> {
        node.class_list()
            .add_1(class)
            .map_err(|_| HostError::InvalidAttribute("class".to_string()))
    }

    fn remove_class(&self, node: &Element, class: &str) -> Result<(), HostError> {
        node.class_list()
            .remove_1(class)
            .map_err(|_| HostError::InvalidAttribute("class".to_string()))
    }

    fn append_to_head(&self, node: &Element) -> Result<(), HostError> {
        let head = self.state.document.head().ok_or(HostError::MissingHead)?;
        head.append_child(node)
            .map(drop)
            .map_err(|e| HostError::InsertFailed(describe(&e)))
    }

    fn replace(&self, old: &Element, new: &Element) -> Result<(), HostError> {
        match old.parent_node() {
            Some(parent) => parent
                .replace_child(new, old)
                .map(drop)
                .map_err(|e| HostError::InsertFailed(describe(&e))),
            None => self.append_to_head(new),
        }
    }

    fn reload_media(&self, node: &Element) -> bool {
        let Some(media) = node.dyn_ref::<HtmlMediaElement>() else {
            return false;
        };
        media.load();
        true
    }

    fn on_settle(&self, node: &Element, handler: Box<dyn FnOnce(Settle)>) {
        let mut handler = Some(handler);
        let listener = Closure::wrap(Box::new(move |event: Event| {
            let settle = if event.type_() == "load" {
                Settle::Loaded
            } else {
                Settle::Failed
            };
            if let Some(handler) = handler.take() {
                handler(settle);
            }
        }) as Box<dyn FnMut(Event)>)
        .into_js_value();
        let options = listener_options(true);
        for event in ["load", "error"] {
            let _ = node.add_event_listener_with_callback_and_add_event_listener_options(
                event,
                listener.unchecked_ref(),
                &options,
            );
        }
    }
}

impl Visibility for WebHost {
    type Observer = WebObserver;

    fn supports_intersection(&self) -> bool {
        has_property(&self.state.window, "IntersectionObserver")
    }

    fn intersection_observer(
        &self,
        options: &ObserverOptions,
        on_visible: Rc<dyn Fn(Element)>,
    ) -> Result<WebObserver, HostError> {
        WebObserver::new(options, on_visible)
    }
}
