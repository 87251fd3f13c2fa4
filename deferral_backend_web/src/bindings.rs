// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JS-facing API.
//!
//! ```js
//! const defer = new Defer();
//! defer.lazy = 3000;
//! defer.css("/print.css", "print-css", 0, null, true);
//! defer.dom("img[data-src]", 0, "fade-in");
//! defer.all();
//! ```
//!
//! Optional arguments are positional and may be `undefined`. An exception
//! thrown by a task, an `onload` callback or a resolver is rethrown, so it
//! reaches `window.onerror` and `error` listeners like any uncaught
//! exception. The runtime holds no borrow while callbacks run, and each
//! scheduled task runs in its own timer, so other work is unaffected.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use deferral_core::config::DeferConfig;
use deferral_core::defer::{Defer, DomOptions, ReinjectOptions, ResourceOptions};
use deferral_core::helpers::lazy_media;
use deferral_core::node::NodeSpec;
use deferral_core::reveal::Outcome;
use deferral_core::scheduler::LazyMode;
use deferral_core::time::Delay;
use deferral_core::watch::ObserverOptions;
use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::prelude::*;
use web_sys::Element;

use crate::WebHost;

/// Converts a JS millisecond count to a [`Delay`]. Negative and `NaN`
/// become zero; huge values saturate.
fn delay_from_millis(ms: f64) -> Delay {
    if ms.is_nan() || ms <= 0.0 {
        return Delay::ZERO;
    }
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "clamped to the u32 range first"
    )]
    let ms = ms.min(f64::from(u32::MAX)) as u32;
    Delay(ms)
}

/// Interprets a value assigned to `defer.lazy`.
///
/// Booleans switch gesture waiting on or off; a positive number also arms
/// the force-flush deadline. Anything else turns lazy mode off.
fn lazy_mode(flag: Option<bool>, millis: Option<f64>) -> LazyMode {
    match (flag, millis) {
        (Some(flag), _) => LazyMode::from(flag),
        (None, Some(ms)) if ms > 0.0 => LazyMode::Deadline(delay_from_millis(ms)),
        _ => LazyMode::Off,
    }
}

/// String form of an attribute value from a JS object. `true` is an empty
/// (presence-only) attribute; `false`, `null` and `undefined` are dropped.
fn attribute_value(value: &JsValue) -> Option<String> {
    if let Some(text) = value.as_string() {
        return Some(text);
    }
    if let Some(n) = value.as_f64() {
        return Some(format!("{n}"));
    }
    value.is_truthy().then(String::new)
}

/// The `idOrAttributes` argument of `css`/`js`.
fn node_spec(value: &JsValue) -> NodeSpec {
    if let Some(id) = value.as_string() {
        return NodeSpec::from(id);
    }
    let Some(object) = value.dyn_ref::<Object>() else {
        return NodeSpec::Anonymous;
    };
    let pairs: Vec<(String, String)> = Object::entries(object)
        .iter()
        .filter_map(|entry| {
            let pair: Array = entry.unchecked_into();
            let name = pair.get(0).as_string()?;
            let value = attribute_value(&pair.get(1))?;
            Some((name, value))
        })
        .collect();
    NodeSpec::Attributes(pairs)
}

/// The `observerOptions` argument of `dom`: `{ rootMargin, threshold }`.
fn observer_options(value: &JsValue) -> ObserverOptions {
    let mut options = ObserverOptions::default();
    if !value.is_object() {
        return options;
    }
    let get = |key: &str| Reflect::get(value, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED);
    options.root_margin = get("rootMargin").as_string();
    let threshold = get("threshold");
    if let Some(t) = threshold.as_f64() {
        options.thresholds.push(t);
    } else if let Some(list) = threshold.dyn_ref::<Array>() {
        options.thresholds = list.iter().filter_map(|t| t.as_f64()).collect();
    }
    options
}

fn call(callback: &Function) {
    if let Err(error) = callback.call0(&JsValue::NULL) {
        wasm_bindgen::throw_val(error);
    }
}

/// Asks a JS resolver about `node`. A throw propagates; it is not a
/// decline.
fn resolve(resolver: &Function, node: &Element) -> bool {
    match resolver.call1(&JsValue::NULL, node) {
        Ok(verdict) => verdict.is_truthy(),
        Err(error) => wasm_bindgen::throw_val(error),
    }
}

/// The page-wide runtime, exported to JS as `Defer`.
#[wasm_bindgen(js_name = Defer)]
#[derive(Debug)]
pub struct JsDefer {
    defer: Defer<WebHost>,
}

#[wasm_bindgen(js_class = Defer)]
impl JsDefer {
    /// Binds a runtime to the current window.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<Self, JsValue> {
        let host = WebHost::new()
            .ok_or_else(|| JsValue::from_str("Defer needs a window with a document"))?;
        Ok(Self {
            defer: Defer::new(host, DeferConfig::web()),
        })
    }

    /// `defer(callback, delayMs?, lazy?)`.
    #[wasm_bindgen(js_name = defer)]
    pub fn schedule(&self, callback: Function, delay: Option<f64>, lazy: Option<bool>) {
        self.defer
            .schedule(move || call(&callback), self.delay(delay), lazy);
    }

    /// `dom(selector?, delayMs?, unveiledClass?, resolver?, observerOptions?)`.
    pub fn dom(
        &self,
        selector: Option<String>,
        delay: Option<f64>,
        unveiled_class: Option<String>,
        resolver: Option<Function>,
        observer: JsValue,
    ) {
        let mut options = DomOptions::new()
            .delay(self.delay(delay))
            .observer(observer_options(&observer));
        if let Some(selector) = selector {
            options = options.selector(selector);
        }
        if let Some(class) = unveiled_class {
            options = options.unveiled_class(class);
        }
        if let Some(resolver) = resolver {
            options = options.resolver(move |node: &Element| resolve(&resolver, node));
        }
        self.defer.dom(options);
    }

    /// `css(url, idOrAttributes?, delayMs?, onload?, lazy?)`.
    pub fn css(
        &self,
        url: String,
        id_or_attributes: JsValue,
        delay: Option<f64>,
        on_load: Option<Function>,
        lazy: Option<bool>,
    ) {
        let options = self.resource_options(&id_or_attributes, delay, on_load, lazy);
        self.defer.css(url, options);
    }

    /// `js(url, idOrAttributes?, delayMs?, onload?, lazy?)`.
    pub fn js(
        &self,
        url: String,
        id_or_attributes: JsValue,
        delay: Option<f64>,
        on_load: Option<Function>,
        lazy: Option<bool>,
    ) {
        let options = self.resource_options(&id_or_attributes, delay, on_load, lazy);
        self.defer.js(url, options);
    }

    /// `all(selector?, delayMs?, lazy?)`.
    pub fn all(&self, selector: Option<String>, delay: Option<f64>, lazy: Option<bool>) {
        let mut options = ReinjectOptions::new().delay(self.delay(delay));
        options.selector = selector;
        options.lazy = lazy;
        self.defer.all(options);
    }

    /// `reveal(node, unveiledClass?)`. Returns `true` if the node was
    /// revealed by this call.
    pub fn reveal(&self, node: Element, unveiled_class: Option<String>) -> Result<bool, JsValue> {
        self.defer
            .reveal(&node, unveiled_class.as_deref())
            .map(|outcome| matches!(outcome, Outcome::Revealed(_)))
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Registers the image, background and frame presets.
    #[wasm_bindgen(js_name = lazyMedia)]
    pub fn lazy_media(&self) {
        lazy_media(&self.defer);
    }

    /// The process-wide lazy default: `false`, `true`, or a deadline in
    /// milliseconds.
    #[wasm_bindgen(getter)]
    pub fn lazy(&self) -> JsValue {
        match self.defer.lazy() {
            LazyMode::Off => JsValue::FALSE,
            LazyMode::On => JsValue::TRUE,
            LazyMode::Deadline(d) => JsValue::from_f64(f64::from(d.millis())),
        }
    }

    /// Sets the process-wide lazy default.
    #[wasm_bindgen(setter)]
    pub fn set_lazy(&self, value: JsValue) {
        self.defer
            .set_lazy(lazy_mode(value.as_bool(), value.as_f64()));
    }

    /// Logs runtime events to the console.
    #[wasm_bindgen(js_name = traceToConsole)]
    pub fn trace_to_console(&self, tasks: Option<bool>) {
        let sink = crate::ConsoleSink::new();
        let sink = if tasks.unwrap_or(false) {
            sink.with_tasks()
        } else {
            sink
        };
        self.defer.set_trace_sink(Box::new(sink));
    }
}

impl JsDefer {
    /// Returns the Rust runtime behind this handle.
    #[must_use]
    pub fn runtime(&self) -> &Defer<WebHost> {
        &self.defer
    }

    fn delay(&self, ms: Option<f64>) -> Delay {
        ms.map_or(self.defer.config().default_delay, delay_from_millis)
    }

    fn resource_options(
        &self,
        id_or_attributes: &JsValue,
        delay: Option<f64>,
        on_load: Option<Function>,
        lazy: Option<bool>,
    ) -> ResourceOptions {
        let mut options = ResourceOptions::new()
            .spec(node_spec(id_or_attributes))
            .delay(self.delay(delay));
        if let Some(on_load) = on_load {
            options = options.on_load(move || call(&on_load));
        }
        options.lazy = lazy;
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_are_clamped() {
        assert_eq!(delay_from_millis(250.0), Delay(250));
        assert_eq!(delay_from_millis(12.9), Delay(12));
        assert_eq!(delay_from_millis(-5.0), Delay::ZERO);
        assert_eq!(delay_from_millis(f64::NAN), Delay::ZERO);
        assert_eq!(delay_from_millis(1e20), Delay(u32::MAX));
    }

    #[test]
    fn lazy_accepts_booleans_and_numbers() {
        assert_eq!(lazy_mode(Some(true), None), LazyMode::On);
        assert_eq!(lazy_mode(Some(false), None), LazyMode::Off);
        assert_eq!(
            lazy_mode(None, Some(300.0)),
            LazyMode::Deadline(Delay(300))
        );
        assert_eq!(lazy_mode(None, Some(0.0)), LazyMode::Off, "zero is falsy");
        assert_eq!(lazy_mode(None, None), LazyMode::Off);
    }
}
