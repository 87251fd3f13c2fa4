// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `IntersectionObserver` watcher.

use alloc::boxed::Box;
use alloc::rc::Rc;

use deferral_core::error::HostError;
use deferral_core::watch::{ObserverOptions, Watch};
use js_sys::Array;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{Element, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit};

/// An `IntersectionObserver` that reports each watched element once.
///
/// On the first intersecting entry for an element, the element is
/// unobserved and handed to the visibility callback. The JS observer owns
/// its callback, so dropping this handle does not stop observation.
#[derive(Debug)]
pub struct WebObserver {
    observer: IntersectionObserver,
}

impl WebObserver {
    pub(crate) fn new(
        options: &ObserverOptions,
        on_visible: Rc<dyn Fn(Element)>,
    ) -> Result<Self, HostError> {
        let callback = Closure::wrap(Box::new(
            move |entries: Array, observer: IntersectionObserver| {
                for entry in entries.iter() {
                    let entry: IntersectionObserverEntry = entry.unchecked_into();
                    if entry.is_intersecting() {
                        let target = entry.target();
                        observer.unobserve(&target);
                        on_visible(target);
                    }
                }
            },
        ) as Box<dyn FnMut(Array, IntersectionObserver)>);

        let init = IntersectionObserverInit::new();
        if let Some(margin) = &options.root_margin {
            init.set_root_margin(margin);
        }
        if !options.thresholds.is_empty() {
            let thresholds: Array = options
                .thresholds
                .iter()
                .map(|&t| JsValue::from_f64(t))
                .collect();
            init.set_threshold(&thresholds);
        }

        let observer =
            IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &init)
                .map_err(|_| HostError::CreateFailed("IntersectionObserver".into()))?;
        // From here on the callback lives as long as the JS observer does.
        let _ = callback.into_js_value();
        Ok(Self { observer })
    }
}

impl Watch<Element> for WebObserver {
    fn watch(&self, node: Element) {
        self.observer.observe(&node);
    }
}
