// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Web backend for deferral.
//!
//! This crate implements the `deferral_core` host contract on a browser page:
//!
//! - [`WebHost`]: `setTimeout` timers, `pageshow`/`load` and gesture events,
//!   and DOM operations through `web-sys`
//! - [`WebObserver`]: `IntersectionObserver`-backed visibility watching
//! - [`WeakMarks`]: idempotency markers in a JS `WeakSet`
//! - [`ConsoleSink`]: trace events on the browser console
//! - [`JsDefer`]: the `Defer` class exported to JS
//!
//! Everything compiles on native targets, but only does work on `wasm32`.

#![no_std]

extern crate alloc;

mod bindings;
mod console;
mod host;
mod marks;
mod observer;

pub use bindings::JsDefer;
pub use console::ConsoleSink;
pub use host::{GESTURE_EVENTS, WebHost};
pub use marks::WeakMarks;
pub use observer::WebObserver;

use deferral_core::time::HostTime;

/// Returns the current host time from `performance.now()`, in whole
/// milliseconds.
#[must_use]
pub fn now() -> HostTime {
    let ms = host::performance_now();
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "performance.now() returns a small positive f64"
    )]
    let ms = ms as u64;
    HostTime(ms)
}
