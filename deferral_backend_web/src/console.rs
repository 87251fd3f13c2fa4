// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trace sink that logs to the browser console.

use alloc::format;
use alloc::string::String;

use deferral_core::trace::{
    HostErrorEvent, PhaseEvent, PreloadEvent, ReinjectEvent, RevealEvent, ScriptSettledEvent,
    TaskDispatchEvent, TaskQueuedEvent, TraceSink,
};
use wasm_bindgen::JsValue;
use web_sys::console;

/// Logs each trace event as one `console.debug` line; host errors go to
/// `console.warn`.
///
/// Task events are chatty and off unless enabled with
/// [`with_tasks`](Self::with_tasks).
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleSink {
    tasks: bool,
}

impl ConsoleSink {
    /// Logs phases, reveals, reinjection and errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also logs every queued and dispatched task.
    #[must_use]
    pub fn with_tasks(mut self) -> Self {
        self.tasks = true;
        self
    }
}

fn debug(line: &str) {
    console::debug_1(&JsValue::from_str(line));
}

fn stamp(at: deferral_core::time::HostTime, body: &str) -> String {
    format!("[deferral {:>6}ms] {body}", at.millis())
}

impl TraceSink for ConsoleSink {
    fn on_phase(&mut self, e: &PhaseEvent) {
        let why = if e.forced { " (lazy deadline)" } else { "" };
        debug(&stamp(e.at, &format!("{:?} -> {:?}{why}", e.from, e.to)));
    }

    fn on_task_queued(&mut self, e: &TaskQueuedEvent) {
        if self.tasks {
            debug(&stamp(e.at, &format!("queued {:?} +{}ms", e.lane, e.delay.millis())));
        }
    }

    fn on_task_dispatched(&mut self, e: &TaskDispatchEvent) {
        if self.tasks {
            debug(&stamp(
                e.at,
                &format!("dispatched {:?} +{}ms", e.origin, e.delay.millis()),
            ));
        }
    }

    fn on_reveal(&mut self, e: &RevealEvent) {
        debug(&stamp(e.at, &format!("reveal {:?}", e.outcome)));
    }

    fn on_preload(&mut self, e: &PreloadEvent) {
        debug(&stamp(e.at, &format!("preload {}", e.href)));
    }

    fn on_reinject(&mut self, e: &ReinjectEvent) {
        let src = e.src.as_deref().unwrap_or("<inline>");
        debug(&stamp(e.at, &format!("reinject #{} {src} {:?}", e.seq, e.gate)));
    }

    fn on_script_settled(&mut self, e: &ScriptSettledEvent) {
        debug(&stamp(e.at, &format!("script #{} {:?}", e.seq, e.settle)));
    }

    fn on_host_error(&mut self, e: &HostErrorEvent) {
        let line = stamp(e.at, &format!("{:?} failed: {}", e.operation, e.error));
        console::warn_1(&JsValue::from_str(&line));
    }
}
