// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the runtime.
//!
//! This module provides a [`TraceSink`] trait with one method per runtime
//! event. All method bodies default to no-ops, so implementing only the
//! events you care about is fine.
//!
//! [`Tracer`] owns an optional boxed [`TraceSink`]. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead) and
//! installed sinks are dropped. When **on**, each method performs a single
//! `Option` branch before dispatching.
//!
//! Sinks live in `deferral_debug` (pretty-printing, binary recording, Chrome
//! trace export) and `deferral_backend_web` (browser console).
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use alloc::boxed::Box;
use alloc::string::String;

use crate::error::HostError;
use crate::host::Settle;
use crate::reinject::Gate;
use crate::reveal::Outcome;
use crate::scheduler::{Lane, ReadinessState};
use crate::time::{Delay, HostTime};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why a task reached the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchOrigin {
    /// Scheduled after the page was ready.
    Direct,
    /// Released from the fast queue by the load event.
    FastFlush,
    /// Released from the lazy queue by a gesture or the deadline.
    LazyFlush,
}

/// Which public operation hit a host error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `dom`: querying and registering nodes.
    Observe,
    /// `reveal`.
    Reveal,
    /// `css`.
    Stylesheet,
    /// `js`.
    Script,
    /// `all`: discovery, hints and replacement.
    Reinject,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when the readiness phase advances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseEvent {
    /// Host time of the transition.
    pub at: HostTime,
    /// Previous phase.
    pub from: ReadinessState,
    /// New phase.
    pub to: ReadinessState,
    /// `true` when the lazy deadline, not a gesture, caused the transition.
    pub forced: bool,
}

/// Emitted when a task is buffered while the page is booting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskQueuedEvent {
    /// Host time of the `schedule` call.
    pub at: HostTime,
    /// The queue it went into.
    pub lane: Lane,
    /// The task's delay.
    pub delay: Delay,
}

/// Emitted when a task is handed to the host timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskDispatchEvent {
    /// Host time of the hand-off.
    pub at: HostTime,
    /// The task's delay.
    pub delay: Delay,
    /// Why it was dispatched now.
    pub origin: DispatchOrigin,
}

/// Emitted after each top-level reveal attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealEvent {
    /// Host time of the attempt.
    pub at: HostTime,
    /// What happened.
    pub outcome: Outcome,
}

/// Emitted when a preload hint is attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreloadEvent {
    /// Host time of attachment.
    pub at: HostTime,
    /// The hinted URL.
    pub href: String,
}

/// Emitted when a script replacement is attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReinjectEvent {
    /// Host time of attachment.
    pub at: HostTime,
    /// Position in document order within its pass.
    pub seq: usize,
    /// Whether the pipeline waits for it.
    pub gate: Gate,
    /// Its resource URL, if external.
    pub src: Option<String>,
}

/// Emitted when a blocking replacement settles and the pipeline resumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScriptSettledEvent {
    /// Host time of the load/error event.
    pub at: HostTime,
    /// Position in document order within its pass.
    pub seq: usize,
    /// Load or error.
    pub settle: Settle,
}

/// Emitted when a host operation fails inside scheduled work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostErrorEvent {
    /// Host time of the failure.
    pub at: HostTime,
    /// The operation that was running.
    pub operation: Operation,
    /// The error.
    pub error: HostError,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the runtime.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when the readiness phase advances.
    fn on_phase(&mut self, e: &PhaseEvent) {
        _ = e;
    }

    /// Called when a task is buffered.
    fn on_task_queued(&mut self, e: &TaskQueuedEvent) {
        _ = e;
    }

    /// Called when a task is handed to the host timer.
    fn on_task_dispatched(&mut self, e: &TaskDispatchEvent) {
        _ = e;
    }

    /// Called after each top-level reveal attempt.
    fn on_reveal(&mut self, e: &RevealEvent) {
        _ = e;
    }

    /// Called when a preload hint is attached.
    fn on_preload(&mut self, e: &PreloadEvent) {
        _ = e;
    }

    /// Called when a script replacement is attached.
    fn on_reinject(&mut self, e: &ReinjectEvent) {
        _ = e;
    }

    /// Called when a blocking replacement settles.
    fn on_script_settled(&mut self, e: &ScriptSettledEvent) {
        _ = e;
    }

    /// Called when scheduled work hits a host error.
    fn on_host_error(&mut self, e: &HostErrorEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Owner of an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing.
/// When **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
#[derive(Default)]
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Box<dyn TraceSink>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

macro_rules! dispatch {
    ($(#[$doc:meta])* $name:ident => $method:ident($ty:ty)) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&mut self, e: &$ty) {
            #[cfg(feature = "trace")]
            if let Some(s) = &mut self.sink {
                s.$method(e);
            }
            #[cfg(not(feature = "trace"))]
            {
                _ = e;
            }
        }
    };
}

impl Tracer {
    /// Creates a tracer that dispatches to `sink`.
    #[inline]
    #[must_use]
    pub fn new(sink: Box<dyn TraceSink>) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {}
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` if events reach a sink.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "trace")]
        {
            self.sink.is_some()
        }
        #[cfg(not(feature = "trace"))]
        {
            false
        }
    }

    /// Removes and returns the installed sink.
    pub fn take(&mut self) -> Option<Box<dyn TraceSink>> {
        #[cfg(feature = "trace")]
        {
            self.sink.take()
        }
        #[cfg(not(feature = "trace"))]
        {
            None
        }
    }

    dispatch!(
        /// Emits a [`PhaseEvent`].
        phase => on_phase(PhaseEvent)
    );
    dispatch!(
        /// Emits a [`TaskQueuedEvent`].
        task_queued => on_task_queued(TaskQueuedEvent)
    );
    dispatch!(
        /// Emits a [`TaskDispatchEvent`].
        task_dispatched => on_task_dispatched(TaskDispatchEvent)
    );
    dispatch!(
        /// Emits a [`RevealEvent`].
        reveal => on_reveal(RevealEvent)
    );
    dispatch!(
        /// Emits a [`PreloadEvent`].
        preload => on_preload(PreloadEvent)
    );
    dispatch!(
        /// Emits a [`ReinjectEvent`].
        reinject => on_reinject(ReinjectEvent)
    );
    dispatch!(
        /// Emits a [`ScriptSettledEvent`].
        script_settled => on_script_settled(ScriptSettledEvent)
    );
    dispatch!(
        /// Emits a [`HostErrorEvent`].
        host_error => on_host_error(HostErrorEvent)
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
