// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-independent core of deferred page loading.
//!
//! `deferral_core` decides *when* page work happens: initialization tasks,
//! stylesheet and script fetches, off-screen media, and deferred inline
//! scripts are all held back until they no longer compete with the first
//! render. It is `no_std` compatible (with `alloc`) and never touches a real
//! page; a host crate supplies the page through the [`host`] traits.
//!
//! # Architecture
//!
//! ```text
//!   Host (load / gesture / timer / load-error events)
//!       │
//!       ▼
//!   Defer<H> ──► Scheduler ──► fast queue ─(load)──────► Timer::set_timeout
//!       │                 └──► lazy queue ─(gesture)───┘
//!       │
//!       ├── dom ──► Watcher (observer | immediate) ──► reveal()
//!       ├── css / js ──► create_node() ──► append_to_head
//!       └── all ──► Reinjection ──► preload hints, then replace in order
//!                        ▲                              │
//!                        └──── settle(seq) ◄─ load/error ┘
//! ```
//!
//! **[`scheduler`]**: readiness phases (Booting, Ready, Interacting) and the
//! fast/lazy queue pair, as a pure state machine.
//!
//! **[`reveal`]**: promotes placeholder attributes (`data-src` → `src`),
//! descendants first, at most once per element.
//!
//! **[`reinject`]**: the ordering rule for deferred scripts as a
//! continuation state machine.
//!
//! **[`node`]**: idempotent element creation by identifier.
//!
//! **[`watch`]** / **[`marks`]**: the visibility capability and the
//! identity-keyed side tables behind every "at most once" guarantee.
//!
//! **[`defer`]**: the [`Defer`](defer::Defer) runtime that wires all of the
//! above to a [`Host`](host::Host).
//!
//! **[`helpers`]**: debounce, throttle, and media presets.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types, with
//! a zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one
//!   branch per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod config;
pub mod defer;
pub mod error;
pub mod helpers;
pub mod host;
pub mod marks;
pub mod node;
pub mod reinject;
pub mod reveal;
pub mod scheduler;
pub mod time;
pub mod trace;
pub mod watch;
