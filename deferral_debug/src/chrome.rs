// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Blocking script replacements become duration slices on their own track,
//! from attachment until the `load`/`error` settle. Everything else is an
//! instant on the main track.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use deferral_core::reinject::Gate;
use deferral_core::reveal::Outcome;
use deferral_core::time::HostTime;

use crate::recorder::{RecordedEvent, decode};

const MAIN_TRACK: u32 = 0;
const SCRIPT_TRACK: u32 = 1;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Host milliseconds are converted to microseconds.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        let ts = to_us(recorded.at());
        match recorded {
            RecordedEvent::Phase(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.to),
                    "cat": "Phase",
                    "ts": ts,
                    "pid": 0,
                    "tid": MAIN_TRACK,
                    "s": "g",
                    "args": {
                        "from": format!("{:?}", e.from),
                        "forced": e.forced,
                    }
                }));
            }
            RecordedEvent::TaskQueued(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "TaskQueued",
                    "cat": "Task",
                    "ts": ts,
                    "pid": 0,
                    "tid": MAIN_TRACK,
                    "s": "t",
                    "args": {
                        "lane": format!("{:?}", e.lane),
                        "delay_ms": e.delay.millis(),
                    }
                }));
            }
            RecordedEvent::TaskDispatched(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "TaskDispatched",
                    "cat": "Task",
                    "ts": ts,
                    "pid": 0,
                    "tid": MAIN_TRACK,
                    "s": "t",
                    "args": {
                        "origin": format!("{:?}", e.origin),
                        "delay_ms": e.delay.millis(),
                    }
                }));
            }
            RecordedEvent::Reveal(e) => {
                let args = match e.outcome {
                    Outcome::Revealed(r) => json!({
                        "outcome": "Revealed",
                        "promoted": r.promoted,
                        "descendants": r.descendants,
                        "tagged": r.tagged,
                        "reloaded": r.reloaded,
                    }),
                    Outcome::AlreadyRevealed => json!({ "outcome": "AlreadyRevealed" }),
                    Outcome::Declined => json!({ "outcome": "Declined" }),
                };
                events.push(json!({
                    "ph": "i",
                    "name": "Reveal",
                    "cat": "Reveal",
                    "ts": ts,
                    "pid": 0,
                    "tid": MAIN_TRACK,
                    "s": "t",
                    "args": args,
                }));
            }
            RecordedEvent::Preload(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Preload",
                    "cat": "Script",
                    "ts": ts,
                    "pid": 0,
                    "tid": MAIN_TRACK,
                    "s": "t",
                    "args": { "href": e.href },
                }));
            }
            RecordedEvent::Reinject(e) => {
                let name = e.src.unwrap_or_else(|| format!("inline #{}", e.seq));
                let (ph, tid) = match e.gate {
                    Gate::Blocking => ("B", SCRIPT_TRACK),
                    Gate::Free => ("i", MAIN_TRACK),
                };
                let mut event = json!({
                    "ph": ph,
                    "name": name,
                    "cat": "Script",
                    "ts": ts,
                    "pid": 0,
                    "tid": tid,
                    "args": {
                        "seq": e.seq,
                        "gate": format!("{:?}", e.gate),
                    }
                });
                if e.gate == Gate::Free {
                    event["s"] = json!("t");
                }
                events.push(event);
            }
            RecordedEvent::ScriptSettled(e) => {
                events.push(json!({
                    "ph": "E",
                    "cat": "Script",
                    "ts": ts,
                    "pid": 0,
                    "tid": SCRIPT_TRACK,
                    "args": {
                        "seq": e.seq,
                        "settle": format!("{:?}", e.settle),
                    }
                }));
            }
            RecordedEvent::HostError(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.operation),
                    "cat": "Error",
                    "ts": ts,
                    "pid": 0,
                    "tid": MAIN_TRACK,
                    "s": "g",
                    "args": { "error": e.error.to_string() },
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn to_us(t: HostTime) -> u64 {
    t.millis().saturating_mul(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use std::cell::RefCell;
    use std::rc::Rc;

    use deferral_core::config::DeferConfig;
    use deferral_core::defer::{Defer, ReinjectOptions};
    use deferral_core::host::Settle;
    use deferral_core::scheduler::ReadinessState;
    use deferral_core::trace::{
        HostErrorEvent, PhaseEvent, PreloadEvent, ReinjectEvent, RevealEvent, ScriptSettledEvent,
        TaskDispatchEvent, TaskQueuedEvent, TraceSink,
    };
    use deferral_sim_harness::{Route, SimHost};

    fn parse(bytes: &[u8]) -> Vec<Value> {
        let mut out = Vec::new();
        export(bytes, &mut out).unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn blocking_script_becomes_a_slice() {
        let mut rec = RecorderSink::new();
        rec.on_phase(&PhaseEvent {
            at: HostTime(12),
            from: ReadinessState::Booting,
            to: ReadinessState::Ready,
            forced: false,
        });
        rec.on_reinject(&ReinjectEvent {
            at: HostTime(13),
            seq: 0,
            gate: Gate::Blocking,
            src: Some("analytics.js".into()),
        });
        rec.on_script_settled(&ScriptSettledEvent {
            at: HostTime(40),
            seq: 0,
            settle: Settle::Loaded,
        });

        let parsed = parse(rec.as_bytes());
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "i");
        assert_eq!(parsed[0]["name"], "Ready");
        assert_eq!(parsed[0]["ts"], 12_000);

        assert_eq!(parsed[1]["ph"], "B");
        assert_eq!(parsed[1]["name"], "analytics.js");
        assert_eq!(parsed[1]["tid"], SCRIPT_TRACK);

        assert_eq!(parsed[2]["ph"], "E");
        assert_eq!(parsed[2]["ts"], 40_000);
        assert_eq!(parsed[2]["args"]["settle"], "Loaded");
    }

    #[test]
    fn free_inline_script_is_an_instant() {
        let mut rec = RecorderSink::new();
        rec.on_reinject(&ReinjectEvent {
            at: HostTime(5),
            seq: 2,
            gate: Gate::Free,
            src: None,
        });
        let parsed = parse(rec.as_bytes());
        assert_eq!(parsed[0]["ph"], "i");
        assert_eq!(parsed[0]["s"], "t");
        assert_eq!(parsed[0]["name"], "inline #2");
    }

    /// Forwards to a recorder the test keeps a handle on.
    struct Shared(Rc<RefCell<RecorderSink>>);

    impl TraceSink for Shared {
        fn on_phase(&mut self, e: &PhaseEvent) {
            self.0.borrow_mut().on_phase(e);
        }
        fn on_task_queued(&mut self, e: &TaskQueuedEvent) {
            self.0.borrow_mut().on_task_queued(e);
        }
        fn on_task_dispatched(&mut self, e: &TaskDispatchEvent) {
            self.0.borrow_mut().on_task_dispatched(e);
        }
        fn on_reveal(&mut self, e: &RevealEvent) {
            self.0.borrow_mut().on_reveal(e);
        }
        fn on_preload(&mut self, e: &PreloadEvent) {
            self.0.borrow_mut().on_preload(e);
        }
        fn on_reinject(&mut self, e: &ReinjectEvent) {
            self.0.borrow_mut().on_reinject(e);
        }
        fn on_script_settled(&mut self, e: &ScriptSettledEvent) {
            self.0.borrow_mut().on_script_settled(e);
        }
        fn on_host_error(&mut self, e: &HostErrorEvent) {
            self.0.borrow_mut().on_host_error(e);
        }
    }

    #[test]
    fn simulated_page_exports_balanced_script_slices() {
        let host = SimHost::new();
        host.route("a.js", Route::ok(30));
        host.route("b.js", Route::ok(10));
        for src in ["a.js", "b.js"] {
            host.element(host.body(), "script", &[("type", "deferjs"), ("src", src)]);
        }
        let defer = Defer::new(host.clone(), DeferConfig::web());
        let rec = Rc::new(RefCell::new(RecorderSink::new()));
        defer.set_trace_sink(Box::new(Shared(Rc::clone(&rec))));

        defer.all(ReinjectOptions::new());
        host.fire_load();
        host.run_until_idle();

        let parsed = parse(rec.borrow().as_bytes());
        let count = |ph: &str| parsed.iter().filter(|e| e["ph"] == ph).count();
        assert_eq!(count("B"), 2);
        assert_eq!(count("E"), 2);
        assert!(
            parsed
                .iter()
                .any(|e| e["cat"] == "Phase" && e["name"] == "Ready"),
            "load transition is exported"
        );
        let names: Vec<_> = parsed
            .iter()
            .filter(|e| e["ph"] == "B")
            .map(|e| e["name"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["a.js", "b.js"]);
    }

    #[test]
    fn export_empty_recording() {
        let parsed = parse(&[]);
        assert!(parsed.is_empty());
    }
}
