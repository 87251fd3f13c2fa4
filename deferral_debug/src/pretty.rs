// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use deferral_core::reveal::Outcome;
use deferral_core::scheduler::ReadinessState;
use deferral_core::time::HostTime;
use deferral_core::trace::{
    HostErrorEvent, PhaseEvent, PreloadEvent, ReinjectEvent, RevealEvent, ScriptSettledEvent,
    TaskDispatchEvent, TaskQueuedEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the destination.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn phase_name(phase: ReadinessState) -> &'static str {
    match phase {
        ReadinessState::Booting => "booting",
        ReadinessState::Ready => "ready",
        ReadinessState::Interacting => "interacting",
    }
}

fn ms(t: HostTime) -> u64 {
    t.millis()
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_phase(&mut self, e: &PhaseEvent) {
        let cause = if e.forced { " (deadline)" } else { "" };
        let _ = writeln!(
            self.writer,
            "[phase] {}ms {} -> {}{cause}",
            ms(e.at),
            phase_name(e.from),
            phase_name(e.to),
        );
    }

    fn on_task_queued(&mut self, e: &TaskQueuedEvent) {
        let _ = writeln!(
            self.writer,
            "[queue] {}ms lane={:?} delay={}ms",
            ms(e.at),
            e.lane,
            e.delay.millis(),
        );
    }

    fn on_task_dispatched(&mut self, e: &TaskDispatchEvent) {
        let _ = writeln!(
            self.writer,
            "[dispatch] {}ms origin={:?} delay={}ms",
            ms(e.at),
            e.origin,
            e.delay.millis(),
        );
    }

    fn on_reveal(&mut self, e: &RevealEvent) {
        let _ = match e.outcome {
            Outcome::Revealed(r) => writeln!(
                self.writer,
                "[reveal] {}ms promoted={} descendants={} tagged={} reloaded={}",
                ms(e.at),
                r.promoted,
                r.descendants,
                r.tagged,
                r.reloaded,
            ),
            Outcome::AlreadyRevealed => {
                writeln!(self.writer, "[reveal] {}ms already revealed", ms(e.at))
            }
            Outcome::Declined => writeln!(self.writer, "[reveal] {}ms declined", ms(e.at)),
        };
    }

    fn on_preload(&mut self, e: &PreloadEvent) {
        let _ = writeln!(self.writer, "[preload] {}ms {}", ms(e.at), e.href);
    }

    fn on_reinject(&mut self, e: &ReinjectEvent) {
        let _ = writeln!(
            self.writer,
            "[reinject] {}ms #{} {} gate={:?}",
            ms(e.at),
            e.seq,
            e.src.as_deref().unwrap_or("<inline>"),
            e.gate,
        );
    }

    fn on_script_settled(&mut self, e: &ScriptSettledEvent) {
        let _ = writeln!(
            self.writer,
            "[settled] {}ms #{} {:?}",
            ms(e.at),
            e.seq,
            e.settle,
        );
    }

    fn on_host_error(&mut self, e: &HostErrorEvent) {
        let _ = writeln!(
            self.writer,
            "[error] {}ms {:?}: {}",
            ms(e.at),
            e.operation,
            e.error,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deferral_core::error::HostError;
    use deferral_core::trace::Operation;

    #[test]
    fn pretty_print_phase() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_phase(&PhaseEvent {
            at: HostTime(340),
            from: ReadinessState::Ready,
            to: ReadinessState::Interacting,
            forced: true,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(output, "[phase] 340ms ready -> interacting (deadline)\n");
    }

    #[test]
    fn pretty_print_error_uses_display() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_host_error(&HostErrorEvent {
            at: HostTime(5),
            operation: Operation::Observe,
            error: HostError::InvalidSelector("img[".into()),
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("Observe: invalid selector `img[`"), "got: {output}");
    }
}
