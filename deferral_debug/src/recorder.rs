// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as little-endian records, each starting with a one-byte tag.
//! Strings are stored as a `u32` byte length followed by UTF-8. [`decode`]
//! reads the records back as an iterator of [`RecordedEvent`].

use deferral_core::error::HostError;
use deferral_core::host::Settle;
use deferral_core::reinject::Gate;
use deferral_core::reveal::{Outcome, RevealReport};
use deferral_core::scheduler::{Lane, ReadinessState};
use deferral_core::time::{Delay, HostTime};
use deferral_core::trace::{
    DispatchOrigin, HostErrorEvent, Operation, PhaseEvent, PreloadEvent, ReinjectEvent,
    RevealEvent, ScriptSettledEvent, TaskDispatchEvent, TaskQueuedEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_PHASE: u8 = 1;
const TAG_TASK_QUEUED: u8 = 2;
const TAG_TASK_DISPATCHED: u8 = 3;
const TAG_REVEAL: u8 = 4;
const TAG_PRELOAD: u8 = 5;
const TAG_REINJECT: u8 = 6;
const TAG_SCRIPT_SETTLED: u8 = 7;
const TAG_HOST_ERROR: u8 = 8;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_count(&mut self, v: usize) {
        self.write_u32(u32::try_from(v).unwrap_or(u32::MAX));
    }

    fn write_str(&mut self, s: &str) {
        // Strings longer than u32::MAX bytes are truncated.
        let len = u32::try_from(s.len()).unwrap_or(u32::MAX);
        self.write_u32(len);
        self.buf.extend_from_slice(&s.as_bytes()[..len as usize]);
    }

    fn write_option_str(&mut self, s: Option<&str>) {
        match s {
            Some(s) => {
                self.write_u8(1);
                self.write_str(s);
            }
            None => self.write_u8(0),
        }
    }

    fn write_time(&mut self, t: HostTime) {
        self.write_u64(t.millis());
    }

    fn write_phase(&mut self, p: ReadinessState) {
        self.write_u8(match p {
            ReadinessState::Booting => 0,
            ReadinessState::Ready => 1,
            ReadinessState::Interacting => 2,
        });
    }

    fn write_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Revealed(r) => {
                self.write_u8(0);
                self.write_count(r.promoted);
                self.write_count(r.descendants);
                self.write_u8(u8::from(r.tagged));
                self.write_u8(u8::from(r.reloaded));
            }
            Outcome::AlreadyRevealed => self.write_u8(1),
            Outcome::Declined => self.write_u8(2),
        }
    }

    fn write_error(&mut self, error: &HostError) {
        match error {
            HostError::InvalidSelector(s) => {
                self.write_u8(0);
                self.write_str(s);
            }
            HostError::CreateFailed(s) => {
                self.write_u8(1);
                self.write_str(s);
            }
            HostError::InvalidAttribute(s) => {
                self.write_u8(2);
                self.write_str(s);
            }
            HostError::MissingHead => self.write_u8(3),
            HostError::InsertFailed(s) => {
                self.write_u8(4);
                self.write_str(s);
            }
        }
    }
}

impl TraceSink for RecorderSink {
    fn on_phase(&mut self, e: &PhaseEvent) {
        self.write_u8(TAG_PHASE);
        self.write_time(e.at);
        self.write_phase(e.from);
        self.write_phase(e.to);
        self.write_u8(u8::from(e.forced));
    }

    fn on_task_queued(&mut self, e: &TaskQueuedEvent) {
        self.write_u8(TAG_TASK_QUEUED);
        self.write_time(e.at);
        self.write_u8(match e.lane {
            Lane::Fast => 0,
            Lane::Lazy => 1,
        });
        self.write_u32(e.delay.millis());
    }

    fn on_task_dispatched(&mut self, e: &TaskDispatchEvent) {
        self.write_u8(TAG_TASK_DISPATCHED);
        self.write_time(e.at);
        self.write_u32(e.delay.millis());
        self.write_u8(match e.origin {
            DispatchOrigin::Direct => 0,
            DispatchOrigin::FastFlush => 1,
            DispatchOrigin::LazyFlush => 2,
        });
    }

    fn on_reveal(&mut self, e: &RevealEvent) {
        self.write_u8(TAG_REVEAL);
        self.write_time(e.at);
        self.write_outcome(e.outcome);
    }

    fn on_preload(&mut self, e: &PreloadEvent) {
        self.write_u8(TAG_PRELOAD);
        self.write_time(e.at);
        self.write_str(&e.href);
    }

    fn on_reinject(&mut self, e: &ReinjectEvent) {
        self.write_u8(TAG_REINJECT);
        self.write_time(e.at);
        self.write_count(e.seq);
        self.write_u8(match e.gate {
            Gate::Blocking => 0,
            Gate::Free => 1,
        });
        self.write_option_str(e.src.as_deref());
    }

    fn on_script_settled(&mut self, e: &ScriptSettledEvent) {
        self.write_u8(TAG_SCRIPT_SETTLED);
        self.write_time(e.at);
        self.write_count(e.seq);
        self.write_u8(match e.settle {
            Settle::Loaded => 0,
            Settle::Failed => 1,
        });
    }

    fn on_host_error(&mut self, e: &HostErrorEvent) {
        self.write_u8(TAG_HOST_ERROR);
        self.write_time(e.at);
        self.write_u8(match e.operation {
            Operation::Observe => 0,
            Operation::Reveal => 1,
            Operation::Stylesheet => 2,
            Operation::Script => 3,
            Operation::Reinject => 4,
        });
        self.write_error(&e.error);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    /// A [`PhaseEvent`].
    Phase(PhaseEvent),
    /// A [`TaskQueuedEvent`].
    TaskQueued(TaskQueuedEvent),
    /// A [`TaskDispatchEvent`].
    TaskDispatched(TaskDispatchEvent),
    /// A [`RevealEvent`].
    Reveal(RevealEvent),
    /// A [`PreloadEvent`].
    Preload(PreloadEvent),
    /// A [`ReinjectEvent`].
    Reinject(ReinjectEvent),
    /// A [`ScriptSettledEvent`].
    ScriptSettled(ScriptSettledEvent),
    /// A [`HostErrorEvent`].
    HostError(HostErrorEvent),
}

impl RecordedEvent {
    /// Returns the host time of the event.
    #[must_use]
    pub fn at(&self) -> HostTime {
        match self {
            Self::Phase(e) => e.at,
            Self::TaskQueued(e) => e.at,
            Self::TaskDispatched(e) => e.at,
            Self::Reveal(e) => e.at,
            Self::Preload(e) => e.at,
            Self::Reinject(e) => e.at,
            Self::ScriptSettled(e) => e.at,
            Self::HostError(e) => e.at,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take(&mut self, n: usize) -> Option<&[u8]> {
        let end = self.pos.checked_add(n)?;
        let bytes = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn read_u32(&mut self) -> Option<u32> {
        Some(u32::from_le_bytes(self.take(4)?.try_into().ok()?))
    }

    fn read_u64(&mut self) -> Option<u64> {
        Some(u64::from_le_bytes(self.take(8)?.try_into().ok()?))
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_count(&mut self) -> Option<usize> {
        usize::try_from(self.read_u32()?).ok()
    }

    fn read_str(&mut self) -> Option<String> {
        let len = self.read_count()?;
        let bytes = self.take(len)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    fn read_option_str(&mut self) -> Option<Option<String>> {
        match self.read_u8()? {
            0 => Some(None),
            _ => self.read_str().map(Some),
        }
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_phase(&mut self) -> Option<ReadinessState> {
        Some(match self.read_u8()? {
            0 => ReadinessState::Booting,
            1 => ReadinessState::Ready,
            _ => ReadinessState::Interacting,
        })
    }

    fn read_outcome(&mut self) -> Option<Outcome> {
        Some(match self.read_u8()? {
            0 => Outcome::Revealed(RevealReport {
                promoted: self.read_count()?,
                descendants: self.read_count()?,
                tagged: self.read_bool()?,
                reloaded: self.read_bool()?,
            }),
            1 => Outcome::AlreadyRevealed,
            _ => Outcome::Declined,
        })
    }

    fn read_error(&mut self) -> Option<HostError> {
        Some(match self.read_u8()? {
            0 => HostError::InvalidSelector(self.read_str()?),
            1 => HostError::CreateFailed(self.read_str()?),
            2 => HostError::InvalidAttribute(self.read_str()?),
            3 => HostError::MissingHead,
            _ => HostError::InsertFailed(self.read_str()?),
        })
    }

    fn decode_phase(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Phase(PhaseEvent {
            at: self.read_time()?,
            from: self.read_phase()?,
            to: self.read_phase()?,
            forced: self.read_bool()?,
        }))
    }

    fn decode_task_queued(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TaskQueued(TaskQueuedEvent {
            at: self.read_time()?,
            lane: if self.read_u8()? == 0 {
                Lane::Fast
            } else {
                Lane::Lazy
            },
            delay: Delay(self.read_u32()?),
        }))
    }

    fn decode_task_dispatched(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TaskDispatched(TaskDispatchEvent {
            at: self.read_time()?,
            delay: Delay(self.read_u32()?),
            origin: match self.read_u8()? {
                0 => DispatchOrigin::Direct,
                1 => DispatchOrigin::FastFlush,
                _ => DispatchOrigin::LazyFlush,
            },
        }))
    }

    fn decode_reveal(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Reveal(RevealEvent {
            at: self.read_time()?,
            outcome: self.read_outcome()?,
        }))
    }

    fn decode_preload(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Preload(PreloadEvent {
            at: self.read_time()?,
            href: self.read_str()?,
        }))
    }

    fn decode_reinject(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Reinject(ReinjectEvent {
            at: self.read_time()?,
            seq: self.read_count()?,
            gate: if self.read_u8()? == 0 {
                Gate::Blocking
            } else {
                Gate::Free
            },
            src: self.read_option_str()?,
        }))
    }

    fn decode_script_settled(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::ScriptSettled(ScriptSettledEvent {
            at: self.read_time()?,
            seq: self.read_count()?,
            settle: if self.read_u8()? == 0 {
                Settle::Loaded
            } else {
                Settle::Failed
            },
        }))
    }

    fn decode_host_error(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::HostError(HostErrorEvent {
            at: self.read_time()?,
            operation: match self.read_u8()? {
                0 => Operation::Observe,
                1 => Operation::Reveal,
                2 => Operation::Stylesheet,
                3 => Operation::Script,
                _ => Operation::Reinject,
            },
            error: self.read_error()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_PHASE => self.decode_phase(),
            TAG_TASK_QUEUED => self.decode_task_queued(),
            TAG_TASK_DISPATCHED => self.decode_task_dispatched(),
            TAG_REVEAL => self.decode_reveal(),
            TAG_PRELOAD => self.decode_preload(),
            TAG_REINJECT => self.decode_reinject(),
            TAG_SCRIPT_SETTLED => self.decode_script_settled(),
            TAG_HOST_ERROR => self.decode_host_error(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
