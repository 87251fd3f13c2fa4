// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Phase-based task scheduling.
//!
//! The [`Scheduler`] tracks the page's [`ReadinessState`] and buffers work
//! created before the page has loaded in two FIFO queues:
//!
//! - the **fast** queue, flushed when the load-equivalent event fires, and
//! - the **lazy** queue, flushed on the first qualifying user gesture (or
//!   when the [`LazyMode::Deadline`] timer expires).
//!
//! It is a pure state machine: it never talks to a host. Callers feed it
//! lifecycle events and dispatch whatever [`QueuedTask`]s it hands back. The
//! runtime in [`defer`](crate::defer) does exactly that with the host timer.
//!
//! ```text
//!   schedule() ──► Booting? ──no──► Admission::Dispatch
//!                     │
//!                    yes ──► fast / lazy queue
//!
//!   page_loaded()  Booting → Ready        ──► fast queue, FIFO
//!   interacted()   Ready   → Interacting  ──► lazy queue, FIFO
//! ```

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::time::Delay;

/// Lifecycle phase of the page. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadinessState {
    /// The load-equivalent event has not fired yet.
    Booting,
    /// The page has loaded; no qualifying gesture yet.
    Ready,
    /// The user has interacted with the page.
    Interacting,
}

/// Process-wide default for calls that leave `lazy` unspecified.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LazyMode {
    /// Unspecified calls go to the fast queue.
    #[default]
    Off,
    /// Unspecified calls wait for a user gesture.
    On,
    /// Like [`On`](Self::On), but the lazy queue is force-flushed this long
    /// after the page becomes ready if no gesture has happened.
    Deadline(Delay),
}

impl LazyMode {
    /// Returns `true` if unspecified calls should be lazy.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Returns the force-flush deadline, if any.
    #[must_use]
    pub const fn deadline(self) -> Option<Delay> {
        match self {
            Self::Deadline(d) => Some(d),
            _ => None,
        }
    }
}

impl From<bool> for LazyMode {
    fn from(lazy: bool) -> Self {
        if lazy { Self::On } else { Self::Off }
    }
}

/// Which queue a task was buffered in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Flushed on page load.
    Fast,
    /// Flushed on first user gesture.
    Lazy,
}

/// A buffered callback with the delay it was scheduled with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedTask<T> {
    /// The callback.
    pub task: T,
    /// Delay to hand to the dispatcher, unmodified.
    pub delay: Delay,
}

/// What [`Scheduler::schedule`] did with a task.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission<T> {
    /// The page is ready: hand the task to the dispatcher now.
    Dispatch(QueuedTask<T>),
    /// The task was buffered.
    Queued(Lane),
}

/// Work released by the load-equivalent event.
#[derive(Debug, PartialEq, Eq)]
pub struct LoadFlush<T> {
    /// The fast queue, in scheduling order.
    pub dispatch: Vec<QueuedTask<T>>,
    /// `true` if the lazy queue is non-empty and gesture listeners should be
    /// attached.
    pub await_gesture: bool,
    /// Force-flush deadline to arm alongside the gesture listeners.
    pub deadline: Option<Delay>,
}

/// Readiness tracker plus the fast/lazy queue pair.
#[derive(Debug)]
pub struct Scheduler<T> {
    state: ReadinessState,
    lazy_mode: LazyMode,
    fast: VecDeque<QueuedTask<T>>,
    lazy: VecDeque<QueuedTask<T>>,
}

impl<T> Scheduler<T> {
    /// Creates a scheduler in the [`Booting`](ReadinessState::Booting) phase.
    #[must_use]
    pub fn new(lazy_mode: LazyMode) -> Self {
        Self {
            state: ReadinessState::Booting,
            lazy_mode,
            fast: VecDeque::new(),
            lazy: VecDeque::new(),
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub fn state(&self) -> ReadinessState {
        self.state
    }

    /// Returns the process-wide lazy default.
    #[must_use]
    pub fn lazy_mode(&self) -> LazyMode {
        self.lazy_mode
    }

    /// Changes the process-wide lazy default. Already-queued tasks keep their
    /// lane.
    pub fn set_lazy_mode(&mut self, mode: LazyMode) {
        self.lazy_mode = mode;
    }

    /// Returns the number of buffered `(fast, lazy)` tasks.
    #[must_use]
    pub fn pending(&self) -> (usize, usize) {
        (self.fast.len(), self.lazy.len())
    }

    /// Admits a task.
    ///
    /// Once the page is ready every task is dispatched at once, whatever
    /// `lazy` says. Before that, `lazy` picks the queue; `None` defers to the
    /// process-wide [`LazyMode`].
    pub fn schedule(&mut self, task: T, delay: Delay, lazy: Option<bool>) -> Admission<T> {
        let queued = QueuedTask { task, delay };
        if self.state >= ReadinessState::Ready {
            return Admission::Dispatch(queued);
        }
        if lazy.unwrap_or(self.lazy_mode.is_active()) {
            self.lazy.push_back(queued);
            Admission::Queued(Lane::Lazy)
        } else {
            self.fast.push_back(queued);
            Admission::Queued(Lane::Fast)
        }
    }

    /// Handles the load-equivalent event: Booting → Ready.
    ///
    /// Returns `None` if the page was already past Booting.
    pub fn page_loaded(&mut self) -> Option<LoadFlush<T>> {
        if self.state != ReadinessState::Booting {
            return None;
        }
        self.state = ReadinessState::Ready;
        let await_gesture = !self.lazy.is_empty();
        Some(LoadFlush {
            dispatch: self.fast.drain(..).collect(),
            await_gesture,
            deadline: if await_gesture {
                self.lazy_mode.deadline()
            } else {
                None
            },
        })
    }

    /// Handles the first qualifying gesture (or the lazy deadline):
    /// Ready → Interacting.
    ///
    /// Returns the lazy queue in scheduling order, or `None` if the page is
    /// not in the Ready phase.
    pub fn interacted(&mut self) -> Option<Vec<QueuedTask<T>>> {
        if self.state != ReadinessState::Ready {
            return None;
        }
        self.state = ReadinessState::Interacting;
        Some(self.lazy.drain(..).collect())
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new(LazyMode::Off)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    fn tasks<T: Copy>(queued: &[QueuedTask<T>]) -> Vec<T> {
        queued.iter().map(|q| q.task).collect()
    }

    #[test]
    fn fast_queue_flushes_in_scheduling_order() {
        let mut sched = Scheduler::new(LazyMode::Off);
        for (i, ms) in [(1, 50), (2, 0), (3, 10)] {
            assert_eq!(
                sched.schedule(i, Delay(ms), None),
                Admission::Queued(Lane::Fast)
            );
        }

        let flush = sched.page_loaded().unwrap();
        assert_eq!(tasks(&flush.dispatch), vec![1, 2, 3]);
        // Delays are passed through untouched.
        assert_eq!(flush.dispatch[0].delay, Delay(50));
        assert_eq!(flush.dispatch[2].delay, Delay(10));
        assert!(!flush.await_gesture);
        assert_eq!(sched.state(), ReadinessState::Ready);
    }

    #[test]
    fn explicit_lazy_overrides_default() {
        let mut sched = Scheduler::new(LazyMode::On);
        assert_eq!(
            sched.schedule('a', Delay::ZERO, Some(false)),
            Admission::Queued(Lane::Fast)
        );
        assert_eq!(
            sched.schedule('b', Delay::ZERO, None),
            Admission::Queued(Lane::Lazy)
        );

        let mut off = Scheduler::new(LazyMode::Off);
        assert_eq!(
            off.schedule('c', Delay::ZERO, Some(true)),
            Admission::Queued(Lane::Lazy)
        );
        assert_eq!(off.pending(), (0, 1));
    }

    #[test]
    fn lazy_queue_waits_for_interaction() {
        let mut sched = Scheduler::new(LazyMode::Off);
        sched.schedule("fast", Delay::ZERO, None);
        sched.schedule("lazy-1", Delay(5), Some(true));
        sched.schedule("lazy-2", Delay::ZERO, Some(true));

        let flush = sched.page_loaded().unwrap();
        assert_eq!(tasks(&flush.dispatch), vec!["fast"]);
        assert!(flush.await_gesture);
        assert_eq!(flush.deadline, None);

        let lazy = sched.interacted().unwrap();
        assert_eq!(tasks(&lazy), vec!["lazy-1", "lazy-2"]);
        assert_eq!(lazy[0].delay, Delay(5));
        assert_eq!(sched.state(), ReadinessState::Interacting);
    }

    #[test]
    fn deadline_is_reported_only_with_pending_lazy_work() {
        let mut sched = Scheduler::new(LazyMode::Deadline(Delay(300)));
        sched.schedule(1, Delay::ZERO, None);
        let flush = sched.page_loaded().unwrap();
        assert!(flush.dispatch.is_empty());
        assert_eq!(flush.deadline, Some(Delay(300)));

        let mut idle = Scheduler::<u8>::new(LazyMode::Deadline(Delay(300)));
        let flush = idle.page_loaded().unwrap();
        assert!(!flush.await_gesture);
        assert_eq!(flush.deadline, None);
    }

    #[test]
    fn tasks_bypass_queues_once_ready() {
        let mut sched = Scheduler::new(LazyMode::On);
        sched.page_loaded().unwrap();
        assert_eq!(
            sched.schedule(9, Delay(20), Some(true)),
            Admission::Dispatch(QueuedTask {
                task: 9,
                delay: Delay(20)
            })
        );
        assert_eq!(sched.pending(), (0, 0));
    }

    #[test]
    fn transitions_are_forward_only() {
        let mut sched = Scheduler::<u8>::default();
        assert!(sched.interacted().is_none(), "gesture while booting");
        assert_eq!(sched.state(), ReadinessState::Booting);

        assert!(sched.page_loaded().is_some());
        assert!(sched.page_loaded().is_none(), "second load is ignored");

        assert!(sched.interacted().is_some());
        assert!(sched.interacted().is_none(), "second gesture is ignored");
        assert_eq!(sched.state(), ReadinessState::Interacting);
    }

    #[test]
    fn lazy_mode_from_bool() {
        assert_eq!(LazyMode::from(true), LazyMode::On);
        assert_eq!(LazyMode::from(false), LazyMode::Off);
        assert!(LazyMode::Deadline(Delay(1)).is_active());
        assert_eq!(LazyMode::On.deadline(), None);
    }
}
