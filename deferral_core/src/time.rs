// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host time and task delays.
//!
//! [`HostTime`] is a point in time read from the host clock, in milliseconds
//! since page navigation (the unit of `performance.now()` and of simulated
//! clocks). It is only used to timestamp trace events and to drive simulated
//! timers.
//!
//! [`Delay`] is the millisecond delay handed to the host timer with a task.
//! The scheduler treats it as opaque: it is stored alongside queued tasks and
//! passed through unmodified.

use core::fmt;
use core::ops::{Add, Sub};

/// A point in time, in whole milliseconds on the host clock.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw millisecond value.
    #[inline]
    #[must_use]
    pub const fn millis(self) -> u64 {
        self.0
    }

    /// Returns the host time at which a timer armed now with `delay` fires.
    #[inline]
    #[must_use]
    pub const fn after(self, delay: Delay) -> Self {
        Self(self.0.saturating_add(delay.0 as u64))
    }
}

impl Add<Delay> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Delay) -> Self {
        self.after(rhs)
    }
}

/// Milliseconds from `rhs` to `self`, or zero if `rhs` is later.
impl Sub for HostTime {
    type Output = u64;

    #[inline]
    fn sub(self, rhs: Self) -> u64 {
        self.0.saturating_sub(rhs.0)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({}ms)", self.0)
    }
}

/// A timer delay in milliseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Delay(pub u32);

impl Delay {
    /// Run on the next macrotask.
    pub const ZERO: Self = Self(0);

    /// Returns the raw millisecond value.
    #[inline]
    #[must_use]
    pub const fn millis(self) -> u32 {
        self.0
    }

    /// Returns the delay as the signed 32-bit timeout browsers accept,
    /// clamped to `i32::MAX`.
    #[inline]
    #[must_use]
    pub fn as_timeout(self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }
}

impl From<u32> for Delay {
    fn from(ms: u32) -> Self {
        Self(ms)
    }
}

impl fmt::Debug for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Delay({}ms)", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_time_after_delay() {
        let t = HostTime(1_000);
        assert_eq!(t.after(Delay(300)), HostTime(1_300));
        assert_eq!(t + Delay::ZERO, t);
        assert_eq!(HostTime(u64::MAX).after(Delay(5)), HostTime(u64::MAX));
    }

    #[test]
    fn elapsed_time_saturates() {
        let t = HostTime(1_000);
        assert_eq!(t - HostTime(400), 600);
        assert_eq!(t - HostTime(1_500), 0);
        assert_eq!(HostTime::default() - HostTime(u64::MAX), 0);
    }

    #[test]
    fn timeout_is_clamped() {
        assert_eq!(Delay::ZERO.as_timeout(), 0);
        assert_eq!(Delay(32).as_timeout(), 32);
        assert_eq!(Delay(u32::MAX).as_timeout(), i32::MAX);
    }
}
