// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime configuration.

use crate::reveal::RevealConfig;
use crate::scheduler::LazyMode;
use crate::time::Delay;

/// Configuration for a [`Defer`](crate::defer::Defer) runtime.
///
/// Selectors are only defaults; every operation that takes a selector
/// accepts an explicit one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeferConfig {
    /// Placeholder and descendant conventions for the reveal engine.
    pub reveal: RevealConfig,
    /// Selector used by `dom` when none is given.
    pub reveal_selector: &'static str,
    /// Selector used by `all` when none is given.
    pub reinject_selector: &'static str,
    /// Initial process-wide lazy default.
    pub lazy: LazyMode,
    /// Delay used by operations whose delay is left unspecified.
    pub default_delay: Delay,
}

impl DeferConfig {
    /// Web page conventions: `data-*` placeholders, `[data-src]` reveal
    /// targets, `script[type=deferjs]` reinjection targets, eager by default.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            reveal: RevealConfig::WEB,
            reveal_selector: "[data-src]",
            reinject_selector: "script[type=deferjs]",
            lazy: LazyMode::Off,
            default_delay: Delay::ZERO,
        }
    }

    /// Returns this configuration with a different initial lazy default.
    #[must_use]
    pub const fn with_lazy(mut self, lazy: LazyMode) -> Self {
        self.lazy = lazy;
        self
    }
}

impl Default for DeferConfig {
    fn default() -> Self {
        Self::web()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_defaults() {
        let config = DeferConfig::default();
        assert_eq!(config, DeferConfig::web());
        assert_eq!(config.reveal.placeholder_prefix, "data-");
        assert_eq!(config.reinject_selector, "script[type=deferjs]");
        assert_eq!(config.lazy, LazyMode::Off);
    }

    #[test]
    fn with_lazy_keeps_the_rest() {
        let config = DeferConfig::web().with_lazy(LazyMode::Deadline(Delay(300)));
        assert_eq!(config.lazy.deadline(), Some(Delay(300)));
        assert_eq!(config.reveal_selector, "[data-src]");
    }
}
