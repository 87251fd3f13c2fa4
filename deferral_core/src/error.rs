// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported by host operations.

use alloc::string::String;
use core::fmt;

/// A failed host document operation.
///
/// Scheduled work that hits one of these stops at that point; the error is
/// reported to the trace sink and never reaches other tasks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostError {
    /// The selector could not be parsed by the host.
    InvalidSelector(String),
    /// The host refused to create an element with this tag name.
    CreateFailed(String),
    /// The host rejected an attribute name or value.
    InvalidAttribute(String),
    /// The document has no `<head>` to attach to.
    MissingHead,
    /// Replacing or attaching a node failed.
    InsertFailed(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSelector(sel) => write!(f, "invalid selector `{sel}`"),
            Self::CreateFailed(tag) => write!(f, "failed to create <{tag}> element"),
            Self::InvalidAttribute(name) => write!(f, "invalid attribute `{name}`"),
            Self::MissingHead => f.write_str("document has no <head> element"),
            Self::InsertFailed(reason) => write!(f, "node insertion failed: {reason}"),
        }
    }
}

impl core::error::Error for HostError {}
