// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device lifecycle state (spec §3 "Device state (`DState`)"). Grounded on
//! the `DState` enum referenced throughout `test/core/test_device.py`
//! (`DState.Idle`, `DState.configurable()`, ...): a flat enumeration
//! partitioned into `rest`/`configurable`/`runnable`/`busy` classes, with
//! classifier predicates instead of literal state lists (spec §3 invariant:
//! "Only classifiers, never literal lists, may be used in method guards").

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DState {
    Idle,
    Configuring,
    Ready,
    Running,
    Pausing,
    Paused,
    Aborting,
    Aborted,
    Resetting,
    Fault,
}

impl DState {
    /// `rest = {Idle, Ready, Paused, Fault, Aborted}` — states in which a
    /// device accepts new commands.
    pub fn is_rest(self) -> bool {
        matches!(self, Self::Idle | Self::Ready | Self::Paused | Self::Fault | Self::Aborted)
    }

    /// `configurable ⊇ rest \ {Fault}`.
    pub fn is_configurable(self) -> bool {
        self.is_rest() && !matches!(self, Self::Fault)
    }

    /// `runnable = {Ready, Paused}`.
    pub fn is_runnable(self) -> bool {
        matches!(self, Self::Ready | Self::Paused)
    }

    /// All transient (non-rest) states.
    pub fn is_busy(self) -> bool {
        !self.is_rest()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Configuring => "Configuring",
            Self::Ready => "Ready",
            Self::Running => "Running",
            Self::Pausing => "Pausing",
            Self::Paused => "Paused",
            Self::Aborting => "Aborting",
            Self::Aborted => "Aborted",
            Self::Resetting => "Resetting",
            Self::Fault => "Fault",
        }
    }
}

impl fmt::Display for DState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
