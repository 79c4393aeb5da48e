// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::vtype::VType;

/// Unified error kinds shared across the type system, state machine, and
/// method dispatch (spec §7).
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum MalcolmError {
    /// A value failed `VType::validate`.
    #[error("value {value} does not validate against type {expected:?}")]
    TypeMismatch { value: String, expected: VType },

    /// A method was invoked outside its declared `valid_states`.
    #[error("method {method} is not valid in state {state}")]
    WrongState { method: String, state: String },

    /// The router could not resolve a device, attribute, or method.
    #[error("no such endpoint: {0}")]
    NoSuchEndpoint(String),

    /// A transition handler raised; the device has moved to its error state.
    #[error("transition handler failed: {0}")]
    HandlerFailed(String),

    /// `wait_for_transition` exceeded the device's configured timeout.
    #[error("timed out waiting for a rest state")]
    Timeout,
}

impl MalcolmError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::WrongState { .. } => "WRONG_STATE",
            Self::NoSuchEndpoint(_) => "NO_SUCH_ENDPOINT",
            Self::HandlerFailed(_) => "HANDLER_FAILED",
            Self::Timeout => "TIMEOUT",
        }
    }
}

pub type Result<T> = std::result::Result<T, MalcolmError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
