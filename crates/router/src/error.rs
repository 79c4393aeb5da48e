// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router-level error kinds (spec §7), extending `malcolm_core::MalcolmError`
//! with the two kinds that only make sense once devices are reached through
//! a transport: [`RouterError::NoProvider`] and
//! [`RouterError::TransportError`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum RouterError {
    /// The router could not resolve a device, attribute, or method name.
    #[error("no such endpoint: {0}")]
    NoSuchEndpoint(String),

    /// A device name has no registered backend provider.
    #[error("no device named {0} registered")]
    NoProvider(String),

    /// Frame decode failure or peer disconnect.
    #[error("transport error: {0}")]
    TransportError(String),

    /// A device-level `MalcolmError` surfaced while forwarding a call.
    #[error(transparent)]
    Device(#[from] malcolm_core::MalcolmError),
}

impl RouterError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSuchEndpoint(_) => "NO_SUCH_ENDPOINT",
            Self::NoProvider(_) => "NO_PROVIDER",
            Self::TransportError(_) => "TRANSPORT_ERROR",
            Self::Device(e) => e.code(),
        }
    }

    /// The exact wording spec §8 S6 requires for an unknown device: `"No
    /// device named X registered"`.
    pub fn no_provider_message(device: &str) -> String {
        format!("No device named {device} registered")
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
