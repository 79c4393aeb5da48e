// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire frame types (spec §4.7/§6). Every frame is a single UTF-8 JSON
//! object with a `type` discriminant; [`Payload`] models the discriminant
//! and its fields, [`Frame`] adds the channel-specific identity prefix
//! (`fe`/`cs` carry a client identity, `be` carries both a device identity
//! and the client identity it is acting on behalf of) that the router uses
//! to correlate a reply with the connection that is waiting on it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single wire frame's payload: the `type`-discriminated JSON object of
/// spec §6. Request variants (`Get`/`Call`/`Subscribe`/`Unsubscribe`) carry
/// the client-assigned `id`; response variants (`Return`/`Value`/`Error`)
/// echo it back. `Ready`/`Exiting` are the provider handshake/shutdown
/// frames and carry no `id` — they are not correlated to a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    Get {
        id: u64,
        param: String,
    },
    Call {
        id: u64,
        method: String,
        #[serde(default)]
        args: IndexMap<String, serde_json::Value>,
    },
    Subscribe {
        id: u64,
        param: String,
    },
    Unsubscribe {
        id: u64,
        param: String,
    },
    Return {
        id: u64,
        val: serde_json::Value,
    },
    Value {
        id: u64,
        val: serde_json::Value,
    },
    Error {
        id: u64,
        message: String,
    },
    /// Provider handshake: `{type:"Ready", device}` (spec §6).
    Ready {
        device: String,
    },
    /// Provider shutdown notice: `{type:"Exiting"}` (spec §6).
    Exiting,
}

impl Payload {
    /// The correlation id of a request/response frame, or `None` for the
    /// provider handshake frames that carry no id.
    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Get { id, .. }
            | Self::Call { id, .. }
            | Self::Subscribe { id, .. }
            | Self::Unsubscribe { id, .. }
            | Self::Return { id, .. }
            | Self::Value { id, .. }
            | Self::Error { id, .. } => Some(*id),
            Self::Ready { .. } | Self::Exiting => None,
        }
    }

    /// The dotted endpoint a request frame targets (`Get`/`Call`/
    /// `Subscribe`/`Unsubscribe` all carry exactly one).
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Get { param, .. } | Self::Subscribe { param, .. } | Self::Unsubscribe { param, .. } => {
                Some(param)
            }
            Self::Call { method, .. } => Some(method),
            _ => None,
        }
    }

    pub fn error(id: u64, message: impl Into<String>) -> Self {
        Self::Error { id, message: message.into() }
    }
}

/// Splits a dotted endpoint `"<device>.<rest>"` into its device name and
/// remainder, the way every `Get`/`Call`/`Subscribe` target other than the
/// literal `"malcolm"` / `"malcolm.*"` router endpoints is addressed.
pub fn split_endpoint(endpoint: &str) -> Option<(&str, &str)> {
    endpoint.split_once('.')
}

/// An inbound or outbound frame, tagged with the channel it travels on
/// (spec §4.7: "three streams: fe, be, cs").
///
/// Identities here are *socket*/connection identities (the ZeroMQ `ROUTER`
/// sense), not device names — a device's business name is carried inside
/// the [`Payload`] itself (`Ready.device`, or the dotted prefix of
/// `Get.param`/`Call.method`). [`ProviderRegistry`](crate::registry::ProviderRegistry)
/// is what maps one to the other.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `[identity, payload]` on the frontend (client-facing) stream.
    Fe { client: String, payload: Payload },
    /// `[identity, payload]` on the control/status stream.
    Cs { client: String, payload: Payload },
    /// `[provider_identity, client_identity, payload]` on the backend
    /// (provider-facing) stream — the provider must echo both identities
    /// on every response so the router can route it back (spec §6).
    Be { provider: String, client: String, payload: Payload },
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
