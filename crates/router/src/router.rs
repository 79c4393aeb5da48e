// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cooperative broker (spec §4.7 "Router"): resolves dotted endpoints
//! against the [`ProviderRegistry`] and decides, for every inbound frame,
//! which outbound frames to send and to which connections.
//!
//! `Router` is deliberately transport-agnostic: [`Router::handle_fe`] and
//! [`Router::handle_be`] are pure with respect to I/O — they read/write the
//! registry and return the [`Outbound`] frames a caller should deliver.
//! This keeps the routing table in §4.7 directly unit-testable (see
//! `router_tests.rs`) without any socket standing in the way, and lets
//! `transport::inproc`/`transport::ws` share one dispatch implementation.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::RouterError;
use crate::frame::{split_endpoint, Payload};
use crate::registry::ProviderRegistry;

/// An outbound frame the caller must deliver to a specific connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Deliver `payload` to the frontend client identified by `client`.
    ToFe { client: String, payload: Payload },
    /// Deliver `payload` to the backend provider identified by `provider`,
    /// on behalf of `client` (echoed back to us on the provider's reply).
    ToBe { provider: String, client: String, payload: Payload },
}

/// `Get malcolm` introspection document (spec §4.7): the router's own
/// method list, byte-for-byte the shape spec.md gives — `devices` and
/// `exit`, neither taking arguments.
fn router_introspection() -> serde_json::Value {
    serde_json::json!({
        "methods": {
            "devices": {"descriptor": "list the names of every registered device", "args": {}},
            "exit": {"descriptor": "shut down every registered provider and this router", "args": {}},
        }
    })
}

fn no_such_endpoint(id: u64, endpoint: &str) -> Payload {
    Payload::error(id, format!("no such endpoint: {endpoint}"))
}

pub struct Router {
    registry: ProviderRegistry,
    shutdown: CancellationToken,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { registry: ProviderRegistry::new(), shutdown: CancellationToken::new() }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Cancelled once a client calls `malcolm.exit` (spec §4.7).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Forward a request to whatever currently provides `device`, or reply
    /// with the `"No device named X registered"` error spec §8 S6 requires
    /// byte-for-byte if nothing is registered.
    async fn forward_or_no_provider(&self, client: &str, device: &str, id: u64, payload: Payload) -> Vec<Outbound> {
        match self.registry.provider_for(device).await {
            Some(provider) => vec![Outbound::ToBe { provider, client: client.to_owned(), payload }],
            None => {
                vec![Outbound::ToFe { client: client.to_owned(), payload: Payload::error(id, RouterError::no_provider_message(device)) }]
            }
        }
    }

    /// Dispatch a frame arriving on the frontend (client-facing) stream
    /// (spec §4.7's request-type table).
    pub async fn handle_fe(&self, client: &str, payload: Payload) -> Vec<Outbound> {
        match payload {
            Payload::Get { id, ref param } if param == "malcolm" => {
                vec![Outbound::ToFe { client: client.to_owned(), payload: Payload::Return { id, val: router_introspection() } }]
            }
            Payload::Get { id, ref param } => match split_endpoint(param) {
                Some((device, _path)) => self.forward_or_no_provider(client, device, id, payload.clone()).await,
                None => vec![Outbound::ToFe { client: client.to_owned(), payload: no_such_endpoint(id, param) }],
            },
            Payload::Call { id, ref method, .. } if method == "malcolm.devices" => {
                let names = self.registry.device_names().await;
                vec![Outbound::ToFe { client: client.to_owned(), payload: Payload::Return { id, val: serde_json::json!(names) } }]
            }
            Payload::Call { id, ref method, .. } if method == "malcolm.exit" => self.handle_exit(client, id).await,
            Payload::Call { id, ref method, .. } => match split_endpoint(method) {
                Some((device, _rest)) => self.forward_or_no_provider(client, device, id, payload.clone()).await,
                None => vec![Outbound::ToFe { client: client.to_owned(), payload: no_such_endpoint(id, method) }],
            },
            Payload::Subscribe { id, ref param } => match split_endpoint(param) {
                Some((device, _path)) => {
                    let out = self.forward_or_no_provider(client, device, id, payload.clone()).await;
                    if matches!(out.first(), Some(Outbound::ToBe { .. })) {
                        self.registry.record_subscription(client.to_owned(), id, device.to_owned()).await;
                    }
                    out
                }
                None => vec![Outbound::ToFe { client: client.to_owned(), payload: no_such_endpoint(id, param) }],
            },
            Payload::Unsubscribe { id, ref param } => {
                self.registry.drop_subscription(client, id).await;
                match split_endpoint(param) {
                    Some((device, _path)) => self.forward_or_no_provider(client, device, id, payload.clone()).await,
                    None => vec![Outbound::ToFe { client: client.to_owned(), payload: no_such_endpoint(id, param) }],
                }
            }
            other => {
                warn!(client, ?other, "frontend sent a response-shaped frame; ignoring");
                vec![]
            }
        }
    }

    /// `Call malcolm.exit`: broadcast `{type:"Exiting"}`-triggering shutdown
    /// to every registered provider, acknowledge the caller, and cancel the
    /// router's shutdown token so the owning binary can terminate.
    async fn handle_exit(&self, client: &str, id: u64) -> Vec<Outbound> {
        info!("malcolm.exit received; broadcasting shutdown to all providers");
        let mut out: Vec<Outbound> = self
            .registry
            .provider_identities()
            .await
            .into_iter()
            .map(|provider| Outbound::ToBe { provider, client: client.to_owned(), payload: Payload::Exiting })
            .collect();
        out.push(Outbound::ToFe { client: client.to_owned(), payload: Payload::Return { id, val: serde_json::Value::Null } });
        self.shutdown.cancel();
        out
    }

    /// Dispatch a frame arriving on the backend (provider-facing) stream:
    /// the `Ready` handshake, `Exiting` notice, or a `Return`/`Value`/
    /// `Error` reply the router routes straight back to the waiting client
    /// by the identity the provider echoed (spec §4.7 "Provider lifecycle").
    pub async fn handle_be(&self, provider: &str, client: &str, payload: Payload) -> Vec<Outbound> {
        match payload {
            Payload::Ready { ref device } => {
                self.registry.register(device.clone(), provider.to_owned()).await;
                info!(provider, device, "provider registered");
                vec![]
            }
            Payload::Exiting => {
                let dropped = self.registry.deregister_provider(provider).await;
                info!(provider, ?dropped, "provider disconnected");
                vec![]
            }
            Payload::Return { .. } | Payload::Value { .. } | Payload::Error { .. } => {
                vec![Outbound::ToFe { client: client.to_owned(), payload }]
            }
            other => {
                warn!(provider, ?other, "provider sent a request-shaped frame on the backend stream; ignoring");
                vec![]
            }
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
