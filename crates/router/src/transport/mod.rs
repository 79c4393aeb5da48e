// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction (spec §4.8): "`ClientSocket`/`ServerSocket` are
//! factories keyed on URI scheme... that decode incoming frames and either
//! invoke the registered callback (client) or dispatch to the router
//! (server)." [`inproc`] and [`ws`] are the two concrete schemes this crate
//! ships; both drive the same [`Router::handle_fe`]/[`Router::handle_be`]
//! dispatch so the routing table lives in exactly one place.

pub mod inproc;
pub mod ws;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::frame::Payload;
use crate::router::{Outbound, Router};

/// A boxed future, the same "no `async-trait`" idiom `malcolm_core`'s
/// `statemachine::HandlerFn` uses for its transition handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A frontend connection's outbound half: just the payload, since `fe`
/// frames on the wire are `[client_identity, payload]` and the identity is
/// the map key the transport already dispatches on.
pub type FeOutbox = mpsc::UnboundedSender<Payload>;

/// A backend connection's outbound half: the client identity travels with
/// the payload because `be` wire frames are `[provider_identity,
/// client_identity, payload]` (spec §6) — the provider must echo both.
pub type BeOutbox = mpsc::UnboundedSender<(String, Payload)>;

/// Shared router state plus the live outbound channel for every connection
/// currently attached, keyed by connection identity. Transports register a
/// connection here on accept and deregister it on disconnect; [`RouterState::deliver`]
/// is how a dispatch result actually reaches a socket.
pub struct RouterState {
    pub router: Router,
    fe_conns: RwLock<HashMap<String, FeOutbox>>,
    be_conns: RwLock<HashMap<String, BeOutbox>>,
}

impl Default for RouterState {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterState {
    pub fn new() -> Self {
        Self { router: Router::new(), fe_conns: RwLock::new(HashMap::new()), be_conns: RwLock::new(HashMap::new()) }
    }

    pub async fn register_fe(&self, client: impl Into<String>, outbox: FeOutbox) {
        self.fe_conns.write().await.insert(client.into(), outbox);
    }

    pub async fn deregister_fe(&self, client: &str) {
        self.fe_conns.write().await.remove(client);
    }

    pub async fn register_be(&self, provider: impl Into<String>, outbox: BeOutbox) {
        self.be_conns.write().await.insert(provider.into(), outbox);
    }

    /// A backend connection dropping is equivalent to it sending `Exiting`
    /// (spec §7: "Transport errors close ... the affected socket").
    pub async fn deregister_be(&self, provider: &str) -> Vec<String> {
        self.be_conns.write().await.remove(provider);
        self.router.handle_be(provider, "", Payload::Exiting).await;
        self.router.registry().device_names().await
    }

    /// Dispatch frames resulting from a frontend-originated frame and
    /// deliver every [`Outbound`] to whichever connection it targets.
    pub async fn dispatch_fe(&self, client: &str, payload: Payload) {
        let out = self.router.handle_fe(client, payload).await;
        self.deliver(out).await;
    }

    pub async fn dispatch_be(&self, provider: &str, client: &str, payload: Payload) {
        let out = self.router.handle_be(provider, client, payload).await;
        self.deliver(out).await;
    }

    async fn deliver(&self, out: Vec<Outbound>) {
        for item in out {
            match item {
                Outbound::ToFe { client, payload } => {
                    if let Some(tx) = self.fe_conns.read().await.get(&client) {
                        let _ = tx.send(payload);
                    }
                }
                Outbound::ToBe { provider, client, payload } => {
                    if let Some(tx) = self.be_conns.read().await.get(&provider) {
                        let _ = tx.send((client, payload));
                    }
                }
            }
        }
    }
}

pub type SharedRouterState = Arc<RouterState>;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
