// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider registry — tracks which connection identity owns which device
//! name (spec §4.7 "Provider lifecycle"), and the `(client, id) -> device`
//! mapping a `Subscribe` forwards with so later unsolicited `Value` frames
//! can be scrubbed when the client unsubscribes. Grounded on the teacher's
//! `broker/registry.rs` `PodRegistry` — same read-mostly `RwLock<HashMap>`
//! shape, swapped from "pod health" bookkeeping to "device ownership".

use std::collections::HashMap;

use tokio::sync::RwLock;

/// Registry of registered device providers and active subscriptions.
/// Touched only by the router's own task (spec §5: "Router tables ...
/// are touched only by the router's single task"), but kept behind a lock
/// so the surrounding connection-handling tasks can still share one
/// instance without the router needing to own every socket directly.
#[derive(Default)]
pub struct ProviderRegistry {
    /// device name -> connection identity of the backend that provides it.
    providers: RwLock<HashMap<String, String>>,
    /// (client identity, request id) -> device name, recorded on Subscribe
    /// and dropped on Unsubscribe (spec §4.7's Subscribe row).
    subscriptions: RwLock<HashMap<(String, u64), String>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `provider_identity` now owns `device` (a `{type:"Ready",
    /// device}` handshake, spec §4.7).
    pub async fn register(&self, device: impl Into<String>, provider_identity: impl Into<String>) {
        self.providers.write().await.insert(device.into(), provider_identity.into());
    }

    /// Drop every device owned by `provider_identity` (a provider
    /// disconnect or `{type:"Exiting"}`).
    pub async fn deregister_provider(&self, provider_identity: &str) -> Vec<String> {
        let mut providers = self.providers.write().await;
        let dropped: Vec<String> = providers
            .iter()
            .filter(|(_, owner)| owner.as_str() == provider_identity)
            .map(|(device, _)| device.clone())
            .collect();
        for device in &dropped {
            providers.remove(device);
        }
        dropped
    }

    /// Resolve the connection identity that currently owns `device`.
    pub async fn provider_for(&self, device: &str) -> Option<String> {
        self.providers.read().await.get(device).cloned()
    }

    /// The sorted list of currently-registered device names (spec §4.7
    /// `Call malcolm.devices`).
    pub async fn device_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every currently-registered provider connection identity, for
    /// broadcasting `malcolm.exit` (spec §4.7).
    pub async fn provider_identities(&self) -> Vec<String> {
        let mut ids: Vec<String> =
            self.providers.read().await.values().cloned().collect::<std::collections::HashSet<_>>().into_iter().collect();
        ids.sort();
        ids
    }

    pub async fn record_subscription(&self, client: impl Into<String>, id: u64, device: impl Into<String>) {
        self.subscriptions.write().await.insert((client.into(), id), device.into());
    }

    pub async fn drop_subscription(&self, client: &str, id: u64) -> Option<String> {
        self.subscriptions.write().await.remove(&(client.to_owned(), id))
    }

    #[cfg(test)]
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
