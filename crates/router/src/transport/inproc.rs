// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `inproc://` transport: a device running in the same process as the
//! router, wired up without any socket or JSON codec in between. This is
//! the fast path spec §4.8 alludes to with "factories keyed on URI scheme"
//! — `inproc` is simply the scheme whose factory skips serialization.
//!
//! [`InprocProvider`] still speaks [`Payload`] at its boundary (so it goes
//! through exactly the same [`RouterState::dispatch_be`] path a real
//! socket would) but resolves `Get`/`Call` directly against a
//! [`malcolm_core::Device`] instead of decoding bytes off a wire.

use std::collections::HashMap;
use std::sync::Arc;

use malcolm_core::Device;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::frame::{split_endpoint, Payload};
use crate::transport::{BeOutbox, RouterState};

/// One live attribute-change forwarder, keyed by the `(client, id)` pair
/// the `Subscribe` request that started it carried — the same key
/// `ProviderRegistry::record_subscription` uses, so an `Unsubscribe`
/// carrying the original `id` can find and cancel the matching task.
type SubTable = Arc<Mutex<HashMap<(String, u64), JoinHandle<()>>>>;

/// Bridges one in-process [`Device`] to a [`RouterState`] as though it were
/// a backend connection, using `provider_identity` as its connection id.
pub struct InprocProvider {
    provider_identity: String,
    task: JoinHandle<()>,
    subs: SubTable,
}

impl InprocProvider {
    /// Register `device` with `state` and spawn the task that serves its
    /// backend traffic. Mirrors the wire handshake: registers under
    /// `Ready{device: device.name()}` before accepting any requests.
    pub async fn spawn(state: Arc<RouterState>, provider_identity: impl Into<String>, device: Arc<Device>) -> Self {
        let provider_identity = provider_identity.into();
        let (tx, mut rx): (BeOutbox, _) = mpsc::unbounded_channel();
        state.register_be(provider_identity.clone(), tx).await;
        state
            .router
            .handle_be(&provider_identity, "", Payload::Ready { device: device.name().to_owned() })
            .await;

        let subs: SubTable = Arc::new(Mutex::new(HashMap::new()));
        let pid = provider_identity.clone();
        let task_subs = subs.clone();
        let task = tokio::spawn(async move {
            while let Some((client, payload)) = rx.recv().await {
                match payload {
                    Payload::Subscribe { id, ref param } => {
                        let reply = subscribe(&state, &device, &pid, &client, id, param, &task_subs).await;
                        state.dispatch_be(&pid, &client, reply).await;
                    }
                    Payload::Unsubscribe { id, .. } => {
                        if let Some(handle) = task_subs.lock().await.remove(&(client.clone(), id)) {
                            handle.abort();
                        }
                        state.dispatch_be(&pid, &client, Payload::Return { id, val: serde_json::Value::Null }).await;
                    }
                    other => {
                        let reply = dispatch_to_device(&device, &other).await;
                        state.dispatch_be(&pid, &client, reply).await;
                    }
                }
            }
        });

        Self { provider_identity, task, subs }
    }

    pub fn provider_identity(&self) -> &str {
        &self.provider_identity
    }

    pub async fn shutdown(self) {
        for (_, handle) in self.subs.lock().await.drain() {
            handle.abort();
        }
        self.task.abort();
    }
}

/// Resolve `param` to an attribute, spawn the task that forwards every
/// subsequent change as a `Value{id, val}` frame back through the router
/// (spec §4.7's `Subscribe` row: "forward; record ... so later `Value`
/// notifications re-route"), and acknowledge the subscription itself with
/// a `Return`. The forwarder runs until `Unsubscribe` aborts it or the
/// attribute's change channel closes with the device.
async fn subscribe(
    state: &Arc<RouterState>,
    device: &Arc<Device>,
    pid: &str,
    client: &str,
    id: u64,
    param: &str,
    subs: &SubTable,
) -> Payload {
    let Some((_device, path)) = split_endpoint(param) else {
        return Payload::error(id, format!("malformed endpoint: {param}"));
    };
    let Some(cell) = device.attribute(path) else {
        return Payload::error(id, format!("no such attribute: {path}"));
    };
    let mut changes = cell.read().await.subscribe();
    let task_state = state.clone();
    let task_pid = pid.to_owned();
    let task_client = client.to_owned();
    let handle = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    let val = serde_json::to_value(change.value).unwrap_or(serde_json::Value::Null);
                    task_state.dispatch_be(&task_pid, &task_client, Payload::Value { id, val }).await;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    });
    subs.lock().await.insert((client.to_owned(), id), handle);
    Payload::Return { id, val: serde_json::Value::Null }
}

/// Resolve a single `Get`/`Call` request against `device`, returning the
/// terminal `Return`/`Error` frame the router forwards back to the client.
/// `Subscribe`/`Unsubscribe` are intercepted earlier, in [`InprocProvider::spawn`]'s
/// loop, since they need to start or stop a forwarding task rather than
/// produce a single reply.
async fn dispatch_to_device(device: &Device, payload: &Payload) -> Payload {
    match payload {
        Payload::Get { id, param } => match split_endpoint(param) {
            Some((_device, path)) => match device.attribute(path) {
                Some(cell) => {
                    let attr = cell.read().await;
                    Payload::Return { id: *id, val: serde_json::to_value(attr.value()).unwrap_or_default() }
                }
                None => Payload::error(*id, format!("no such attribute: {path}")),
            },
            None => Payload::error(*id, format!("malformed endpoint: {param}")),
        },
        Payload::Call { id, method, args } => match split_endpoint(method) {
            Some((_device, name)) => {
                let args = serde_json::to_value(args).unwrap_or(serde_json::Value::Null);
                match device.call(name, args).await {
                    Ok(()) => Payload::Return { id: *id, val: serde_json::Value::Null },
                    Err(e) => Payload::error(*id, e.to_string()),
                }
            }
            None => Payload::error(*id, format!("malformed endpoint: {method}")),
        },
        other => {
            warn!(?other, "inproc provider received an unexpected frame shape");
            Payload::error(other.id().unwrap_or(0), "unexpected frame")
        }
    }
}

#[cfg(test)]
#[path = "inproc_tests.rs"]
mod tests;
