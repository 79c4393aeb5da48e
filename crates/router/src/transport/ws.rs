// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ws://` transport: the router's axum WebSocket server for frontend
//! clients and backend providers, plus a `tokio-tungstenite` client for
//! dialing *out* to a router — the other half of the same scheme, used by
//! a provider process that lives outside the router (spec §4.8: "a
//! background loop that decodes incoming frames and either invokes the
//! registered callback (client) or dispatches to the router (server)").
//! Grounded on the teacher's `mux/src/transport/ws_mux.rs` connection loop
//! and `mux/src/transport/mod.rs` route composition.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as TMessage;
use tracing::{debug, warn};

use crate::frame::Payload;
use crate::transport::{FeOutbox, SharedRouterState};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id(prefix: &str) -> String {
    format!("{prefix}-{}", NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed))
}

/// Compose the router's axum `Router`: `/fe` for clients, `/cs` for
/// control/status connections, `/be` for providers (spec §4.7 "three
/// streams"). Mirrors `build_router` in the teacher's `transport/mod.rs`.
pub fn build_router(state: SharedRouterState) -> axum::Router {
    axum::Router::new()
        .route("/fe", get(fe_ws_handler))
        .route("/cs", get(cs_ws_handler))
        .route("/be", get(be_ws_handler))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

/// `GET /fe` — WebSocket upgrade for a frontend client.
pub async fn fe_ws_handler(State(state): State<SharedRouterState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_fe_connection(state, socket, "fe"))
}

/// `GET /cs` — WebSocket upgrade for a control/status connection. Spec §4.7
/// describes `cs` as carrying the same `[identity, payload]` frame shape as
/// `fe`; the two streams differ only in which socket a client dials, so
/// `cs` connections share `fe`'s dispatch and connection table under their
/// own `cs-` prefixed identity.
pub async fn cs_ws_handler(State(state): State<SharedRouterState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_fe_connection(state, socket, "cs"))
}

/// `GET /be` — WebSocket upgrade for a backend provider.
pub async fn be_ws_handler(State(state): State<SharedRouterState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_be_connection(state, socket))
}

async fn handle_fe_connection(state: SharedRouterState, socket: WebSocket, id_prefix: &str) {
    let client = next_connection_id(id_prefix);
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx): (FeOutbox, _) = mpsc::unbounded_channel();
    state.register_fe(client.clone(), tx).await;

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                let Some(payload) = outgoing else { break };
                if send_json(&mut ws_tx, &payload).await.is_err() {
                    break;
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Payload>(&text) {
                            Ok(payload) => state.dispatch_fe(&client, payload).await,
                            Err(e) => debug!(client = %client, err = %e, "malformed frontend frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(client = %client, err = %e, "frontend socket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.deregister_fe(&client).await;
}

async fn handle_be_connection(state: SharedRouterState, socket: WebSocket) {
    let provider = next_connection_id("be");
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.register_be(provider.clone(), tx).await;

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                let Some((client, payload)): Option<(String, Payload)> = outgoing else { break };
                // The provider must echo the client identity back on its
                // next reply (spec §6); we hand it over as a synthetic
                // `Frame::Be`-shaped JSON envelope rather than a bare
                // payload so the provider can correlate it.
                let envelope = serde_json::json!({"client": client, "payload": payload});
                if send_json(&mut ws_tx, &envelope).await.is_err() {
                    break;
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match parse_be_incoming(&text) {
                            Ok((client, payload)) => state.dispatch_be(&provider, &client, payload).await,
                            Err(e) => debug!(provider = %provider, err = %e, "malformed backend frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(provider = %provider, err = %e, "backend socket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.deregister_be(&provider).await;
}

/// The envelope a backend connection speaks on the wire for a reply: every
/// frame other than the handshake (`Ready`/`Exiting`, which travel as a
/// bare [`Payload`] with no surrounding client context) carries the client
/// identity the router is routing on behalf of (spec §6).
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct BeEnvelope {
    client: String,
    payload: Payload,
}

/// Parse a frame arriving on a backend connection: either an enveloped
/// reply (`{client, payload}`) or a bare handshake payload (`Ready`/
/// `Exiting`), which carries no client to correlate.
fn parse_be_incoming(text: &str) -> Result<(String, Payload), serde_json::Error> {
    if let Ok(env) = serde_json::from_str::<BeEnvelope>(text) {
        return Ok((env.client, env.payload));
    }
    serde_json::from_str::<Payload>(text).map(|payload| (String::new(), payload))
}

async fn send_json(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    payload: &impl serde::Serialize,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(payload).unwrap_or_default();
    ws_tx.send(Message::Text(json.into())).await
}

/// A provider process's client-side connection to a router's `/be`
/// endpoint: dial in, announce `Ready`, then exchange frames. This is the
/// `ClientSocket` half of spec §4.8's factory for the `ws` scheme.
pub struct BeClient {
    write: futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        TMessage,
    >,
    read: futures_util::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    >,
}

impl BeClient {
    /// Dial `url` (e.g. `ws://127.0.0.1:9700/be`) and announce `device` via
    /// the `Ready` handshake (spec §6).
    pub async fn connect(url: &str, device: impl Into<String>) -> crate::error::Result<Self> {
        let (stream, _resp) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| crate::error::RouterError::TransportError(e.to_string()))?;
        let (write, read) = stream.split();
        let mut client = Self { write, read };
        client.send(Payload::Ready { device: device.into() }).await?;
        Ok(client)
    }

    /// Send a reply payload back to `client`; the router correlates it by
    /// the identity this provider announced on `Ready`.
    pub async fn reply(&mut self, client: impl Into<String>, payload: Payload) -> crate::error::Result<()> {
        let envelope = BeEnvelope { client: client.into(), payload };
        let json = serde_json::to_string(&envelope).unwrap_or_default();
        self.write
            .send(TMessage::Text(json.into()))
            .await
            .map_err(|e| crate::error::RouterError::TransportError(e.to_string()))
    }

    async fn send(&mut self, payload: Payload) -> crate::error::Result<()> {
        let json = serde_json::to_string(&payload).unwrap_or_default();
        self.write
            .send(TMessage::Text(json.into()))
            .await
            .map_err(|e| crate::error::RouterError::TransportError(e.to_string()))
    }

    /// Await the router's next forwarded request, yielding the client
    /// identity to reply to and the request payload.
    pub async fn recv(&mut self) -> crate::error::Result<Option<(String, Payload)>> {
        loop {
            match self.read.next().await {
                Some(Ok(TMessage::Text(text))) => {
                    let env: BeEnvelope = serde_json::from_str(&text)
                        .map_err(|e| crate::error::RouterError::TransportError(e.to_string()))?;
                    return Ok(Some((env.client, env.payload)));
                }
                Some(Ok(TMessage::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(crate::error::RouterError::TransportError(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
