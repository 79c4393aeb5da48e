// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end router smoke tests.
//!
//! Spawns the real `malcolm-routerd` binary as a subprocess and exercises
//! it over its `/fe` and `/be` WebSocket endpoints, the way spec §8's
//! literal scenarios are phrased — as frames on the wire, not calls into
//! the router's own types.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;

/// Resolve the path to the compiled `malcolm-routerd` binary.
pub fn router_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs -> tests -> workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("malcolm-routerd")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `malcolm-routerd` process, killed on drop.
pub struct RouterProcess {
    child: Child,
    port: u16,
}

impl RouterProcess {
    /// Spawn the router binary bound to a freshly chosen free port.
    pub fn start() -> anyhow::Result<Self> {
        let binary = router_binary();
        anyhow::ensure!(binary.exists(), "malcolm-routerd binary not found at {}", binary.display());

        let port = free_port()?;
        let child = Command::new(&binary)
            .args(["--host", "127.0.0.1", "--port", &port.to_string()])
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, port })
    }

    pub fn fe_url(&self) -> String {
        format!("ws://127.0.0.1:{}/fe", self.port)
    }

    pub fn be_url(&self) -> String {
        format!("ws://127.0.0.1:{}/be", self.port)
    }

    /// Poll until the `/fe` endpoint accepts a connection.
    pub async fn wait_ready(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("router did not become ready within {timeout:?}");
            }
            if tokio_tungstenite::connect_async(self.fe_url()).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Wait for the process to exit within `timeout` (spec §8's
    /// `malcolm.exit` scenario drives this).
    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("router did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for RouterProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A connected frontend client: sends raw `Payload`-shaped JSON, receives
/// the router's replies.
pub struct FeClient {
    ws: WsStream,
}

impl FeClient {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (ws, _resp) = tokio_tungstenite::connect_async(url).await?;
        Ok(Self { ws })
    }

    pub async fn send(&mut self, frame: serde_json::Value) -> anyhow::Result<()> {
        self.ws.send(Message::Text(frame.to_string().into())).await?;
        Ok(())
    }

    pub async fn recv(&mut self, timeout: Duration) -> anyhow::Result<serde_json::Value> {
        let msg = tokio::time::timeout(timeout, self.ws.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("fe stream ended"))??;
        match msg {
            Message::Text(t) => Ok(serde_json::from_str(&t)?),
            other => anyhow::bail!("expected text frame, got {other:?}"),
        }
    }
}

/// A connected backend provider: announces `Ready`, receives forwarded
/// requests, sends replies.
pub struct BeClient {
    ws: WsStream,
}

impl BeClient {
    /// Dial in and announce `device` via the `Ready` handshake (spec §6).
    pub async fn connect(url: &str, device: &str) -> anyhow::Result<Self> {
        let (mut ws, _resp) = tokio_tungstenite::connect_async(url).await?;
        let ready = serde_json::json!({"type": "Ready", "device": device});
        ws.send(Message::Text(ready.to_string().into())).await?;
        Ok(Self { ws })
    }

    /// Await the router's next forwarded request, yielding the client
    /// identity to reply to and the request payload.
    pub async fn recv(&mut self, timeout: Duration) -> anyhow::Result<(String, serde_json::Value)> {
        let msg = tokio::time::timeout(timeout, self.ws.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("be stream ended"))??;
        match msg {
            Message::Text(t) => {
                let envelope: serde_json::Value = serde_json::from_str(&t)?;
                let client = envelope["client"].as_str().unwrap_or_default().to_owned();
                Ok((client, envelope["payload"].clone()))
            }
            other => anyhow::bail!("expected text frame, got {other:?}"),
        }
    }

    pub async fn reply(&mut self, client: &str, payload: serde_json::Value) -> anyhow::Result<()> {
        let envelope = serde_json::json!({"client": client, "payload": payload});
        self.ws.send(Message::Text(envelope.to_string().into())).await?;
        Ok(())
    }
}
