// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Malcolm router: the frontend/backend message demultiplexer (spec §4.7).
//! Resolves dotted device endpoints against a provider registry and
//! forwards `Get`/`Call`/`Subscribe`/`Unsubscribe` frames to whichever
//! connection currently provides the named device, over whichever
//! transport that connection arrived on.
//!
//! This crate has no device-model concerns — those live in `malcolm-core`,
//! which this crate addresses purely by name.

pub mod config;
pub mod error;
pub mod frame;
pub mod registry;
pub mod router;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::RouterConfig;
use crate::transport::{ws, RouterState, SharedRouterState};

/// Run the router until its shutdown token is cancelled (a client called
/// `malcolm.exit`, or the process received a termination signal).
pub async fn run(config: RouterConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state: SharedRouterState = Arc::new(RouterState::new());
    let shutdown = state.router.shutdown_token();

    let app = ws::build_router(state.clone());
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "malcolm router listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown.cancelled_owned()).await?;
    Ok(())
}
