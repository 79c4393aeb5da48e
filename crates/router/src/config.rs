// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router process configuration (spec §6: "Persisted state: None. All
//! configuration is supplied at device construction" — the router itself
//! still needs a bind address, which this covers). Grounded on the
//! teacher's `mux/src/config.rs` `MuxConfig`.

/// Configuration for the `malcolm-routerd` binary.
#[derive(Debug, Clone, clap::Args)]
pub struct RouterConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "MALCOLM_ROUTER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9700, env = "MALCOLM_ROUTER_PORT")]
    pub port: u16,
}
