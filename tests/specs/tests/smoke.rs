// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `malcolm-routerd` binary and
//! drive it over its `/fe` and `/be` WebSocket endpoints, reproducing
//! spec §8's literal router scenarios S5 and S6 plus the surrounding
//! introspection/lifecycle surface.

use std::time::Duration;

use malcolm_specs::{BeClient, FeClient, RouterProcess};

const TIMEOUT: Duration = Duration::from_secs(10);

// spec §8 S5: "Provider sends {type:'Ready',device:'zebra1'} on be; client
// sends {id:0,type:'Call',method:'zebra1.do'} on fe; router emits the
// client's request verbatim on be with the recorded device identity and
// client identity prepended."
#[tokio::test]
async fn s5_router_forwards_call_to_the_registered_provider() -> anyhow::Result<()> {
    let router = RouterProcess::start()?;
    router.wait_ready(TIMEOUT).await?;

    let mut provider = BeClient::connect(&router.be_url(), "zebra1").await?;
    let mut fe = FeClient::connect(&router.fe_url()).await?;

    fe.send(serde_json::json!({"id": 0, "type": "Call", "method": "zebra1.do", "args": {}})).await?;

    let (client, payload) = provider.recv(TIMEOUT).await?;
    assert!(!client.is_empty(), "router must prepend the client identity");
    assert_eq!(payload["type"], "Call");
    assert_eq!(payload["method"], "zebra1.do");
    assert_eq!(payload["id"], 0);

    provider.reply(&client, serde_json::json!({"id": 0, "type": "Return", "val": 42})).await?;
    let reply = fe.recv(TIMEOUT).await?;
    assert_eq!(reply["type"], "Return");
    assert_eq!(reply["val"], 42);

    Ok(())
}

// spec §8 S6: router replies {id:0,type:"Error",message:"No device named
// foo registered"} for an unregistered device.
#[tokio::test]
async fn s6_unknown_device_yields_exact_error_message() -> anyhow::Result<()> {
    let router = RouterProcess::start()?;
    router.wait_ready(TIMEOUT).await?;

    let mut fe = FeClient::connect(&router.fe_url()).await?;
    fe.send(serde_json::json!({"id": 0, "type": "Call", "method": "foo.bar", "args": {}})).await?;

    let reply = fe.recv(TIMEOUT).await?;
    assert_eq!(reply["type"], "Error");
    assert_eq!(reply["id"], 0);
    assert_eq!(reply["message"], "No device named foo registered");

    Ok(())
}

#[tokio::test]
async fn get_malcolm_introspection_lists_devices_and_exit() -> anyhow::Result<()> {
    let router = RouterProcess::start()?;
    router.wait_ready(TIMEOUT).await?;

    let mut fe = FeClient::connect(&router.fe_url()).await?;
    fe.send(serde_json::json!({"id": 1, "type": "Get", "param": "malcolm"})).await?;

    let reply = fe.recv(TIMEOUT).await?;
    assert_eq!(reply["type"], "Return");
    assert!(reply["val"]["methods"]["devices"].is_object());
    assert!(reply["val"]["methods"]["exit"].is_object());

    Ok(())
}

#[tokio::test]
async fn malcolm_devices_lists_only_registered_providers() -> anyhow::Result<()> {
    let router = RouterProcess::start()?;
    router.wait_ready(TIMEOUT).await?;

    let _provider = BeClient::connect(&router.be_url(), "zebra1").await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut fe = FeClient::connect(&router.fe_url()).await?;
    fe.send(serde_json::json!({"id": 2, "type": "Call", "method": "malcolm.devices", "args": {}})).await?;

    let reply = fe.recv(TIMEOUT).await?;
    assert_eq!(reply["val"], serde_json::json!(["zebra1"]));

    Ok(())
}

#[tokio::test]
async fn malcolm_exit_shuts_down_the_router_process() -> anyhow::Result<()> {
    let mut router = RouterProcess::start()?;
    router.wait_ready(TIMEOUT).await?;

    let mut fe = FeClient::connect(&router.fe_url()).await?;
    fe.send(serde_json::json!({"id": 9, "type": "Call", "method": "malcolm.exit", "args": {}})).await?;

    let reply = fe.recv(TIMEOUT).await?;
    assert_eq!(reply["type"], "Return");

    let status = router.wait_exit(TIMEOUT).await?;
    assert!(status.success());

    Ok(())
}
