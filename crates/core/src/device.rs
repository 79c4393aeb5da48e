// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A device: the composition of a state machine, a set of typed
//! attributes, and a set of callable methods (spec §3 "Device"). Built
//! once through [`DeviceBuilder`], after which the state machine owns
//! exactly one task (spawned by [`DeviceBuilder::build`]) and every other
//! handle into the device is freely cloneable and shareable.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::{broadcast, RwLock};

use crate::attribute::Attribute;
use crate::error::{MalcolmError, Result};
use crate::method::{Method, MethodDescriptor};
use crate::state::DState;
use crate::statemachine::{HandlerFn, Status, StateMachine, StateMachineHandle};
use crate::vtype::VType;

/// Assembles a [`Device`]: register the canonical transition table,
/// declare attributes and methods, then [`build`](DeviceBuilder::build)
/// to spawn the owning task.
pub struct DeviceBuilder {
    name: String,
    state_machine: StateMachine,
    attributes: IndexMap<String, Arc<RwLock<Attribute>>>,
    method_descriptors: IndexMap<String, MethodDescriptor>,
    timeout: Option<Duration>,
}

impl DeviceBuilder {
    pub fn new(name: impl Into<String>, initial: DState, error_state: DState) -> Self {
        let name = name.into();
        Self {
            state_machine: StateMachine::new(name.clone(), initial, error_state),
            name,
            attributes: IndexMap::new(),
            method_descriptors: IndexMap::new(),
            timeout: None,
        }
    }

    /// Bound how long a synchronous [`Device::call`] will wait for the
    /// device to settle before failing with [`MalcolmError::Timeout`] and
    /// aborting the pending operation (spec §5).
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// A handle onto the (not yet running) state machine, for use when
    /// building handler closures that need to post further events or
    /// report progress while the device is assembled.
    pub fn handle(&self) -> StateMachineHandle {
        self.state_machine.handle()
    }

    pub fn transition(
        &mut self,
        from_states: &[DState],
        event: &str,
        handler: Option<HandlerFn>,
        allowed_next: &[DState],
    ) -> &mut Self {
        self.state_machine.transition(from_states, event, handler, allowed_next);
        self
    }

    pub fn attribute(
        &mut self,
        name: impl Into<String>,
        vtype: VType,
        descriptor: impl Into<String>,
        initial: serde_json::Value,
    ) -> Result<&mut Self> {
        let attr = Attribute::new(vtype, descriptor, initial)?;
        self.attributes.insert(name.into(), Arc::new(RwLock::new(attr)));
        Ok(self)
    }

    pub fn method(&mut self, descriptor: MethodDescriptor) -> &mut Self {
        self.method_descriptors.insert(descriptor.name.clone(), descriptor);
        self
    }

    /// Spawn the state machine's dispatch loop on its own task and
    /// assemble the finished [`Device`]. The state machine is consumed
    /// here — after this call, the only way to act on it is through the
    /// handles this and `Device` hand out.
    pub fn build(self) -> Device {
        let handle = self.state_machine.handle();
        tokio::spawn(self.state_machine.run());
        let methods = self
            .method_descriptors
            .into_iter()
            .map(|(name, descriptor)| (name, Method::new(descriptor, handle.clone())))
            .collect();
        Device { name: self.name, handle, attributes: self.attributes, methods, timeout: self.timeout }
    }
}

/// A running device. Cheap to clone the pieces of (attributes and the
/// state machine handle are themselves `Arc`-backed); the device as a
/// whole is usually held behind a registry and addressed by name.
pub struct Device {
    name: String,
    handle: StateMachineHandle,
    attributes: IndexMap<String, Arc<RwLock<Attribute>>>,
    methods: IndexMap<String, Method>,
    timeout: Option<Duration>,
}

impl Device {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> DState {
        self.handle.state()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<Status> {
        self.handle.subscribe()
    }

    pub fn attribute(&self, name: &str) -> Option<Arc<RwLock<Attribute>>> {
        self.attributes.get(name).cloned()
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Call `method` synchronously: validate, guard, post, and wait for
    /// the device to settle, failing with [`MalcolmError::Timeout`] if this
    /// device was built with a timeout and it elapses first (spec §4.6
    /// item 4, §5).
    pub async fn call(&self, method: &str, args: serde_json::Value) -> Result<()> {
        let method = self.methods.get(method).ok_or_else(|| MalcolmError::NoSuchEndpoint(method.to_owned()))?;
        method.call_with_timeout(args, self.timeout).await
    }

    /// Post `method` asynchronously: validate, guard, post, return
    /// immediately (spec §4.6 item 3).
    pub fn post(&self, method: &str, args: serde_json::Value) -> Result<()> {
        let method = self.methods.get(method).ok_or_else(|| MalcolmError::NoSuchEndpoint(method.to_owned()))?;
        method.post(args)
    }

    /// Reflective introspection document: every attribute's type schema
    /// and every method's argument schema (spec §4.7 "Get-malcolm"
    /// consumes exactly this shape).
    pub async fn schema(&self) -> serde_json::Value {
        let mut attributes = serde_json::Map::new();
        for (name, cell) in &self.attributes {
            let attr = cell.read().await;
            attributes.insert(
                name.clone(),
                serde_json::json!({"vtype": attr.vtype().schema(), "descriptor": attr.descriptor()}),
            );
        }
        let methods: serde_json::Map<_, _> = self
            .methods
            .iter()
            .map(|(name, method)| {
                let args: Vec<serde_json::Value> = method
                    .descriptor()
                    .args
                    .iter()
                    .map(|a| serde_json::json!({"name": a.name, "vtype": a.vtype.schema()}))
                    .collect();
                (name.clone(), serde_json::json!({"args": args}))
            })
            .collect();
        serde_json::json!({
            "name": self.name,
            "state": self.state().as_str(),
            "attributes": attributes,
            "methods": methods,
        })
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
