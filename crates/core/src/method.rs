// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Callable device operation (spec §4.6 "Method"). A method validates its
//! arguments against declared [`VType`]s, checks the device is in a state
//! that permits the call, posts the corresponding event, and — for a
//! synchronous caller — waits for the device to settle back into a rest
//! state before returning.

use std::time::Duration;

use indexmap::IndexMap;

use crate::error::{MalcolmError, Result};
use crate::state::DState;
use crate::statemachine::{StateMachineHandle, WaitError};
use crate::value::Value;
use crate::vtype::VType;

/// One named, typed argument a method accepts.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: String,
    pub vtype: VType,
}

impl ArgSpec {
    pub fn new(name: impl Into<String>, vtype: VType) -> Self {
        Self { name: name.into(), vtype }
    }
}

/// Describes a device method: the event it posts, the states from which it
/// may be called, and the shape of its arguments (spec §4.6 items 1-2).
pub struct MethodDescriptor {
    pub name: String,
    pub event: String,
    pub args: Vec<ArgSpec>,
    guard: Box<dyn Fn(DState) -> bool + Send + Sync>,
    rest_states: Vec<DState>,
}

impl MethodDescriptor {
    /// `guard` decides whether the method may be called from a given
    /// state (spec §3 invariant: "guards are classifier predicates, never
    /// literal state lists"). `rest_states` are the states a synchronous
    /// call waits to settle into.
    pub fn new(
        name: impl Into<String>,
        event: impl Into<String>,
        args: Vec<ArgSpec>,
        guard: impl Fn(DState) -> bool + Send + Sync + 'static,
        rest_states: Vec<DState>,
    ) -> Self {
        Self { name: name.into(), event: event.into(), args, guard: Box::new(guard), rest_states }
    }

    /// Validate `raw` positional/keyword arguments (an object keyed by
    /// argument name) against this method's [`ArgSpec`]s, in declaration
    /// order (spec §3 "ordered map").
    fn validate_args(&self, raw: serde_json::Value) -> Result<IndexMap<String, Value>> {
        let serde_json::Value::Object(mut map) = raw else {
            return Err(MalcolmError::TypeMismatch {
                value: raw.to_string(),
                expected: VType::Table(IndexMap::new()),
            });
        };
        let mut out = IndexMap::with_capacity(self.args.len());
        for spec in &self.args {
            let raw_value = map.remove(&spec.name).unwrap_or(serde_json::Value::Null);
            let validated = spec.vtype.validate(raw_value)?;
            out.insert(spec.name.clone(), validated);
        }
        Ok(out)
    }
}

/// A callable device method bound to a live [`StateMachineHandle`].
pub struct Method {
    descriptor: MethodDescriptor,
    handle: StateMachineHandle,
}

impl Method {
    pub fn new(descriptor: MethodDescriptor, handle: StateMachineHandle) -> Self {
        Self { descriptor, handle }
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Check the state guard and validate arguments, returning the JSON
    /// payload ready to post. Shared by [`Method::post`] and
    /// [`Method::call_with_timeout`], which differ only in what happens
    /// between validating and posting.
    fn validate_and_guard(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let current = self.handle.state();
        if !(self.descriptor.guard)(current) {
            return Err(MalcolmError::WrongState {
                method: self.descriptor.name.clone(),
                state: current.to_string(),
            });
        }
        let validated = self.descriptor.validate_args(args)?;
        Ok(serde_json::to_value(&validated).unwrap_or(serde_json::Value::Null))
    }

    /// Validate arguments and guard state, post the method's event, and
    /// return immediately without waiting for the device to settle
    /// (spec §4.6 item 3, the asynchronous caller path).
    pub fn post(&self, args: serde_json::Value) -> Result<()> {
        let payload = self.validate_and_guard(args)?;
        self.handle.post(self.descriptor.event.clone(), payload);
        Ok(())
    }

    /// As [`Method::post`], but waits for the device to settle back into
    /// one of `rest_states` before returning (spec §4.6 item 4, the
    /// synchronous caller path). Surfaces the device's error message as
    /// [`MalcolmError::HandlerFailed`] if it lands in the error state
    /// instead.
    pub async fn call(&self, args: serde_json::Value) -> Result<()> {
        self.call_with_timeout(args, None).await
    }

    /// As [`Method::call`], but fails with [`MalcolmError::Timeout`] if the
    /// device has not settled into a rest state within `timeout` (spec §5:
    /// "an optional device-level `timeout` ... causes `wait_for_transition`
    /// to fail with `Timeout` ... the pending operation is then aborted").
    /// On timeout, `abort` is posted to the device's own queue before
    /// returning — an ordinary event, silently refused if the device has
    /// no `abort` transition registered from its current state.
    ///
    /// Subscribes to the status stream *before* posting the triggering
    /// event, closing the window in which a concurrently running dispatch
    /// task (on another `tokio` worker thread) could broadcast the
    /// terminal status before anything is listening for it.
    pub async fn call_with_timeout(&self, args: serde_json::Value, timeout: Option<Duration>) -> Result<()> {
        let payload = self.validate_and_guard(args)?;
        let mut rx = self.handle.subscribe();
        self.handle.post(self.descriptor.event.clone(), payload);
        match self.handle.wait_for_transition_on(&mut rx, &self.descriptor.rest_states, timeout).await {
            Ok(()) => Ok(()),
            Err(WaitError::Failed(message)) => Err(MalcolmError::HandlerFailed(message)),
            Err(WaitError::TimedOut) => {
                self.handle.post("abort", serde_json::json!({}));
                Err(MalcolmError::Timeout)
            }
        }
    }
}

#[cfg(test)]
#[path = "method_tests.rs"]
mod tests;
