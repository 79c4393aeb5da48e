// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device model and state machine shared by every Malcolm process: typed
//! attributes, the state machine that governs them, the methods callers
//! use to drive it, and the device that composes all three.
//!
//! This crate has no transport or wire-protocol concerns — those live in
//! `malcolm-router`, which addresses devices built here by name.

pub mod alarm;
pub mod attribute;
pub mod device;
pub mod error;
pub mod eventqueue;
pub mod method;
pub mod state;
pub mod statemachine;
pub mod value;
pub mod vtype;

pub use alarm::{Alarm, AlarmSeverity, AlarmStatus};
pub use attribute::{Attribute, AttributeChange, Timestamp, Update};
pub use device::{Device, DeviceBuilder};
pub use error::{MalcolmError, Result};
pub use eventqueue::TimerLoop;
pub use method::{ArgSpec, Method, MethodDescriptor};
pub use state::DState;
pub use statemachine::{handler, HandlerFn, HandlerResult, StateMachine, StateMachineHandle, Status, WaitError};
pub use value::{ArrayValue, EnumValue, Table, Value};
pub use vtype::{DeviceResolver, ScalarKind, VType};
