// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed, alarm-bearing, observable value cell owned by exactly one device
//! (spec §3/§4.5 "Attribute").

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::alarm::Alarm;
use crate::error::Result;
use crate::value::Value;
use crate::vtype::VType;

/// Monotonic-plus-wall timestamp stamped on every successful attribute
/// write (spec §3 "timestamp: monotonic+wall").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timestamp {
    /// Milliseconds since the Unix epoch.
    pub wall_ms: u64,
    /// Monotonic sequence number, incremented on every stamp — breaks ties
    /// when two updates land in the same wall-clock millisecond.
    pub seq: u64,
}

impl Timestamp {
    pub(crate) fn now(seq: u64) -> Self {
        let wall_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
        Self { wall_ms, seq }
    }
}

/// A change notification delivered to attribute subscribers (spec §3:
/// "Subscribers receive `(new_value, alarm, timestamp)` on every mutation").
#[derive(Debug, Clone)]
pub struct AttributeChange {
    pub value: Value,
    pub alarm: Alarm,
    pub timestamp: Timestamp,
}

/// An optional update field: either "leave unchanged" or a new value.
#[derive(Debug, Clone)]
pub enum Update<T> {
    Unchanged,
    Set(T),
}

impl<T> Default for Update<T> {
    fn default() -> Self {
        Self::Unchanged
    }
}

/// Typed attribute cell. The declared type never changes after
/// construction (spec §3 invariant).
pub struct Attribute {
    vtype: VType,
    descriptor: String,
    value: Value,
    alarm: Alarm,
    timestamp: Timestamp,
    tags: BTreeSet<String>,
    seq: u64,
    changes: broadcast::Sender<AttributeChange>,
}

impl Attribute {
    /// Construct an attribute with its type, descriptor text, and initial
    /// value (which must validate against `vtype`).
    pub fn new(vtype: VType, descriptor: impl Into<String>, initial: serde_json::Value) -> Result<Self> {
        let value = vtype.validate(initial)?;
        let (changes, _rx) = broadcast::channel(64);
        Ok(Self {
            vtype,
            descriptor: descriptor.into(),
            value,
            alarm: Alarm::ok(),
            timestamp: Timestamp::now(0),
            tags: BTreeSet::new(),
            seq: 0,
            changes,
        })
    }

    pub fn vtype(&self) -> &VType {
        &self.vtype
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn alarm(&self) -> &Alarm {
        &self.alarm
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    /// Subscribe to future changes. Delivery order matches update order
    /// (spec §5: "Status broadcasts ... observed in the same order by every
    /// subscriber").
    pub fn subscribe(&self) -> broadcast::Receiver<AttributeChange> {
        self.changes.subscribe()
    }

    /// Partial update: validates `value` if supplied, preserves the other
    /// field if not, bumps the timestamp, and fans out to subscribers
    /// (spec §4.5). A failed validation leaves the cell unchanged.
    pub fn update(&mut self, value: Update<serde_json::Value>, alarm: Update<Alarm>) -> Result<()> {
        let new_value = match value {
            Update::Unchanged => None,
            Update::Set(raw) => Some(self.vtype.validate(raw)?),
        };
        if let Some(v) = new_value {
            self.value = v;
        }
        if let Update::Set(a) = alarm {
            self.alarm = a;
        }
        self.seq += 1;
        self.timestamp = Timestamp::now(self.seq);
        let _ = self.changes.send(AttributeChange {
            value: self.value.clone(),
            alarm: self.alarm.clone(),
            timestamp: self.timestamp,
        });
        Ok(())
    }

    /// Convenience: update only the value.
    pub fn set_value(&mut self, value: serde_json::Value) -> Result<()> {
        self.update(Update::Set(value), Update::Unchanged)
    }

    /// Convenience: update only the alarm.
    pub fn set_alarm(&mut self, alarm: Alarm) {
        // Infallible: alarm carries no type to validate against.
        let _ = self.update(Update::Unchanged, Update::Set(alarm));
    }
}

#[cfg(test)]
#[path = "attribute_tests.rs"]
mod tests;
