// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic event source (spec §4.2 "Timer loop"). A device that wants to
//! poll hardware or re-check a condition on a schedule spawns one of these
//! pointed at its own [`StateMachineHandle`]; each tick posts a named event
//! onto the device's queue exactly as a caller would, so a timer-driven
//! transition is indistinguishable from a manually-triggered one.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::statemachine::StateMachineHandle;

/// A cancellable periodic tick that posts `event` to `target` every
/// `period`. Dropping or [`stop`](TimerLoop::stop)-ing it ends the loop;
/// in-flight ticks are not awaited, matching the owning device's shutdown
/// (spec §9 "teardown does not wait for stragglers").
pub struct TimerLoop {
    token: CancellationToken,
}

impl TimerLoop {
    pub fn spawn(period: Duration, target: StateMachineHandle, event: impl Into<String>) -> Self {
        let event = event.into();
        let token = CancellationToken::new();
        let guard = token.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = guard.cancelled() => break,
                    _ = interval.tick() => {
                        target.post(event.clone(), serde_json::Value::Null);
                    }
                }
            }
        });
        Self { token }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TimerLoop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
#[path = "eventqueue_tests.rs"]
mod tests;
