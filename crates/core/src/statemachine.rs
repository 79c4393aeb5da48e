// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative event-driven state machine (spec §4.3 "State machine").
//! Grounded on `malcolm/core/stateMachine.py`'s `post`/`event_loop`
//! dispatch loop, translated from cothread's single-greenlet cooperative
//! scheduling onto a single owning `tokio` task per device (spec §9:
//! "a single-threaded async task per device substitutes directly for the
//! cooperative scheduler").
//!
//! Events are handled strictly one at a time, in the order posted
//! (spec §4.2 invariant). A transition handler is free to change the
//! current state more than once during its own execution — each change is
//! broadcast with the message the handler supplies — which is how a single
//! `run` handler can report "Configuring started" and later "Configuring
//! finished" as two distinct status updates rather than one generic
//! "state change" notice.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};

use crate::attribute::Timestamp;
use crate::state::DState;

/// A status broadcast: the state machine's current state, a human-readable
/// message, and an optional completion percentage (spec §4.3 item 5).
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub state: DState,
    pub message: String,
    pub timestamp: Timestamp,
    pub percent: Option<u8>,
}

pub type HandlerResult = std::result::Result<Option<DState>, String>;
type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// A registered transition handler. Receives the event name, its JSON
/// arguments, and a handle back onto the state machine for reporting
/// progress and checking cancellation.
pub type HandlerFn = Arc<dyn Fn(String, serde_json::Value, StateMachineHandle) -> HandlerFuture + Send + Sync>;

/// Wrap an `async fn(event, args, handle) -> Result<Option<DState>, String>`
/// closure as a [`HandlerFn`].
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(String, serde_json::Value, StateMachineHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |event, args, handle| Box::pin(f(event, args, handle)))
}

struct Transition {
    handler: Option<HandlerFn>,
    allowed_next: Vec<DState>,
}

struct Inner {
    name: String,
    error_state: DState,
    state_tx: watch::Sender<DState>,
    status_tx: broadcast::Sender<Status>,
    should_stop: AtomicBool,
    seq: AtomicU64,
    events_tx: mpsc::UnboundedSender<(String, serde_json::Value)>,
}

/// A cheap, cloneable capability onto a running [`StateMachine`]: post
/// events, subscribe to status, inspect current state. Also the type
/// handed to every transition handler as its `ctx` — the same surface
/// external callers use (spec §4.3: "a handler has no powers a caller
/// outside the device does not also have").
#[derive(Clone)]
pub struct StateMachineHandle(Arc<Inner>);

impl StateMachineHandle {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn state(&self) -> DState {
        *self.0.state_tx.borrow()
    }

    /// Queue an event for the state machine's owning task to dispatch in
    /// FIFO order (spec §4.2).
    pub fn post(&self, event: impl Into<String>, args: serde_json::Value) {
        let _ = self.0.events_tx.send((event.into(), args));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Status> {
        self.0.status_tx.subscribe()
    }

    /// Broadcast a status update without changing the current state
    /// (e.g. a progress report mid-handler).
    pub fn notify_status(&self, message: impl Into<String>, percent: Option<u8>) {
        let seq = self.0.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let status = Status {
            state: self.state(),
            message: message.into(),
            timestamp: Timestamp::now(seq),
            percent,
        };
        let _ = self.0.status_tx.send(status);
    }

    /// Move to a new state and broadcast the message in one step. Intended
    /// for use inside a running handler, which owns the only writer to
    /// `state_tx` during its own execution.
    pub fn transition_to(&self, state: DState, message: impl Into<String>) {
        let _ = self.0.state_tx.send(state);
        self.notify_status(message, None);
    }

    /// Set the cooperative cancellation flag. Pause/abort handlers call
    /// this directly (not through the event queue) so a long-running
    /// handler notices it at its very next suspension point, matching the
    /// cothread `Sleep`-is-a-yield-point model the dispatch loop replaces
    /// (spec §9).
    pub fn request_stop(&self) {
        self.0.should_stop.store(true, Ordering::SeqCst);
    }

    pub fn clear_stop(&self) {
        self.0.should_stop.store(false, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.0.should_stop.load(Ordering::SeqCst)
    }

    /// Block until a status broadcast observed through `recv()` lands in
    /// `states`. Subscribes fresh, so callers that need to post the
    /// triggering event themselves without risking a missed broadcast
    /// should use [`StateMachineHandle::wait_for_transition_on`] instead —
    /// this convenience form is only race-free when nothing else can post
    /// to the machine between the subscribe and the `.await`.
    pub async fn wait_for_transition(&self, states: &[DState]) -> std::result::Result<(), WaitError> {
        let mut rx = self.0.status_tx.subscribe();
        Self::wait_on(&self.0, &mut rx, states, None).await
    }

    /// As [`StateMachineHandle::wait_for_transition`], but the caller
    /// supplies an already-open receiver and an optional timeout (spec §5:
    /// "an optional device-level `timeout` ... causes `wait_for_transition`
    /// to fail with `Timeout`").
    ///
    /// Passing a receiver obtained from [`StateMachineHandle::subscribe`]
    /// *before* posting the triggering event closes a real race: under a
    /// multi-thread `tokio` runtime the state machine's dispatch task runs
    /// on its own worker and may broadcast the terminal status before a
    /// subscription made only after `post()` returns would exist to see it
    /// — `broadcast::Sender::send` to zero receivers silently drops the
    /// message, so a caller that subscribed afterwards would then wait
    /// forever on a status that already happened.
    pub async fn wait_for_transition_on(
        &self,
        rx: &mut broadcast::Receiver<Status>,
        states: &[DState],
        timeout: Option<Duration>,
    ) -> std::result::Result<(), WaitError> {
        Self::wait_on(&self.0, rx, states, timeout).await
    }

    async fn wait_on(
        inner: &Arc<Inner>,
        rx: &mut broadcast::Receiver<Status>,
        states: &[DState],
        timeout: Option<Duration>,
    ) -> std::result::Result<(), WaitError> {
        let recv_loop = async {
            loop {
                match rx.recv().await {
                    Ok(status) if states.contains(&status.state) => {
                        return if status.state == inner.error_state {
                            Err(WaitError::Failed(status.message))
                        } else {
                            Ok(())
                        };
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(WaitError::Failed("state machine shut down while waiting".to_owned()));
                    }
                }
            }
        };
        match timeout {
            Some(duration) => tokio::time::timeout(duration, recv_loop).await.unwrap_or(Err(WaitError::TimedOut)),
            None => recv_loop.await,
        }
    }
}

/// Why [`StateMachineHandle::wait_for_transition`]/`_on` failed to observe
/// a rest state (spec §4.6 item 4, §5 timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The machine settled into its configured error state; carries the
    /// broadcast message that accompanied the fault.
    Failed(String),
    /// No qualifying status arrived within the caller's timeout.
    TimedOut,
}

impl fmt::Debug for StateMachineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachineHandle")
            .field("name", &self.0.name)
            .field("state", &self.state())
            .finish()
    }
}

/// The owning half of the state machine: holds the transition table and
/// the receiving end of the event queue. Exactly one task should call
/// [`StateMachine::run`] on this.
pub struct StateMachine {
    inner: Arc<Inner>,
    transitions: HashMap<(DState, String), Transition>,
    events_rx: mpsc::UnboundedReceiver<(String, serde_json::Value)>,
}

impl StateMachine {
    pub fn new(name: impl Into<String>, initial: DState, error_state: DState) -> Self {
        let (state_tx, _) = watch::channel(initial);
        let (status_tx, _) = broadcast::channel(256);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            name: name.into(),
            error_state,
            state_tx,
            status_tx,
            should_stop: AtomicBool::new(false),
            seq: AtomicU64::new(0),
            events_tx,
        });
        Self { inner, transitions: HashMap::new(), events_rx }
    }

    pub fn handle(&self) -> StateMachineHandle {
        StateMachineHandle(self.inner.clone())
    }

    /// Register a transition: from any of `from_states`, on `event`,
    /// invoke `handler` (or, if `None`, treat the event as a no-op) and
    /// accept any of `allowed_next` as its result. A handler that returns
    /// `None` implies the sole entry of `allowed_next` (spec §4.3 item 3).
    ///
    /// Registering the same `(state, event)` pair twice overwrites the
    /// first registration and logs a warning rather than failing — the
    /// original framework tolerates this as a build-time mistake, not a
    /// runtime one.
    pub fn transition(
        &mut self,
        from_states: &[DState],
        event: &str,
        handler: Option<HandlerFn>,
        allowed_next: &[DState],
    ) {
        for &from in from_states {
            let key = (from, event.to_owned());
            if self.transitions.contains_key(&key) {
                tracing::warn!(
                    name = %self.inner.name, state = %from, event,
                    "overwriting existing transition registration"
                );
            }
            self.transitions.insert(
                key,
                Transition { handler: handler.clone(), allowed_next: allowed_next.to_vec() },
            );
        }
    }

    /// Run the dispatch loop until the event queue closes (every handle
    /// has been dropped). Consumes `self`: ownership marks this as the one
    /// task permitted to advance the machine.
    pub async fn run(mut self) {
        while let Some((event, args)) = self.events_rx.recv().await {
            self.dispatch_one(event, args).await;
        }
    }

    async fn dispatch_one(&mut self, event: String, args: serde_json::Value) {
        let current = *self.inner.state_tx.borrow();
        let key = (current, event.clone());
        let Some(transition) = self.transitions.get(&key) else {
            tracing::warn!(
                name = %self.inner.name, state = %current, event,
                "no transition registered for this (state, event) pair; event refused"
            );
            return;
        };
        let handler = transition.handler.clone();
        let allowed_next = transition.allowed_next.clone();
        let ctx = self.handle();

        let result = match handler {
            Some(h) => h(event.clone(), args, ctx.clone()).await,
            None => Ok(None),
        };

        match result {
            Err(message) => {
                tracing::error!(name = %self.inner.name, event, %message, "transition handler failed");
                ctx.transition_to(self.inner.error_state, message);
            }
            Ok(returned) => {
                let implied = match returned {
                    Some(state) => state,
                    None if allowed_next.len() == 1 => allowed_next[0],
                    None => {
                        tracing::warn!(
                            name = %self.inner.name, event,
                            "handler returned no state but more than one is allowed; ignoring"
                        );
                        return;
                    }
                };
                if !allowed_next.contains(&implied) {
                    let message = format!(
                        "returned state {implied} in response to event {event} is not one of {allowed_next:?}; ignoring"
                    );
                    tracing::warn!(name = %self.inner.name, "{message}");
                    ctx.notify_status(message, None);
                    return;
                }
                if *self.inner.state_tx.borrow() != implied {
                    ctx.transition_to(implied, "State change");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "statemachine_tests.rs"]
mod tests;
