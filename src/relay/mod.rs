//! Hold-gated notification relay.
//!
//! One lock guards both the buffer and the hold flag, so every operation
//! sees and leaves a consistent pair. The gate decides two things:
//!
//! | gate     | buffer    | submit   | fetch / drain     |
//! |----------|-----------|----------|-------------------|
//! | held     | any       | accepted | nothing available |
//! | released | empty     | accepted | nothing available |
//! | released | non-empty | refused  | batch             |
//!
//! A refused notification is dropped under [`PendingPolicy::Drop`].
//! [`PendingPolicy::Queue`] accepts it instead.
//!
//! Lock waits are cancellable. A cancelled operation changes nothing, logs
//! at error level and reports a `Cancelled` outcome. Cancellation only ever
//! ends the calls it hits; the relay stays live.

mod error;
mod outcome;

pub use error::{Operation, RelayError};
pub use outcome::{FetchOutcome, GateOutcome, RelaySnapshot, SubmitOutcome};

use futures::executor::block_on;
use std::sync::PoisonError;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::flow::notify::{RelaySignal, SignalBus};
use crate::observability::metrics;

/// What to do with a submission that arrives while released with a batch
/// still awaiting pickup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PendingPolicy {
    /// Refuse and drop it.
    #[default]
    Drop,
    /// Append it behind the pending batch.
    Queue,
}

/// State guarded by the relay lock.
#[derive(Debug)]
struct Gate<N> {
    buffer: Vec<N>,
    held: bool,
}

impl<N> Gate<N> {
    fn accepts(&self, policy: PendingPolicy) -> bool {
        match policy {
            PendingPolicy::Drop => self.held || self.buffer.is_empty(),
            PendingPolicy::Queue => true,
        }
    }

    fn deliverable(&self) -> bool {
        !self.held && !self.buffer.is_empty()
    }

    fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            held: self.held,
            pending: self.buffer.len(),
        }
    }
}

/// Thread-safe handoff point between producers and a consumer.
///
/// Starts released and empty. Share it behind an `Arc`.
#[derive(Debug)]
pub struct NotificationRelay<N> {
    gate: Mutex<Gate<N>>,
    policy: PendingPolicy,
    /// Raced by the plain operations; replaced on every `interrupt()`.
    interrupt: std::sync::Mutex<CancellationToken>,
    signals: Option<SignalBus>,
    /// Every snapshot fed to the state gauges, in lock order.
    #[cfg(test)]
    observed: std::sync::Mutex<Vec<RelaySnapshot>>,
}

impl<N> Default for NotificationRelay<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> NotificationRelay<N> {
    /// Create a released, empty relay with the default pending policy.
    pub fn new() -> Self {
        Self::with_policy(PendingPolicy::default())
    }

    pub fn with_policy(policy: PendingPolicy) -> Self {
        Self {
            gate: Mutex::new(Gate {
                buffer: Vec::new(),
                held: false,
            }),
            policy,
            interrupt: std::sync::Mutex::new(CancellationToken::new()),
            signals: None,
            #[cfg(test)]
            observed: std::sync::Mutex::default(),
        }
    }

    /// Publish state changes on `bus` after each successful operation.
    #[must_use]
    pub fn with_signals(mut self, bus: SignalBus) -> Self {
        self.signals = Some(bus);
        self
    }

    pub fn policy(&self) -> PendingPolicy {
        self.policy
    }

    pub fn signals(&self) -> Option<&SignalBus> {
        self.signals.as_ref()
    }

    /// Interrupt the lock waits of plain (non `_with_cancel`) operations
    /// already in flight.
    ///
    /// One-shot: those calls report `Cancelled`, calls started afterwards
    /// proceed normally.
    pub fn interrupt(&self) {
        let mut current = self.interrupt.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, CancellationToken::new()).cancel();
    }

    fn interrupt_token(&self) -> CancellationToken {
        self.interrupt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Close the gate. Idempotent.
    pub async fn hold(&self) -> GateOutcome {
        let token = self.interrupt_token();
        self.hold_with_cancel(&token).await
    }

    pub async fn hold_with_cancel(&self, cancel: &CancellationToken) -> GateOutcome {
        self.set_held(Operation::Hold, true, cancel).await
    }

    /// Open the gate. Idempotent.
    pub async fn release(&self) -> GateOutcome {
        let token = self.interrupt_token();
        self.release_with_cancel(&token).await
    }

    pub async fn release_with_cancel(&self, cancel: &CancellationToken) -> GateOutcome {
        self.set_held(Operation::Release, false, cancel).await
    }

    /// Offer a notification to the relay.
    ///
    /// Accepted while held or while the buffer is empty. Released with a
    /// pending batch, the notification is refused and dropped unless the
    /// relay was built with [`PendingPolicy::Queue`].
    pub async fn submit(&self, notification: N) -> SubmitOutcome {
        let token = self.interrupt_token();
        self.submit_with_cancel(notification, &token).await
    }

    pub async fn submit_with_cancel(
        &self,
        notification: N,
        cancel: &CancellationToken,
    ) -> SubmitOutcome {
        let mut gate = match self.acquire(Operation::Submit, cancel).await {
            Ok(gate) => gate,
            Err(e) => {
                self.interrupted(e);
                metrics::record_submit(SubmitOutcome::Cancelled);
                return SubmitOutcome::Cancelled;
            }
        };

        let outcome = if gate.accepts(self.policy) {
            gate.buffer.push(notification);
            SubmitOutcome::Accepted
        } else {
            SubmitOutcome::RejectedByGate
        };
        let snapshot = self.observe(&gate);
        drop(gate);

        metrics::record_submit(outcome);
        match outcome {
            SubmitOutcome::Accepted => self.publish(RelaySignal::Accepted {
                pending: snapshot.pending,
            }),
            _ => tracing::debug!(
                pending = snapshot.pending,
                "Submission refused: released with undelivered notifications"
            ),
        }
        outcome
    }

    /// Hand the pending batch to the consumer and empty the buffer.
    ///
    /// Same availability rule as [`fetch`](Self::fetch).
    pub async fn drain(&self) -> FetchOutcome<N> {
        let token = self.interrupt_token();
        self.drain_with_cancel(&token).await
    }

    pub async fn drain_with_cancel(&self, cancel: &CancellationToken) -> FetchOutcome<N> {
        let mut gate = match self.acquire(Operation::Drain, cancel).await {
            Ok(gate) => gate,
            Err(e) => {
                self.interrupted(e);
                metrics::record_fetch(Operation::Drain, "cancelled");
                return FetchOutcome::Cancelled;
            }
        };

        let outcome = if gate.deliverable() {
            FetchOutcome::Batch(std::mem::take(&mut gate.buffer))
        } else {
            FetchOutcome::NothingAvailable
        };
        self.observe(&gate);
        drop(gate);

        metrics::record_fetch(Operation::Drain, outcome.as_str());
        if let FetchOutcome::Batch(batch) = &outcome {
            self.publish(RelaySignal::Drained { count: batch.len() });
        }
        outcome
    }

    /// Consistent view of the gate and buffer length.
    ///
    /// `None` if the lock wait was interrupted.
    pub async fn snapshot(&self) -> Option<RelaySnapshot> {
        let token = self.interrupt_token();
        self.snapshot_with_cancel(&token).await
    }

    pub async fn snapshot_with_cancel(&self, cancel: &CancellationToken) -> Option<RelaySnapshot> {
        match self.acquire(Operation::Snapshot, cancel).await {
            Ok(gate) => Some(gate.snapshot()),
            Err(e) => {
                self.interrupted(e);
                None
            }
        }
    }

    /// Blocking [`hold`](Self::hold) for plain OS threads.
    ///
    /// Like every `blocking_*` method this parks the calling thread on the
    /// relay lock. Call it from a std thread or `spawn_blocking`, never from
    /// inside an async task: on a current-thread runtime a lock holder on
    /// the same thread would never run again.
    pub fn blocking_hold(&self) -> GateOutcome {
        block_on(self.hold())
    }

    /// Blocking [`release`](Self::release). Must not be called from inside
    /// an async task.
    pub fn blocking_release(&self) -> GateOutcome {
        block_on(self.release())
    }

    /// Blocking [`submit`](Self::submit). Must not be called from inside an
    /// async task.
    pub fn blocking_submit(&self, notification: N) -> SubmitOutcome {
        block_on(self.submit(notification))
    }

    /// Blocking [`drain`](Self::drain). Must not be called from inside an
    /// async task.
    pub fn blocking_drain(&self) -> FetchOutcome<N> {
        block_on(self.drain())
    }

    /// Blocking [`snapshot`](Self::snapshot). Must not be called from inside
    /// an async task.
    pub fn blocking_snapshot(&self) -> Option<RelaySnapshot> {
        block_on(self.snapshot())
    }

    /// Wait for the lock unless `cancel` fires first.
    ///
    /// An already-cancelled token wins even when the lock is free.
    async fn acquire(
        &self,
        op: Operation,
        cancel: &CancellationToken,
    ) -> Result<MutexGuard<'_, Gate<N>>, RelayError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(RelayError::InterruptedWait { op }),
            gate = self.gate.lock() => Ok(gate),
        }
    }

    async fn set_held(&self, op: Operation, held: bool, cancel: &CancellationToken) -> GateOutcome {
        let mut gate = match self.acquire(op, cancel).await {
            Ok(gate) => gate,
            Err(e) => {
                self.interrupted(e);
                return GateOutcome::Cancelled;
            }
        };
        gate.held = held;
        let snapshot = self.observe(&gate);
        drop(gate);

        tracing::debug!(op = %op, pending = snapshot.pending, "Gate changed");
        self.publish(if held {
            RelaySignal::Held
        } else {
            RelaySignal::Released {
                pending: snapshot.pending,
            }
        });
        GateOutcome::Applied
    }

    /// Feed the state gauges while the guard is still held, so they follow
    /// lock order.
    fn observe(&self, gate: &Gate<N>) -> RelaySnapshot {
        let snapshot = gate.snapshot();
        metrics::record_state(snapshot);
        #[cfg(test)]
        self.observed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot);
        snapshot
    }

    fn interrupted(&self, err: RelayError) {
        tracing::error!(op = %err.operation(), error = %err, "Relay operation abandoned");
        metrics::record_interrupted(err.operation());
    }

    fn publish(&self, signal: RelaySignal) {
        if let Some(bus) = &self.signals {
            bus.publish(signal);
        }
    }
}

impl<N: Clone> NotificationRelay<N> {
    /// Copy of the pending batch, if the gate is released and the buffer is
    /// non-empty. The buffer is left as is; use [`drain`](Self::drain) to
    /// take it.
    pub async fn fetch(&self) -> FetchOutcome<N> {
        let token = self.interrupt_token();
        self.fetch_with_cancel(&token).await
    }

    pub async fn fetch_with_cancel(&self, cancel: &CancellationToken) -> FetchOutcome<N> {
        let gate = match self.acquire(Operation::Fetch, cancel).await {
            Ok(gate) => gate,
            Err(e) => {
                self.interrupted(e);
                metrics::record_fetch(Operation::Fetch, "cancelled");
                return FetchOutcome::Cancelled;
            }
        };

        let outcome = if gate.deliverable() {
            FetchOutcome::Batch(gate.buffer.clone())
        } else {
            FetchOutcome::NothingAvailable
        };
        drop(gate);

        metrics::record_fetch(Operation::Fetch, outcome.as_str());
        outcome
    }

    /// Blocking [`fetch`](Self::fetch). Must not be called from inside an
    /// async task.
    pub fn blocking_fetch(&self) -> FetchOutcome<N> {
        block_on(self.fetch())
    }
}
