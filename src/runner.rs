//! Producer/consumer/controller harness around one relay.
//!
//! Wires up:
//! - `config.producers` producer tasks submitting notifications
//! - a controller cycling the gate with hold/release
//! - a consumer draining batches on signal or poll tick
//! - graceful shutdown with a final drain

use anyhow::Context;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::flow::notify::{RelaySignal, SignalBus};
use crate::notification::Notification;
use crate::relay::{FetchOutcome, NotificationRelay, SubmitOutcome};

type Relay = NotificationRelay<Arc<Notification>>;

/// Running totals shared by the tasks.
#[derive(Debug, Default)]
struct RunStats {
    submitted: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    cancelled: AtomicU64,
    delivered: AtomicU64,
    batches: AtomicU64,
}

impl RunStats {
    fn record_submit(&self, outcome: SubmitOutcome) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            SubmitOutcome::Accepted => &self.accepted,
            SubmitOutcome::RejectedByGate => &self.rejected,
            SubmitOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_batch(&self, len: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.delivered.fetch_add(len as u64, Ordering::Relaxed);
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            submitted: self.submitted.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
        }
    }
}

/// Totals for one run.
///
/// After a clean shutdown `accepted == delivered`: every accepted
/// notification was handed to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub submitted: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub cancelled: u64,
    pub delivered: u64,
    pub batches: u64,
}

/// Run producers, controller and consumer until shutdown.
///
/// # Arguments
///
/// * `config` - Runner configuration
/// * `shutdown_rx` - Receiver for shutdown signal
///
/// # Returns
///
/// Totals once every task has stopped and the relay has been drained.
pub async fn run_relay(
    config: Config,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<RunSummary> {
    let bus = SignalBus::new(config.signal_channel_size);
    let relay: Arc<Relay> =
        Arc::new(NotificationRelay::with_policy(config.policy).with_signals(bus.clone()));
    let stats = Arc::new(RunStats::default());
    let stop = CancellationToken::new();

    tracing::info!(
        producers = config.producers,
        policy = ?config.policy,
        "Starting relay runner"
    );

    let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(config.producers + 2);
    for index in 0..config.producers {
        tasks.push(tokio::spawn(produce(
            index,
            config.clone(),
            relay.clone(),
            stats.clone(),
            stop.clone(),
        )));
    }
    if let Some(cycle) = config.hold_cycle() {
        tasks.push(tokio::spawn(control(cycle, relay.clone(), stop.clone())));
    }
    tasks.push(tokio::spawn(consume(
        config.clone(),
        relay.clone(),
        bus.subscribe(),
        stats.clone(),
        stop.clone(),
    )));

    // Wait for shutdown signal or the configured run time
    match config.run_for() {
        Some(limit) => {
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                () = time::sleep(limit) => {
                    tracing::info!(?limit, "Run time elapsed");
                }
            }
        }
        None => {
            let _ = shutdown_rx.changed().await;
        }
    }
    tracing::info!("Stopping relay tasks");
    stop.cancel();

    for task in tasks {
        task.await.context("relay task panicked")?;
    }

    // Hand over whatever is still buffered
    relay.release().await;
    if let FetchOutcome::Batch(batch) = relay.drain().await {
        tracing::info!(count = batch.len(), "Final drain");
        stats.record_batch(batch.len());
    }

    let summary = stats.summary();
    tracing::info!(?summary, "Relay runner stopped");
    Ok(summary)
}

async fn produce(
    index: usize,
    config: Config,
    relay: Arc<Relay>,
    stats: Arc<RunStats>,
    stop: CancellationToken,
) {
    let source = format!("producer-{index}");
    let mut ticker = time::interval(config.produce_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }
        seq += 1;
        let notification = Arc::new(Notification::new(source.as_str(), json!({ "seq": seq })));
        let outcome = relay.submit_with_cancel(notification, &stop).await;
        stats.record_submit(outcome);
        if outcome == SubmitOutcome::RejectedByGate {
            tracing::debug!(source = %source, seq, "Notification dropped by gate");
        }
    }
    tracing::debug!(source = %source, sent = seq, "Producer stopped");
}

async fn control(
    (every, held_for): (std::time::Duration, std::time::Duration),
    relay: Arc<Relay>,
    stop: CancellationToken,
) {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval fires immediately; start the first hold one period in
    ticker.tick().await;

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }
        relay.hold_with_cancel(&stop).await;
        tokio::select! {
            () = stop.cancelled() => {}
            () = time::sleep(held_for) => {}
        }
        // Release even when stopping so the gate is never left closed
        relay.release().await;
    }
    tracing::debug!("Controller stopped");
}

async fn consume(
    config: Config,
    relay: Arc<Relay>,
    mut signals: broadcast::Receiver<RelaySignal>,
    stats: Arc<RunStats>,
    stop: CancellationToken,
) {
    let mut ticker = time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = stop.cancelled() => break,
            signal = signals.recv() => match signal {
                Ok(signal) if !signal.may_be_deliverable() => continue,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = ticker.tick() => {}
        }

        if let FetchOutcome::Batch(batch) = relay.drain_with_cancel(&stop).await {
            stats.record_batch(batch.len());
            tracing::info!(count = batch.len(), "Delivered notification batch");
            for notification in &batch {
                match serde_json::to_string(notification.as_ref()) {
                    Ok(line) => tracing::trace!(notification = %line, "Delivered"),
                    Err(e) => tracing::warn!(error = %e, "Failed to encode notification"),
                }
            }
        }
    }
    tracing::debug!("Consumer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_summary() {
        let stats = RunStats::default();
        stats.record_submit(SubmitOutcome::Accepted);
        stats.record_submit(SubmitOutcome::Accepted);
        stats.record_submit(SubmitOutcome::RejectedByGate);
        stats.record_submit(SubmitOutcome::Cancelled);
        stats.record_batch(2);

        assert_eq!(
            stats.summary(),
            RunSummary {
                submitted: 4,
                accepted: 2,
                rejected: 1,
                cancelled: 1,
                delivered: 2,
                batches: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let config = Config {
            producers: 2,
            produce_interval_ms: 5,
            poll_interval_ms: 10,
            hold_every_ms: 40,
            hold_for_ms: 15,
            ..Config::default()
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let run = tokio::spawn(run_relay(config, shutdown_rx));
        time::sleep(std::time::Duration::from_millis(120)).await;
        shutdown_tx.send(true).unwrap();

        let summary = run.await.unwrap().unwrap();
        assert!(summary.submitted > 0);
        assert_eq!(summary.accepted, summary.delivered);
        assert_eq!(
            summary.submitted,
            summary.accepted + summary.rejected + summary.cancelled
        );
    }
}
