//! OpenTelemetry metrics for the relay.
//!
//! Key metrics:
//! - holdgate_submit_total: Counter of submissions by outcome
//! - holdgate_fetch_total: Counter of fetch/drain calls by outcome
//! - holdgate_interrupted_total: Counter of interrupted lock waits by operation
//! - holdgate_pending: Gauge of buffered notifications
//! - holdgate_held: Gauge for gate state (1 = held, 0 = released)

use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use std::sync::OnceLock;

use crate::relay::{Operation, RelaySnapshot, SubmitOutcome};

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Holdgate metrics registry.
#[derive(Debug)]
pub struct Metrics {
    pub submit_total: Counter<u64>,
    pub fetch_total: Counter<u64>,
    pub interrupted_total: Counter<u64>,
    pub pending: Gauge<i64>,
    pub held: Gauge<i64>,
}

impl Metrics {
    fn new(meter: &Meter) -> Self {
        Self {
            submit_total: meter
                .u64_counter("holdgate_submit_total")
                .with_description("Submissions by outcome")
                .with_unit("1")
                .init(),
            fetch_total: meter
                .u64_counter("holdgate_fetch_total")
                .with_description("Fetch and drain calls by outcome")
                .with_unit("1")
                .init(),
            interrupted_total: meter
                .u64_counter("holdgate_interrupted_total")
                .with_description("Lock waits interrupted by cancellation")
                .with_unit("1")
                .init(),
            pending: meter
                .i64_gauge("holdgate_pending")
                .with_description("Notifications buffered in the relay")
                .with_unit("1")
                .init(),
            held: meter
                .i64_gauge("holdgate_held")
                .with_description("1 if the gate is held")
                .with_unit("1")
                .init(),
        }
    }
}

/// Initialize the metrics system.
///
/// This should be called once at startup. Subsequent calls are ignored.
///
/// # Arguments
///
/// * `otel_endpoint` - Optional OTLP endpoint for metrics export
pub fn init_metrics_with_endpoint(otel_endpoint: Option<&str>) {
    METRICS.get_or_init(|| {
        if let Some(endpoint) = otel_endpoint {
            use opentelemetry_otlp::{Protocol, WithExportConfig};

            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::Grpc);

            match opentelemetry_otlp::new_pipeline()
                .metrics(opentelemetry_sdk::runtime::Tokio)
                .with_exporter(exporter)
                .with_period(std::time::Duration::from_secs(10))
                .build()
            {
                Ok(provider) => {
                    global::set_meter_provider(provider);
                    tracing::info!(endpoint, "OTLP metrics exporter configured");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create OTLP exporter, using no-op metrics");
                    set_manual_provider();
                }
            }
        } else {
            // Metrics are recorded but not exported
            set_manual_provider();
        }

        let meter = global::meter("holdgate");
        Metrics::new(&meter)
    });
}

fn set_manual_provider() {
    let reader = ManualReader::builder().build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    global::set_meter_provider(provider);
}

/// Initialize the metrics system without OTLP export.
pub fn init_metrics() {
    init_metrics_with_endpoint(None);
}

/// Get the global metrics instance, if initialized.
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

pub(crate) fn record_submit(outcome: SubmitOutcome) {
    if let Some(m) = metrics() {
        m.submit_total
            .add(1, &[KeyValue::new("outcome", outcome.as_str())]);
    }
}

pub(crate) fn record_fetch(op: Operation, outcome: &'static str) {
    if let Some(m) = metrics() {
        m.fetch_total.add(
            1,
            &[
                KeyValue::new("op", op.as_str()),
                KeyValue::new("outcome", outcome),
            ],
        );
    }
}

pub(crate) fn record_interrupted(op: Operation) {
    if let Some(m) = metrics() {
        m.interrupted_total
            .add(1, &[KeyValue::new("op", op.as_str())]);
    }
}

pub(crate) fn record_state(snapshot: RelaySnapshot) {
    if let Some(m) = metrics() {
        m.pending
            .record(i64::try_from(snapshot.pending).unwrap_or(i64::MAX), &[]);
        m.held.record(i64::from(snapshot.held), &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_is_safe_after_init() {
        init_metrics();
        assert!(metrics().is_some());

        record_submit(SubmitOutcome::Accepted);
        record_fetch(Operation::Fetch, "empty");
        record_interrupted(Operation::Hold);
        record_state(RelaySnapshot {
            held: true,
            pending: 3,
        });
    }
}
