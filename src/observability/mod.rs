//! Observability infrastructure.
//!
//! Provides:
//! - Structured logging via tracing-subscriber
//! - OpenTelemetry metrics for relay operations

pub mod metrics;
pub mod tracing;
