//! Holdgate: a hold-gated notification relay.
//!
//! A [`NotificationRelay`] is a single shared queue between one or more
//! producers and a polling consumer. A controller opens and closes a gate
//! with `hold`/`release`:
//!
//! - while held, submissions are absorbed and nothing is delivered;
//! - while released, pending notifications are delivered, and new
//!   submissions are refused until the pending batch is drained.
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration for the demo binary
//! - [`flow`]: Optional wake-up signals for consumers
//! - [`notification`]: Concrete notification payload
//! - [`observability`]: Metrics and tracing setup
//! - [`relay`]: The relay, its gate and operation outcomes
//! - [`runner`]: Producer/consumer/controller harness

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // relay::RelayError is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::struct_excessive_bools,     // Config structs may have flags
    clippy::too_many_lines              // Some functions are inherently long
)]

pub mod config;
pub mod flow;
pub mod notification;
pub mod observability;
pub mod relay;
pub mod runner;

pub use notification::Notification;
pub use relay::{
    FetchOutcome, GateOutcome, NotificationRelay, Operation, PendingPolicy, RelayError,
    RelaySnapshot, SubmitOutcome,
};

use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) notification ID.
///
/// # Example
///
/// ```
/// let id = holdgate::generate_notification_id();
/// assert!(id.len() == 36); // UUID string format
/// ```
#[must_use]
pub fn generate_notification_id() -> String {
    Uuid::now_v7().to_string()
}

/// Get the current Unix timestamp in milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
