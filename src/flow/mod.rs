//! Consumer wake-up infrastructure.
//!
//! Provides:
//! - Signal bus for waking consumers instead of busy-polling the relay

pub mod notify;

pub use notify::{RelaySignal, SignalBus};
