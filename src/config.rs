//! Configuration parsing for the holdgate demo runner.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::Parser;
use std::time::Duration;

use crate::relay::PendingPolicy;

/// Holdgate: drive producers, a consumer and a hold/release controller
/// through a hold-gated notification relay.
#[derive(Parser, Debug, Clone)]
#[command(name = "holdgate")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Number of producer tasks
    #[arg(short, long, env = "HOLDGATE_PRODUCERS", default_value_t = 4)]
    pub producers: usize,

    /// Delay between submissions of one producer
    #[arg(long, env = "HOLDGATE_PRODUCE_INTERVAL_MS", default_value_t = 50)]
    pub produce_interval_ms: u64,

    /// Consumer fallback polling interval when no signal arrives
    #[arg(long, env = "HOLDGATE_POLL_INTERVAL_MS", default_value_t = 250)]
    pub poll_interval_ms: u64,

    /// Period of the controller's hold/release cycle (0 disables the controller)
    #[arg(long, env = "HOLDGATE_HOLD_EVERY_MS", default_value_t = 1000)]
    pub hold_every_ms: u64,

    /// How long the gate stays held in each cycle
    #[arg(long, env = "HOLDGATE_HOLD_FOR_MS", default_value_t = 300)]
    pub hold_for_ms: u64,

    /// Handling of submissions while released with a batch pending
    #[arg(long, env = "HOLDGATE_POLICY", value_enum, default_value_t = PendingPolicy::Drop)]
    pub policy: PendingPolicy,

    /// Size of the consumer wake-up signal channel
    #[arg(long, env = "HOLDGATE_SIGNAL_CHANNEL_SIZE", default_value_t = 1024)]
    pub signal_channel_size: usize,

    /// Stop after this long instead of waiting for Ctrl+C
    #[arg(long, env = "HOLDGATE_RUN_FOR_MS")]
    pub run_for_ms: Option<u64>,

    /// OpenTelemetry collector endpoint for metrics export (optional)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn produce_interval(&self) -> Duration {
        Duration::from_millis(self.produce_interval_ms.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Controller cycle as `(period, held_for)`, or `None` when disabled.
    ///
    /// The held part is clamped to the period.
    pub fn hold_cycle(&self) -> Option<(Duration, Duration)> {
        if self.hold_every_ms == 0 {
            return None;
        }
        let every = Duration::from_millis(self.hold_every_ms);
        let held_for = Duration::from_millis(self.hold_for_ms).min(every);
        Some((every, held_for))
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_ms.map(Duration::from_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            producers: 4,
            produce_interval_ms: 50,
            poll_interval_ms: 250,
            hold_every_ms: 1000,
            hold_for_ms: 300,
            policy: PendingPolicy::Drop,
            signal_channel_size: 1024,
            run_for_ms: None,
            otel_endpoint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.producers, 4);
        assert_eq!(config.policy, PendingPolicy::Drop);
        assert_eq!(config.run_for(), None);
    }

    #[test]
    fn test_defaults_match_cli() {
        let parsed = Config::try_parse_from(["holdgate"]).unwrap();
        let default = Config::default();
        assert_eq!(parsed.producers, default.producers);
        assert_eq!(parsed.hold_every_ms, default.hold_every_ms);
        assert_eq!(parsed.policy, default.policy);
    }

    #[test]
    fn test_parse_policy_and_run_for() {
        let config =
            Config::try_parse_from(["holdgate", "--policy", "queue", "--run-for-ms", "500"]).unwrap();
        assert_eq!(config.policy, PendingPolicy::Queue);
        assert_eq!(config.run_for(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_hold_cycle() {
        let mut config = Config::default();
        assert_eq!(
            config.hold_cycle(),
            Some((Duration::from_millis(1000), Duration::from_millis(300)))
        );

        config.hold_for_ms = 5000;
        assert_eq!(
            config.hold_cycle(),
            Some((Duration::from_millis(1000), Duration::from_millis(1000)))
        );

        config.hold_every_ms = 0;
        assert_eq!(config.hold_cycle(), None);
    }
}
