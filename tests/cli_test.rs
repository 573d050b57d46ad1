//! CLI integration tests.
//!
//! Tests:
//! - Help and version output
//! - A timed run exits cleanly and reports balanced totals

use std::collections::HashMap;
use std::process::Command;

fn holdgate() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_holdgate"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help_output() {
    let output = holdgate().arg("--help").output().expect("failed to run");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    for flag in ["--producers", "--policy", "--hold-every-ms", "--hold-for-ms", "--run-for-ms"] {
        assert!(stdout.contains(flag), "help should mention {flag}");
    }
    assert!(stdout.contains("drop") && stdout.contains("queue"));
}

#[test]
fn test_cli_version_output() {
    let output = holdgate().arg("--version").output().expect("failed to run");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_rejects_unknown_policy() {
    let output = holdgate()
        .args(["--policy", "sometimes"])
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
}

#[test]
fn test_cli_timed_run_reports_totals() {
    let output = holdgate()
        .args([
            "--log-level",
            "error",
            "--producers",
            "3",
            "--produce-interval-ms",
            "5",
            "--poll-interval-ms",
            "10",
            "--hold-every-ms",
            "50",
            "--hold-for-ms",
            "20",
            "--run-for-ms",
            "300",
        ])
        .output()
        .expect("failed to run");

    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .find(|l| l.starts_with("submitted="))
        .expect("summary line");
    let totals: HashMap<&str, u64> = line
        .split_whitespace()
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k, v.parse().expect("numeric total")))
        .collect();

    assert!(totals["submitted"] > 0);
    assert_eq!(totals["accepted"], totals["delivered"]);
    assert_eq!(
        totals["submitted"],
        totals["accepted"] + totals["rejected"] + totals["cancelled"]
    );
}
