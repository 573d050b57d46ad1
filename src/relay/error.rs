//! Error types for relay operations.

use std::fmt;
use thiserror::Error;

/// Relay operation names, carried in errors, logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Submit,
    Fetch,
    Drain,
    Hold,
    Release,
    Snapshot,
}

impl Operation {
    /// Stable lowercase name used as a log field and metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Fetch => "fetch",
            Self::Drain => "drain",
            Self::Hold => "hold",
            Self::Release => "release",
            Self::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for relay lock acquisition.
///
/// The relay never returns this from its public operations; it is converted
/// into the operation's `Cancelled` outcome at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("wait for relay lock interrupted during {op}")]
    InterruptedWait { op: Operation },
}

impl RelayError {
    /// The operation whose lock wait failed.
    pub fn operation(&self) -> Operation {
        match self {
            Self::InterruptedWait { op } => *op,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_operation() {
        let err = RelayError::InterruptedWait {
            op: Operation::Submit,
        };
        assert_eq!(err.to_string(), "wait for relay lock interrupted during submit");
        assert_eq!(err.operation(), Operation::Submit);
    }
}
