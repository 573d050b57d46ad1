//! Operation outcomes.
//!
//! Each relay operation reports a tagged outcome instead of a bare flag, so a
//! caller can tell a gate refusal apart from an interrupted lock wait.

/// Result of submitting a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The notification was appended to the buffer.
    Accepted,
    /// The relay is released with notifications still pending; the
    /// submitted notification was dropped.
    RejectedByGate,
    /// The lock wait was interrupted; nothing changed.
    Cancelled,
}

impl SubmitOutcome {
    /// Whether the notification is now in the buffer.
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Metric label for this outcome.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::RejectedByGate => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of a fetch or drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<N> {
    /// The relay is released and had pending notifications, in insertion order.
    Batch(Vec<N>),
    /// The gate is held or the buffer is empty. Try again later.
    NothingAvailable,
    /// The lock wait was interrupted; nothing changed.
    Cancelled,
}

impl<N> FetchOutcome<N> {
    /// The delivered batch, if any.
    pub fn into_batch(self) -> Option<Vec<N>> {
        match self {
            Self::Batch(batch) => Some(batch),
            Self::NothingAvailable | Self::Cancelled => None,
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }

    /// Metric label for this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Batch(_) => "delivered",
            Self::NothingAvailable => "empty",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of `hold` or `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Applied,
    Cancelled,
}

impl GateOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Consistent view of the relay state, taken under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySnapshot {
    /// Whether the gate is held.
    pub held: bool,
    /// Number of notifications in the buffer.
    pub pending: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_batch() {
        assert_eq!(FetchOutcome::Batch(vec![1, 2]).into_batch(), Some(vec![1, 2]));
        assert_eq!(FetchOutcome::<u32>::NothingAvailable.into_batch(), None);
        assert_eq!(FetchOutcome::<u32>::Cancelled.into_batch(), None);
    }

    #[test]
    fn test_only_accepted_counts_as_accepted() {
        assert!(SubmitOutcome::Accepted.is_accepted());
        assert!(!SubmitOutcome::RejectedByGate.is_accepted());
        assert!(!SubmitOutcome::Cancelled.is_accepted());
    }
}
