//! Signal bus for consumer wake-up.
//!
//! The relay itself is poll-only. A consumer that would rather sleep until
//! something changes subscribes here and polls the relay when woken.
//! Signals are hints: a lagging receiver drops old signals and should
//! simply poll again.

use tokio::sync::broadcast::{self, Receiver, Sender};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

/// State change published by a relay after its lock is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaySignal {
    /// A submission was accepted; `pending` is the buffer length after it.
    Accepted { pending: usize },
    /// The gate was closed.
    Held,
    /// The gate was opened with `pending` notifications waiting.
    Released { pending: usize },
    /// A consumer drained `count` notifications.
    Drained { count: usize },
}

impl RelaySignal {
    /// Whether a consumer polling right after this signal might get a batch.
    ///
    /// `Accepted` counts even while held, since the gate may have opened
    /// in the meantime.
    pub fn may_be_deliverable(&self) -> bool {
        match self {
            Self::Accepted { .. } => true,
            Self::Released { pending } => *pending > 0,
            Self::Held | Self::Drained { .. } => false,
        }
    }
}

/// Broadcast bus for relay signals.
#[derive(Clone, Debug)]
pub struct SignalBus {
    sender: Sender<RelaySignal>,
}

impl SignalBus {
    /// Create a new signal bus with the given capacity.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of buffered signals.
    ///   Older signals are dropped if receivers fall behind.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to signals published from now on.
    pub fn subscribe(&self) -> Receiver<RelaySignal> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream, skipping over lag notices.
    pub fn stream(&self) -> impl Stream<Item = RelaySignal> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(Result::ok)
    }

    /// Publish a signal.
    ///
    /// # Returns
    ///
    /// The number of receivers that got the signal.
    pub fn publish(&self, signal: RelaySignal) -> usize {
        // send() returns an error if there are no receivers, which is fine
        self.sender.send(signal).unwrap_or(0)
    }

    /// Get the number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_bus() {
        let bus = SignalBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let count = bus.publish(RelaySignal::Accepted { pending: 1 });
        assert_eq!(count, 2);

        assert_eq!(rx1.recv().await.unwrap(), RelaySignal::Accepted { pending: 1 });
        assert_eq!(rx2.recv().await.unwrap(), RelaySignal::Accepted { pending: 1 });
    }

    #[test]
    fn test_publish_without_receivers() {
        let bus = SignalBus::new(16);
        assert_eq!(bus.publish(RelaySignal::Held), 0);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_skips_lag() {
        let bus = SignalBus::new(1);
        let mut stream = Box::pin(bus.stream());

        bus.publish(RelaySignal::Held);
        bus.publish(RelaySignal::Released { pending: 3 });

        // Capacity 1: the first signal is overwritten, the lag error is skipped.
        assert_eq!(stream.next().await, Some(RelaySignal::Released { pending: 3 }));
    }

    #[test]
    fn test_may_be_deliverable() {
        assert!(RelaySignal::Accepted { pending: 1 }.may_be_deliverable());
        assert!(RelaySignal::Released { pending: 2 }.may_be_deliverable());
        assert!(!RelaySignal::Released { pending: 0 }.may_be_deliverable());
        assert!(!RelaySignal::Held.may_be_deliverable());
        assert!(!RelaySignal::Drained { count: 4 }.may_be_deliverable());
    }
}
