//! Notification payload carried by the demo runner.
//!
//! The relay is generic and never looks inside a notification; this type is
//! what the bundled producers emit.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{generate_notification_id, now_millis};

/// An event emitted by a producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// UUIDv7, time-sortable.
    pub id: String,
    /// Name of the producer that emitted it.
    pub source: String,
    pub payload: Value,
    /// Unix milliseconds at creation.
    pub created_at: i64,
}

impl Notification {
    pub fn new(source: impl Into<String>, payload: Value) -> Self {
        Self {
            id: generate_notification_id(),
            source: source.into(),
            payload,
            created_at: now_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_assigns_id_and_timestamp() {
        let a = Notification::new("producer-0", json!({ "seq": 1 }));
        let b = Notification::new("producer-0", json!({ "seq": 2 }));

        assert_ne!(a.id, b.id);
        assert!(uuid::Uuid::parse_str(&a.id).is_ok());
        // After 2024-01-01
        assert!(a.created_at > 1_704_067_200_000);
    }

    #[test]
    fn test_json_shape() {
        let n = Notification::new("billing", json!({ "invoice": 42 }));
        let value = serde_json::to_value(&n).unwrap();

        assert_eq!(value["source"], "billing");
        assert_eq!(value["payload"]["invoice"], 42);

        let back: Notification = serde_json::from_value(value).unwrap();
        assert_eq!(back, n);
    }
}
