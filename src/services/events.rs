//! Post-commit domain events.
//!
//! Events are emitted only after a transaction commits, so subscribers never
//! observe a state that was rolled back. Webhook delivery and signing belong
//! to the notification collaborator; this trait is the seam it plugs into.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PaymentConfirming,
    PaymentCompleted,
    PaymentFailed,
    PaymentRefunded,
    RefundCreated,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PaymentConfirming => "payment.confirming",
            EventType::PaymentCompleted => "payment.completed",
            EventType::PaymentFailed => "payment.failed",
            EventType::PaymentRefunded => "payment.refunded",
            EventType::RefundCreated => "refund.created",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayEvent {
    pub event_type: EventType,
    pub merchant_id: Uuid,
    pub payment_session_id: Uuid,
    pub payload: serde_json::Value,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl GatewayEvent {
    pub fn new(
        event_type: EventType,
        merchant_id: Uuid,
        payment_session_id: Uuid,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type,
            merchant_id,
            payment_session_id,
            payload,
            occurred_at: chrono::Utc::now(),
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: GatewayEvent);
}

/// Default publisher: structured log entries, one per event.
pub struct LogEventPublisher;

impl LogEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, event: GatewayEvent) {
        info!(
            event = %event.event_type,
            merchant_id = %event.merchant_id,
            payment_session_id = %event.payment_session_id,
            payload = %event.payload,
            "🔔 EVENT: {}",
            event.event_type
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        assert_eq!(EventType::PaymentCompleted.as_str(), "payment.completed");
        assert_eq!(EventType::RefundCreated.as_str(), "refund.created");
    }
}
