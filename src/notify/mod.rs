use crate::domain::payment::Payment;
use anyhow::Result;
use serde_json::json;

pub mod channel;
pub mod redis_stream;

/// Real-time fan-out to connected clients. Fire-and-forget; the engine never
/// lets a broadcast failure affect a state transition.
#[async_trait::async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, topic: &str, event: &str, payload: serde_json::Value) -> Result<()>;
}

/// Durable domain-event publish. Best-effort; failures are logged by the
/// caller and swallowed.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, exchange: &str, routing_key: &str, payload: serde_json::Value)
        -> Result<()>;
}

pub fn payment_event(event_type: &str, payment: &Payment, error: Option<&str>) -> serde_json::Value {
    let mut event = json!({
        "type": event_type,
        "payment": {
            "id": payment.id,
            "subject": payment.subject,
            "transactionId": payment.transaction_id,
            "amountMinor": payment.amount_minor,
            "currency": payment.currency,
            "status": payment.status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "payment-service",
    });
    if let Some(error) = error {
        event["error"] = json!(error);
    }
    event
}
