use serde::{Deserialize, Serialize};

/// Inbound payment event from the gateway. Arrives signature-verified;
/// `external_session_id` is the idempotency key for duplicate delivery,
/// `correlation_ref` maps the event back to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub external_session_id: String,
    pub correlation_ref: String,
    pub amount: i32,
    pub customer_email: Option<String>,
}
