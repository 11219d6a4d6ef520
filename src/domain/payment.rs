use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    /// Terminal states accept no further automatic transition; only the
    /// explicit operator refund moves PAID further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Cancelled | PaymentStatus::Refunded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "PROCESSING" => Some(PaymentStatus::Processing),
            "PAID" => Some(PaymentStatus::Paid),
            "CANCELLED" => Some(PaymentStatus::Cancelled),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// What the payment is for. Exactly one of the two domains per record,
/// fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentSubject {
    Appointment(String),
    Ad(String),
}

impl PaymentSubject {
    pub fn id(&self) -> &str {
        match self {
            PaymentSubject::Appointment(id) | PaymentSubject::Ad(id) => id,
        }
    }

    pub fn type_str(&self) -> &'static str {
        match self {
            PaymentSubject::Appointment(_) => "APPOINTMENT",
            PaymentSubject::Ad(_) => "AD",
        }
    }
}

/// Gateway response fragments accumulated across reconciliation events.
/// Merged field-by-field so a later event never wipes out what an earlier
/// one recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_received_at: Option<DateTime<Utc>>,
}

impl GatewayMetadata {
    pub fn merge(&mut self, other: GatewayMetadata) {
        if other.transaction_id.is_some() {
            self.transaction_id = other.transaction_id;
        }
        if other.reference_id.is_some() {
            self.reference_id = other.reference_id;
        }
        if other.status.is_some() {
            self.status = other.status;
        }
        if other.response_code.is_some() {
            self.response_code = other.response_code;
        }
        if other.response_msg.is_some() {
            self.response_msg = other.response_msg;
        }
        if other.account_number.is_some() {
            self.account_number = other.account_number;
        }
        if other.phone_number.is_some() {
            self.phone_number = other.phone_number;
        }
        if other.completed_at.is_some() {
            self.completed_at = other.completed_at;
        }
        if other.failed_at.is_some() {
            self.failed_at = other.failed_at;
        }
        if other.webhook_received_at.is_some() {
            self.webhook_received_at = other.webhook_received_at;
        }
    }
}

/// Gateway fragments live under the `gateway` key so reconciliation events
/// never clobber caller-supplied attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    #[serde(default)]
    pub gateway: GatewayMetadata,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub subject: PaymentSubject,
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub metadata: PaymentMetadata,
    pub refund_reason: Option<String>,
    pub refunded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitiatePaymentRequest {
    #[serde(default)]
    pub appointment_id: Option<String>,
    #[serde(default)]
    pub ad_id: Option<String>,
    pub amount_minor: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiatePaymentResponse {
    pub payment_id: Uuid,
    pub subject: PaymentSubject,
    pub transaction_id: Option<String>,
    pub reference_id: String,
    pub status: PaymentStatus,
    pub message: String,
}

/// Operator-facing view of a payment's reconciliation state. A stuck
/// payment reports its stored status plainly, with no promotion.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusView {
    pub payment_id: Uuid,
    pub subject: PaymentSubject,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub reference_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub message: Option<String>,
}

impl PaymentStatusView {
    pub fn from_payment(p: &Payment) -> Self {
        Self {
            payment_id: p.id,
            subject: p.subject.clone(),
            status: p.status,
            transaction_id: p
                .transaction_id
                .clone()
                .or_else(|| p.metadata.gateway.transaction_id.clone()),
            reference_id: p
                .reference_id
                .clone()
                .or_else(|| p.metadata.gateway.reference_id.clone()),
            amount_minor: p.amount_minor,
            currency: p.currency.clone(),
            message: p.metadata.gateway.response_msg.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}
