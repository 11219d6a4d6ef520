use crate::domain::payment::{GatewayMetadata, Payment, PaymentMetadata, PaymentStatus, PaymentSubject};
use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: Uuid,
    pub subject: PaymentSubject,
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub metadata: PaymentMetadata,
}

/// A partial update. Only the populated fields are applied; correlation ids
/// and `processed_at` are write-once and silently preserved if already set.
#[derive(Debug, Clone, Default)]
pub struct PaymentPatch {
    pub status: Option<PaymentStatus>,
    pub transaction_id: Option<String>,
    pub reference_id: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_reason: Option<String>,
    pub refunded_by: Option<String>,
    pub gateway_metadata: Option<GatewayMetadata>,
}

/// Result of a conditional terminal write.
#[derive(Debug, Clone)]
pub enum Finalize {
    /// The precondition held and the patch was applied.
    Applied(Payment),
    /// The stored record was already terminal; returned untouched.
    AlreadyTerminal(Payment),
    NotFound,
}

/// Shared patch application so every store implementation enforces the same
/// write-once and merge rules.
pub fn apply_patch(payment: &mut Payment, patch: PaymentPatch) {
    if let Some(status) = patch.status {
        payment.status = status;
    }
    if payment.transaction_id.is_none() {
        if let Some(txn) = patch.transaction_id {
            payment.transaction_id = Some(txn);
        }
    }
    if payment.reference_id.is_none() {
        if let Some(reference) = patch.reference_id {
            payment.reference_id = Some(reference);
        }
    }
    if payment.processed_at.is_none() {
        if let Some(ts) = patch.processed_at {
            payment.processed_at = Some(ts);
        }
    }
    if let Some(ts) = patch.refunded_at {
        payment.refunded_at = Some(ts);
    }
    if patch.refund_reason.is_some() {
        payment.refund_reason = patch.refund_reason;
    }
    if patch.refunded_by.is_some() {
        payment.refunded_by = patch.refunded_by;
    }
    if let Some(fragment) = patch.gateway_metadata {
        payment.metadata.gateway.merge(fragment);
    }
}

/// Durable record of payment attempts. The single source of truth for the
/// state machine; the engine never caches records across invocations.
#[async_trait::async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create(&self, new: NewPayment) -> Result<Payment>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;

    /// Lookup by gateway transaction id, falling back to the reference id
    /// (column or gateway metadata).
    async fn find_by_correlation(
        &self,
        transaction_id: Option<&str>,
        reference_id: Option<&str>,
    ) -> Result<Option<Payment>>;

    async fn update(&self, id: Uuid, patch: PaymentPatch) -> Result<Option<Payment>>;

    /// Read-modify-write with a status precondition: the patch is applied
    /// only while the stored status is still open (PENDING or PROCESSING).
    /// Whichever of two racing resolution paths loses observes
    /// `AlreadyTerminal` and must perform no side effects.
    async fn finalize(&self, id: Uuid, patch: PaymentPatch) -> Result<Finalize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment() -> Payment {
        Payment {
            id: Uuid::new_v4(),
            subject: PaymentSubject::Appointment("A1".to_string()),
            amount_minor: 1000,
            currency: "USD".to_string(),
            status: PaymentStatus::Processing,
            transaction_id: Some("TX1".to_string()),
            reference_id: Some("R1".to_string()),
            notes: None,
            metadata: PaymentMetadata::default(),
            refund_reason: None,
            refunded_by: None,
            created_at: Utc::now(),
            processed_at: None,
            refunded_at: None,
        }
    }

    #[test]
    fn correlation_ids_are_write_once() {
        let mut p = payment();
        apply_patch(
            &mut p,
            PaymentPatch {
                transaction_id: Some("TX2".to_string()),
                reference_id: Some("R2".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(p.transaction_id.as_deref(), Some("TX1"));
        assert_eq!(p.reference_id.as_deref(), Some("R1"));
    }

    #[test]
    fn processed_at_is_set_exactly_once() {
        let mut p = payment();
        let first = Utc::now();
        apply_patch(&mut p, PaymentPatch { processed_at: Some(first), ..Default::default() });
        apply_patch(&mut p, PaymentPatch { processed_at: Some(Utc::now()), ..Default::default() });
        assert_eq!(p.processed_at, Some(first));
    }

    #[test]
    fn gateway_metadata_merges_instead_of_replacing() {
        let mut p = payment();
        apply_patch(
            &mut p,
            PaymentPatch {
                gateway_metadata: Some(GatewayMetadata {
                    response_code: Some("200".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        apply_patch(
            &mut p,
            PaymentPatch {
                gateway_metadata: Some(GatewayMetadata {
                    response_msg: Some("settled".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        assert_eq!(p.metadata.gateway.response_code.as_deref(), Some("200"));
        assert_eq!(p.metadata.gateway.response_msg.as_deref(), Some("settled"));
    }
}
