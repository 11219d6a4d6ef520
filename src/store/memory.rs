use crate::domain::payment::Payment;
use crate::store::{apply_patch, Finalize, NewPayment, PaymentPatch, PaymentStore};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// In-memory store for tests and local development. The map mutex makes the
/// finalize precondition check atomic, same as the row lock in Postgres.
#[derive(Default)]
pub struct InMemoryPaymentStore {
    inner: Mutex<HashMap<Uuid, Payment>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create(&self, new: NewPayment) -> Result<Payment> {
        let payment = Payment {
            id: new.id,
            subject: new.subject,
            amount_minor: new.amount_minor,
            currency: new.currency,
            status: new.status,
            transaction_id: new.transaction_id,
            reference_id: new.reference_id,
            notes: new.notes,
            metadata: new.metadata,
            refund_reason: None,
            refunded_by: None,
            created_at: Utc::now(),
            processed_at: None,
            refunded_at: None,
        };
        self.inner.lock().unwrap().insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        Ok(self.inner.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_correlation(
        &self,
        transaction_id: Option<&str>,
        reference_id: Option<&str>,
    ) -> Result<Option<Payment>> {
        let inner = self.inner.lock().unwrap();

        if let Some(txn) = transaction_id {
            if let Some(found) = inner.values().find(|p| p.transaction_id.as_deref() == Some(txn)) {
                return Ok(Some(found.clone()));
            }
        }
        if let Some(reference) = reference_id {
            if let Some(found) = inner.values().find(|p| {
                p.reference_id.as_deref() == Some(reference)
                    || p.metadata.gateway.reference_id.as_deref() == Some(reference)
            }) {
                return Ok(Some(found.clone()));
            }
        }
        Ok(None)
    }

    async fn update(&self, id: Uuid, patch: PaymentPatch) -> Result<Option<Payment>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(&id) {
            Some(payment) => {
                apply_patch(payment, patch);
                Ok(Some(payment.clone()))
            }
            None => Ok(None),
        }
    }

    async fn finalize(&self, id: Uuid, patch: PaymentPatch) -> Result<Finalize> {
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(&id) {
            Some(payment) if payment.status.is_terminal() => {
                Ok(Finalize::AlreadyTerminal(payment.clone()))
            }
            Some(payment) => {
                apply_patch(payment, patch);
                Ok(Finalize::Applied(payment.clone()))
            }
            None => Ok(Finalize::NotFound),
        }
    }
}
