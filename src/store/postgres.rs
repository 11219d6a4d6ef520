use crate::domain::payment::{Payment, PaymentStatus, PaymentSubject};
use crate::store::{apply_patch, Finalize, NewPayment, PaymentPatch, PaymentStore};
use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgPaymentStore {
    pub pool: PgPool,
}

const SELECT_COLUMNS: &str = "payment_id, subject_type, subject_id, amount_minor, currency, status, \
     transaction_id, reference_id, notes, metadata, refund_reason, refunded_by, \
     created_at, processed_at, refunded_at";

fn row_to_payment(row: &PgRow) -> Result<Payment> {
    let subject_type: String = row.get("subject_type");
    let subject_id: String = row.get("subject_id");
    let subject = match subject_type.as_str() {
        "APPOINTMENT" => PaymentSubject::Appointment(subject_id),
        "AD" => PaymentSubject::Ad(subject_id),
        other => return Err(anyhow!("unknown subject type {}", other)),
    };

    let status: String = row.get("status");
    let status = PaymentStatus::parse(&status).ok_or_else(|| anyhow!("unknown status {}", status))?;

    let metadata: serde_json::Value = row.get("metadata");
    let metadata = serde_json::from_value(metadata)?;

    Ok(Payment {
        id: row.get("payment_id"),
        subject,
        amount_minor: row.get("amount_minor"),
        currency: row.get("currency"),
        status,
        transaction_id: row.get("transaction_id"),
        reference_id: row.get("reference_id"),
        notes: row.get("notes"),
        metadata,
        refund_reason: row.get("refund_reason"),
        refunded_by: row.get("refunded_by"),
        created_at: row.get("created_at"),
        processed_at: row.get("processed_at"),
        refunded_at: row.get("refunded_at"),
    })
}

impl PgPaymentStore {
    async fn write_back(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        payment: &Payment,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET status=$2, transaction_id=$3, reference_id=$4, metadata=$5,
                refund_reason=$6, refunded_by=$7, processed_at=$8, refunded_at=$9
            WHERE payment_id=$1
            "#,
        )
        .bind(payment.id)
        .bind(payment.status.as_str())
        .bind(payment.transaction_id.clone())
        .bind(payment.reference_id.clone())
        .bind(serde_json::to_value(&payment.metadata)?)
        .bind(payment.refund_reason.clone())
        .bind(payment.refunded_by.clone())
        .bind(payment.processed_at)
        .bind(payment.refunded_at)
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PaymentStore for PgPaymentStore {
    async fn create(&self, new: NewPayment) -> Result<Payment> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payments (
                payment_id, subject_type, subject_id, amount_minor, currency,
                status, transaction_id, reference_id, notes, metadata
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(new.id)
        .bind(new.subject.type_str())
        .bind(new.subject.id())
        .bind(new.amount_minor)
        .bind(new.currency)
        .bind(new.status.as_str())
        .bind(new.transaction_id)
        .bind(new.reference_id)
        .bind(new.notes)
        .bind(serde_json::to_value(&new.metadata)?)
        .fetch_one(&self.pool)
        .await?;

        row_to_payment(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE payment_id=$1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_payment).transpose()
    }

    async fn find_by_correlation(
        &self,
        transaction_id: Option<&str>,
        reference_id: Option<&str>,
    ) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM payments
            WHERE ($1::text IS NOT NULL AND transaction_id = $1)
               OR ($2::text IS NOT NULL AND (
                       reference_id = $2
                       OR metadata->'gateway'->>'reference_id' = $2))
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            SELECT_COLUMNS
        ))
        .bind(transaction_id)
        .bind(reference_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_payment).transpose()
    }

    async fn update(&self, id: Uuid, patch: PaymentPatch) -> Result<Option<Payment>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE payment_id=$1 FOR UPDATE",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(tx.as_mut())
        .await?;

        let Some(row) = row else { return Ok(None) };
        let mut payment = row_to_payment(&row)?;
        apply_patch(&mut payment, patch);
        Self::write_back(&mut tx, &payment).await?;
        tx.commit().await?;
        Ok(Some(payment))
    }

    async fn finalize(&self, id: Uuid, patch: PaymentPatch) -> Result<Finalize> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM payments WHERE payment_id=$1 FOR UPDATE",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(tx.as_mut())
        .await?;

        let Some(row) = row else { return Ok(Finalize::NotFound) };
        let mut payment = row_to_payment(&row)?;
        if payment.status.is_terminal() {
            return Ok(Finalize::AlreadyTerminal(payment));
        }

        apply_patch(&mut payment, patch);
        Self::write_back(&mut tx, &payment).await?;
        tx.commit().await?;
        Ok(Finalize::Applied(payment))
    }
}
