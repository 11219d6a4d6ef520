use crate::domain::outcome::{classify, Outcome};
use crate::domain::payment::{
    GatewayMetadata, InitiatePaymentRequest, InitiatePaymentResponse, Payment, PaymentMetadata,
    PaymentStatus, PaymentStatusView, PaymentSubject,
};
use crate::error::PaymentError;
use crate::gateways::{GatewayCallback, InitiateRequest, PayerInfo, PayerValidator, PaymentGateway};
use crate::notify::{payment_event, Broadcaster, Publisher};
use crate::service::polling::{PollScheduler, PollTarget};
use crate::store::{Finalize, NewPayment, PaymentPatch, PaymentStore};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Normalized gateway event fed into a terminal transition, regardless of
/// whether it arrived over the webhook or out of a poll tick.
#[derive(Debug, Clone, Default)]
pub struct GatewayReport {
    pub transaction_id: Option<String>,
    pub reference_id: Option<String>,
    pub status: Option<String>,
    pub response_code: Option<String>,
    pub response_msg: Option<String>,
    pub received_via_webhook: bool,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub message: String,
    pub received: bool,
}

/// Owns the per-payment state machine:
///
/// ```text
/// PENDING -> PROCESSING -> { PAID, CANCELLED }
///                           PAID -> REFUNDED (operator action)
/// ```
///
/// Terminal transitions are settled by a conditional write against the store
/// keyed by payment id, so the webhook and the poll loop can race freely:
/// whichever arrives second observes the terminal record and performs no
/// side effects.
pub struct ReconciliationEngine {
    pub store: Arc<dyn PaymentStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub publisher: Arc<dyn Publisher>,
    pub scheduler: Arc<PollScheduler>,
    pub payer: PayerValidator,
}

impl ReconciliationEngine {
    /// Initiates a payment with the gateway and creates the record. A
    /// validation or gateway failure leaves nothing behind: the caller must
    /// never have a stale PENDING row to clean up.
    pub async fn initiate(
        self: &Arc<Self>,
        req: InitiatePaymentRequest,
    ) -> Result<InitiatePaymentResponse, PaymentError> {
        let subject = match (req.appointment_id, req.ad_id) {
            (Some(id), None) => PaymentSubject::Appointment(id),
            (None, Some(id)) => PaymentSubject::Ad(id),
            (Some(_), Some(_)) => {
                return Err(PaymentError::Validation(
                    "appointment_id and ad_id are mutually exclusive".to_string(),
                ))
            }
            (None, None) => {
                return Err(PaymentError::Validation(
                    "either appointment_id or ad_id is required".to_string(),
                ))
            }
        };
        if req.amount_minor < 1 {
            return Err(PaymentError::Validation(
                "amount_minor must be at least 1".to_string(),
            ));
        }
        let payer = self
            .payer
            .resolve(req.account_number.as_deref(), req.phone_number.as_deref())?;
        let currency = req.currency.unwrap_or_else(|| "USD".to_string());
        let description = req.description.unwrap_or_else(|| {
            format!("Payment for {} {}", subject.type_str().to_lowercase(), subject.id())
        });

        let ack = self
            .gateway
            .initiate(&InitiateRequest {
                subject_id: subject.id().to_string(),
                amount_minor: req.amount_minor,
                currency: currency.clone(),
                payer: payer.clone(),
                description,
            })
            .await?;

        let payment_id = Uuid::new_v4();
        // A transaction id in the ack means the gateway accepted the
        // purchase, so the record is born PROCESSING and the poll loop takes
        // over. Without one it is born PENDING and only a webhook can
        // resolve it. Writing the status at creation leaves no second write
        // for a fast webhook to race against: a settlement that lands right
        // after the insert stays settled.
        let status = if ack.transaction_id.is_some() {
            PaymentStatus::Processing
        } else {
            PaymentStatus::Pending
        };
        let metadata = PaymentMetadata {
            gateway: GatewayMetadata {
                transaction_id: ack.transaction_id.clone(),
                reference_id: Some(ack.reference_id.clone()),
                status: ack.status.clone(),
                response_code: ack.response_code.clone(),
                response_msg: ack.response_msg.clone(),
                account_number: match &payer {
                    PayerInfo::Account(a) => Some(a.clone()),
                    PayerInfo::Phone(_) => None,
                },
                phone_number: match &payer {
                    PayerInfo::Phone(p) => Some(p.clone()),
                    PayerInfo::Account(_) => None,
                },
                ..Default::default()
            },
            ..Default::default()
        };

        let payment = self
            .store
            .create(NewPayment {
                id: payment_id,
                subject: subject.clone(),
                amount_minor: req.amount_minor,
                currency,
                status,
                transaction_id: ack.transaction_id.clone(),
                reference_id: Some(ack.reference_id.clone()),
                notes: Some(format!("Mobile money payment - {}", ack.reference_id)),
                metadata,
            })
            .await?;

        if let Some(transaction_id) = ack.transaction_id.clone() {
            self.scheduler.start(
                Arc::clone(self),
                PollTarget {
                    payment_id,
                    subject_id: subject.id().to_string(),
                    transaction_id,
                    reference_id: ack.reference_id.clone(),
                },
            );
        } else {
            tracing::warn!(
                "payment {} initiated without a transaction id, awaiting webhook",
                payment_id
            );
        }

        tracing::info!(
            "payment {} initiated for {} {} ({} {})",
            payment_id,
            subject.type_str().to_lowercase(),
            subject.id(),
            payment.amount_minor,
            payment.currency
        );
        self.notify("payment.initiated", &payment, None).await;

        Ok(InitiatePaymentResponse {
            payment_id,
            subject,
            transaction_id: payment.transaction_id.clone(),
            reference_id: ack.reference_id,
            status: payment.status,
            message: "Payment initiated. Awaiting confirmation.".to_string(),
        })
    }

    /// Settles a payment as PAID. Idempotent: a second Success event finds
    /// the record already PAID and returns it unchanged, with no job
    /// cancellation, broadcast or publish repeated.
    pub async fn mark_completed(
        &self,
        payment_id: Uuid,
        report: GatewayReport,
    ) -> Result<Payment, PaymentError> {
        let now = Utc::now();
        let patch = PaymentPatch {
            status: Some(PaymentStatus::Paid),
            transaction_id: report.transaction_id.clone(),
            processed_at: Some(now),
            gateway_metadata: Some(GatewayMetadata {
                transaction_id: report.transaction_id.clone(),
                reference_id: report.reference_id.clone(),
                status: report.status.clone(),
                response_code: report.response_code.clone(),
                response_msg: report.response_msg.clone(),
                completed_at: Some(now),
                webhook_received_at: report.received_via_webhook.then_some(now),
                ..Default::default()
            }),
            ..Default::default()
        };

        match self.store.finalize(payment_id, patch).await? {
            Finalize::Applied(payment) => {
                self.scheduler.stop(payment_id);
                tracing::info!("payment {} completed", payment_id);
                self.notify("payment.completed", &payment, None).await;
                Ok(payment)
            }
            Finalize::AlreadyTerminal(payment) => match payment.status {
                PaymentStatus::Paid => Ok(payment),
                status => Err(PaymentError::InvalidTransition(format!(
                    "cannot complete a {} payment",
                    status.as_str()
                ))),
            },
            Finalize::NotFound => Err(PaymentError::NotFound(payment_id)),
        }
    }

    /// Settles a payment as CANCELLED, capturing the failure message. Same
    /// idempotency contract as `mark_completed`.
    pub async fn mark_failed(
        &self,
        payment_id: Uuid,
        report: GatewayReport,
    ) -> Result<Payment, PaymentError> {
        let now = Utc::now();
        let failure_msg = report.response_msg.clone();
        let patch = PaymentPatch {
            status: Some(PaymentStatus::Cancelled),
            transaction_id: report.transaction_id.clone(),
            gateway_metadata: Some(GatewayMetadata {
                transaction_id: report.transaction_id.clone(),
                reference_id: report.reference_id.clone(),
                status: report.status.clone(),
                response_code: report.response_code.clone(),
                response_msg: report.response_msg.clone(),
                failed_at: Some(now),
                webhook_received_at: report.received_via_webhook.then_some(now),
                ..Default::default()
            }),
            ..Default::default()
        };

        match self.store.finalize(payment_id, patch).await? {
            Finalize::Applied(payment) => {
                self.scheduler.stop(payment_id);
                tracing::info!(
                    "payment {} failed: {}",
                    payment_id,
                    failure_msg.as_deref().unwrap_or("no message")
                );
                self.notify("payment.failed", &payment, failure_msg.as_deref()).await;
                Ok(payment)
            }
            Finalize::AlreadyTerminal(payment) => match payment.status {
                PaymentStatus::Cancelled => Ok(payment),
                status => Err(PaymentError::InvalidTransition(format!(
                    "cannot fail a {} payment",
                    status.as_str()
                ))),
            },
            Finalize::NotFound => Err(PaymentError::NotFound(payment_id)),
        }
    }

    /// Operator-invoked refund. Only a PAID payment can be refunded, and
    /// only once; any other state leaves the record untouched.
    pub async fn refund(
        &self,
        payment_id: Uuid,
        reason: String,
        refunded_by: String,
    ) -> Result<Payment, PaymentError> {
        let payment = self
            .store
            .find_by_id(payment_id)
            .await?
            .ok_or(PaymentError::NotFound(payment_id))?;

        if payment.status == PaymentStatus::Refunded {
            return Err(PaymentError::InvalidTransition(
                "payment is already refunded".to_string(),
            ));
        }
        if payment.status != PaymentStatus::Paid {
            return Err(PaymentError::InvalidTransition(
                "only paid payments can be refunded".to_string(),
            ));
        }

        let refunded = self
            .store
            .update(payment_id, PaymentPatch {
                status: Some(PaymentStatus::Refunded),
                refunded_at: Some(Utc::now()),
                refund_reason: Some(reason),
                refunded_by: Some(refunded_by),
                ..Default::default()
            })
            .await?
            .ok_or(PaymentError::NotFound(payment_id))?;

        tracing::info!("payment {} refunded", payment_id);
        Ok(refunded)
    }

    pub async fn status(&self, payment_id: Uuid) -> Result<PaymentStatusView, PaymentError> {
        let payment = self
            .store
            .find_by_id(payment_id)
            .await?
            .ok_or(PaymentError::NotFound(payment_id))?;
        Ok(PaymentStatusView::from_payment(&payment))
    }

    /// Applies an inbound gateway callback. An unknown payment is
    /// acknowledged without error so the gateway stops retrying, and a
    /// duplicate delivery for an already-settled payment is absorbed
    /// silently.
    pub async fn apply_webhook(&self, callback: GatewayCallback) -> Result<WebhookAck, PaymentError> {
        let params = callback.service_params.unwrap_or_default();

        let payment = self
            .store
            .find_by_correlation(params.transaction_id.as_deref(), params.reference_id.as_deref())
            .await?;
        let Some(payment) = payment else {
            tracing::warn!(
                "webhook for unknown payment (transaction {:?}, reference {:?})",
                params.transaction_id,
                params.reference_id
            );
            return Ok(WebhookAck { message: "Payment not found".to_string(), received: true });
        };

        let outcome = classify(params.status.as_deref(), params.response_code.as_deref());
        let report = GatewayReport {
            transaction_id: params.transaction_id,
            reference_id: params.reference_id,
            status: params.status,
            response_code: params.response_code,
            response_msg: params.response_msg,
            received_via_webhook: true,
        };

        let applied = match outcome {
            Outcome::Success => self.mark_completed(payment.id, report).await,
            Outcome::Failure => self.mark_failed(payment.id, report).await,
            Outcome::Indeterminate => Ok(payment),
        };
        match applied {
            Ok(_) => {}
            Err(PaymentError::InvalidTransition(msg)) => {
                tracing::warn!("webhook for settled payment absorbed: {}", msg);
            }
            Err(err) => return Err(err),
        }

        Ok(WebhookAck { message: "Webhook processed".to_string(), received: true })
    }

    /// Best-effort notification fan-out. Failures are logged and swallowed;
    /// record-store content is the only thing that must be reliable.
    pub(crate) async fn notify(&self, event_type: &str, payment: &Payment, error: Option<&str>) {
        let payload = payment_event(event_type, payment, error);

        if let Err(err) = self
            .broadcaster
            .broadcast("payment_updates", event_type, payload.clone())
            .await
        {
            tracing::warn!("broadcast of {} for payment {} failed: {}", event_type, payment.id, err);
        }
        if let Err(err) = self.publisher.publish("payments", event_type, payload).await {
            tracing::warn!("publish of {} for payment {} failed: {}", event_type, payment.id, err);
        }
    }
}
