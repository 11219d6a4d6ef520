use crate::config::PollingConfig;
use crate::domain::outcome::{classify, Outcome};
use crate::gateways::StatusInquiry;
use crate::service::reconciliation::{GatewayReport, ReconciliationEngine};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PollTarget {
    pub payment_id: Uuid,
    pub subject_id: String,
    pub transaction_id: String,
    pub reference_id: String,
}

/// One repeating timer per in-flight payment, held in a map keyed by payment
/// id. Jobs are transient scheduler state, never persisted; at most one job
/// exists per payment at any time.
pub struct PollScheduler {
    jobs: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    pub interval: Duration,
    pub max_attempts: u32,
    pub max_duration: Duration,
}

impl PollScheduler {
    pub fn new(cfg: &PollingConfig) -> Self {
        Self::with_limits(
            Duration::from_secs(cfg.interval_secs),
            cfg.max_attempts,
            Duration::from_secs(cfg.max_duration_secs),
        )
    }

    pub fn with_limits(interval: Duration, max_attempts: u32, max_duration: Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            interval,
            max_attempts,
            max_duration,
        }
    }

    /// Starts polling for a payment, replacing (and stopping) any existing
    /// job for the same payment id.
    pub fn start(self: &Arc<Self>, engine: Arc<ReconciliationEngine>, target: PollTarget) {
        let payment_id = target.payment_id;
        tracing::info!(
            "starting poll job for payment {} (transaction {})",
            payment_id,
            target.transaction_id
        );

        let handle = tokio::spawn(poll_loop(Arc::clone(self), engine, target));
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(old) = jobs.insert(payment_id, handle) {
            old.abort();
        }
    }

    /// Cancels and removes the job if one exists; a no-op otherwise. Safe to
    /// call from within the job's own task: the entry is removed but the
    /// running task is left to finish its terminal transition.
    pub fn stop(&self, payment_id: Uuid) {
        if let Some(handle) = self.jobs.lock().unwrap().remove(&payment_id) {
            if tokio::task::try_id() != Some(handle.id()) {
                handle.abort();
            }
            tracing::info!("stopped poll job for payment {}", payment_id);
        }
    }

    pub fn has_job(&self, payment_id: Uuid) -> bool {
        self.jobs.lock().unwrap().contains_key(&payment_id)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn shutdown(&self) {
        let mut jobs = self.jobs.lock().unwrap();
        for (_, handle) in jobs.drain() {
            handle.abort();
        }
    }

    /// Drops this task's own map entry on exit, unless the job has already
    /// been replaced by a newer one for the same payment.
    fn finish(&self, payment_id: Uuid) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(handle) = jobs.get(&payment_id) {
            if tokio::task::try_id() == Some(handle.id()) {
                jobs.remove(&payment_id);
            }
        }
    }
}

async fn poll_loop(
    scheduler: Arc<PollScheduler>,
    engine: Arc<ReconciliationEngine>,
    target: PollTarget,
) {
    let started = tokio::time::Instant::now();
    let mut ticker = tokio::time::interval(scheduler.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval fires immediately; the first real poll happens one interval in
    ticker.tick().await;

    let mut attempts: u32 = 0;
    loop {
        ticker.tick().await;
        attempts += 1;

        // Ceilings abandon the job but leave the payment where it is: a
        // late webhook may still resolve it.
        if started.elapsed() > scheduler.max_duration {
            tracing::warn!("polling window for payment {} exhausted, abandoning job", target.payment_id);
            break;
        }
        if attempts > scheduler.max_attempts {
            tracing::warn!("polling attempt ceiling for payment {} reached, abandoning job", target.payment_id);
            break;
        }

        let inquiry = match engine
            .gateway
            .check_status(&target.transaction_id, &target.reference_id)
            .await
        {
            Ok(inquiry) => inquiry,
            Err(err) => {
                // Transient; a network blip must not flip the payment.
                tracing::warn!(
                    "status check for payment {} failed (attempt {}): {}",
                    target.payment_id,
                    attempts,
                    err
                );
                continue;
            }
        };

        match classify(inquiry.status.as_deref(), inquiry.response_code.as_deref()) {
            Outcome::Indeterminate => {
                tracing::debug!("payment {} still pending (attempt {})", target.payment_id, attempts);
            }
            Outcome::Success => {
                if let Err(err) = engine
                    .mark_completed(target.payment_id, poll_report(&target, inquiry))
                    .await
                {
                    tracing::error!("completing payment {} from poll failed: {}", target.payment_id, err);
                }
                break;
            }
            Outcome::Failure => {
                if let Err(err) = engine
                    .mark_failed(target.payment_id, poll_report(&target, inquiry))
                    .await
                {
                    tracing::error!("failing payment {} from poll failed: {}", target.payment_id, err);
                }
                break;
            }
        }
    }

    scheduler.finish(target.payment_id);
}

fn poll_report(target: &PollTarget, inquiry: StatusInquiry) -> GatewayReport {
    GatewayReport {
        transaction_id: inquiry.transaction_id.or_else(|| Some(target.transaction_id.clone())),
        reference_id: inquiry.reference_id.or_else(|| Some(target.reference_id.clone())),
        status: inquiry.status,
        response_code: inquiry.response_code,
        response_msg: inquiry.response_msg,
        received_via_webhook: false,
    }
}
