#![allow(dead_code)]

use anyhow::anyhow;
use payment_service::config::GatewayConfig;
use payment_service::domain::payment::{GatewayMetadata, Payment, PaymentMetadata, PaymentStatus, PaymentSubject};
use payment_service::gateways::mock::{MockBehavior, MockGateway};
use payment_service::gateways::PayerValidator;
use payment_service::notify::{Broadcaster, Publisher};
use payment_service::service::polling::PollScheduler;
use payment_service::service::reconciliation::{GatewayReport, ReconciliationEngine};
use payment_service::store::memory::InMemoryPaymentStore;
use payment_service::store::{NewPayment, PaymentStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub struct CountingBroadcaster {
    events: Mutex<Vec<(String, String)>>,
}

impl CountingBroadcaster {
    pub fn new() -> Self {
        Self { events: Mutex::new(Vec::new()) }
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|(_, e)| e == event).count()
    }
}

#[async_trait::async_trait]
impl Broadcaster for CountingBroadcaster {
    async fn broadcast(
        &self,
        topic: &str,
        event: &str,
        _payload: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.events.lock().unwrap().push((topic.to_string(), event.to_string()));
        Ok(())
    }
}

pub struct CountingPublisher {
    events: Mutex<Vec<(String, String)>>,
}

impl CountingPublisher {
    pub fn new() -> Self {
        Self { events: Mutex::new(Vec::new()) }
    }

    pub fn count(&self, routing_key: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|(_, k)| k == routing_key).count()
    }
}

#[async_trait::async_trait]
impl Publisher for CountingPublisher {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        _payload: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.events.lock().unwrap().push((exchange.to_string(), routing_key.to_string()));
        Ok(())
    }
}

pub struct FailingBroadcaster;

#[async_trait::async_trait]
impl Broadcaster for FailingBroadcaster {
    async fn broadcast(&self, _: &str, _: &str, _: serde_json::Value) -> anyhow::Result<()> {
        Err(anyhow!("broadcast transport down"))
    }
}

pub struct FailingPublisher;

#[async_trait::async_trait]
impl Publisher for FailingPublisher {
    async fn publish(&self, _: &str, _: &str, _: serde_json::Value) -> anyhow::Result<()> {
        Err(anyhow!("event bus down"))
    }
}

pub fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        api_url: "http://gateway.invalid/PaymentGateway/".to_string(),
        merchant_uid: "M0001".to_string(),
        api_user_id: "U0001".to_string(),
        api_key: "K0001".to_string(),
        default_account: "529988".to_string(),
        phone_country_code: "+252".to_string(),
        phone_subscriber_digits: 9,
        timeout_ms: 1000,
    }
}

pub struct Harness {
    pub store: Arc<InMemoryPaymentStore>,
    pub gateway: Arc<MockGateway>,
    pub broadcaster: Arc<CountingBroadcaster>,
    pub publisher: Arc<CountingPublisher>,
    pub scheduler: Arc<PollScheduler>,
    pub engine: Arc<ReconciliationEngine>,
}

pub fn harness(behavior: MockBehavior) -> Harness {
    harness_with_limits(behavior, Duration::from_secs(10), 60, Duration::from_secs(900))
}

pub fn harness_with_limits(
    behavior: MockBehavior,
    interval: Duration,
    max_attempts: u32,
    max_duration: Duration,
) -> Harness {
    let store = Arc::new(InMemoryPaymentStore::new());
    let gateway = Arc::new(MockGateway::new(behavior));
    let broadcaster = Arc::new(CountingBroadcaster::new());
    let publisher = Arc::new(CountingPublisher::new());
    let scheduler = Arc::new(PollScheduler::with_limits(interval, max_attempts, max_duration));

    let engine = Arc::new(ReconciliationEngine {
        store: store.clone(),
        gateway: gateway.clone(),
        broadcaster: broadcaster.clone(),
        publisher: publisher.clone(),
        scheduler: scheduler.clone(),
        payer: PayerValidator::new(&gateway_config()).unwrap(),
    });

    Harness { store, gateway, broadcaster, publisher, scheduler, engine }
}

pub async fn seed_processing_payment(
    store: &Arc<InMemoryPaymentStore>,
    transaction_id: &str,
    reference_id: &str,
) -> Payment {
    store
        .create(NewPayment {
            id: Uuid::new_v4(),
            subject: PaymentSubject::Appointment("A1".to_string()),
            amount_minor: 1000,
            currency: "USD".to_string(),
            status: PaymentStatus::Processing,
            transaction_id: Some(transaction_id.to_string()),
            reference_id: Some(reference_id.to_string()),
            notes: None,
            metadata: PaymentMetadata {
                gateway: GatewayMetadata {
                    transaction_id: Some(transaction_id.to_string()),
                    reference_id: Some(reference_id.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        })
        .await
        .unwrap()
}

pub fn success_report(transaction_id: &str) -> GatewayReport {
    GatewayReport {
        transaction_id: Some(transaction_id.to_string()),
        reference_id: None,
        status: Some("COMPLETED".to_string()),
        response_code: Some("200".to_string()),
        response_msg: Some("RCS_SUCCESS".to_string()),
        received_via_webhook: false,
    }
}

pub fn failure_report(transaction_id: &str) -> GatewayReport {
    GatewayReport {
        transaction_id: Some(transaction_id.to_string()),
        reference_id: None,
        status: Some("FAILED".to_string()),
        response_code: Some("5310".to_string()),
        response_msg: Some("payer declined".to_string()),
        received_via_webhook: false,
    }
}
