use crate::error::PaymentError;
use crate::gateways::{make_reference_id, GatewayAck, InitiateRequest, PaymentGateway, StatusInquiry};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    AlwaysSuccess,
    AlwaysFailure,
    AlwaysPending,
    Unavailable,
    /// Status inquiries pop from the queue loaded via `push_status`; an
    /// empty queue answers PENDING.
    Scripted,
}

/// Gateway stand-in for tests and local development. Counts calls so tests
/// can assert that validation failures never reach the network.
pub struct MockGateway {
    pub behavior: MockBehavior,
    initiate_calls: AtomicUsize,
    status_calls: AtomicUsize,
    status_script: Mutex<VecDeque<StatusInquiry>>,
}

impl MockGateway {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            initiate_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            status_script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_status(&self, inquiry: StatusInquiry) {
        self.status_script.lock().unwrap().push_back(inquiry);
    }

    pub fn initiate_calls(&self) -> usize {
        self.initiate_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn initiate(&self, request: &InitiateRequest) -> Result<GatewayAck, PaymentError> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::AlwaysFailure => {
                Err(PaymentError::GatewayRejected("mock decline".to_string()))
            }
            MockBehavior::Unavailable => {
                Err(PaymentError::GatewayUnavailable("mock outage".to_string()))
            }
            _ => Ok(GatewayAck {
                transaction_id: Some(format!("mock_txn_{}", uuid::Uuid::new_v4())),
                reference_id: make_reference_id(&request.subject_id),
                status: Some("PENDING".to_string()),
                response_code: Some("200".to_string()),
                response_msg: Some("mock purchase accepted".to_string()),
            }),
        }
    }

    async fn check_status(
        &self,
        transaction_id: &str,
        _reference_id: &str,
    ) -> Result<StatusInquiry, PaymentError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::AlwaysSuccess => Ok(StatusInquiry {
                transaction_id: Some(transaction_id.to_string()),
                status: Some("COMPLETED".to_string()),
                response_code: Some("200".to_string()),
                response_msg: Some("mock settled".to_string()),
                ..Default::default()
            }),
            MockBehavior::AlwaysFailure => Ok(StatusInquiry {
                transaction_id: Some(transaction_id.to_string()),
                status: Some("FAILED".to_string()),
                response_code: Some("5310".to_string()),
                response_msg: Some("mock decline".to_string()),
                ..Default::default()
            }),
            MockBehavior::AlwaysPending => Ok(StatusInquiry {
                transaction_id: Some(transaction_id.to_string()),
                status: Some("PENDING".to_string()),
                response_code: Some("PENDING".to_string()),
                ..Default::default()
            }),
            MockBehavior::Unavailable => {
                Err(PaymentError::GatewayUnavailable("mock outage".to_string()))
            }
            MockBehavior::Scripted => {
                let scripted = self.status_script.lock().unwrap().pop_front();
                Ok(scripted.unwrap_or_else(|| StatusInquiry {
                    transaction_id: Some(transaction_id.to_string()),
                    status: Some("PENDING".to_string()),
                    ..Default::default()
                }))
            }
        }
    }
}
