pub mod config;
pub mod error;
pub mod domain {
    pub mod outcome;
    pub mod payment;
}
pub mod gateways;
pub mod notify;
pub mod store;
pub mod service {
    pub mod polling;
    pub mod reconciliation;
}
pub mod http {
    pub mod handlers {
        pub mod payments;
        pub mod webhook;
    }
}

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<service::reconciliation::ReconciliationEngine>,
}
