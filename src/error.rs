use uuid::Uuid;

/// Failures surfaced by the reconciliation engine. Notification failures are
/// deliberately absent: broadcast/publish problems are logged and swallowed,
/// never returned to the caller of the transition that triggered them.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),

    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("gateway rejected payment: {0}")]
    GatewayRejected(String),

    #[error("payment {0} not found")]
    NotFound(Uuid),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::Validation(_) => "VALIDATION_ERROR",
            PaymentError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            PaymentError::GatewayRejected(_) => "GATEWAY_REJECTED",
            PaymentError::NotFound(_) => "PAYMENT_NOT_FOUND",
            PaymentError::InvalidTransition(_) => "INVALID_TRANSITION",
            PaymentError::Store(_) => "INTERNAL_ERROR",
        }
    }
}
