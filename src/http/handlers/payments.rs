use crate::domain::payment::{ErrorEnvelope, ErrorPayload, InitiatePaymentRequest};
use crate::error::PaymentError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

pub async fn initiate_payment(
    State(state): State<AppState>,
    Json(req): Json<InitiatePaymentRequest>,
) -> impl IntoResponse {
    match state.engine.initiate(req).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.engine.status(payment_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub reason: String,
    pub refunded_by: String,
}

pub async fn refund_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(req): Json<RefundRequest>,
) -> impl IntoResponse {
    match state.engine.refund(payment_id, req.reason, req.refunded_by).await {
        Ok(payment) => (StatusCode::OK, Json(payment)).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub fn error_response(err: PaymentError) -> (StatusCode, Json<ErrorEnvelope>) {
    let status = match &err {
        PaymentError::Validation(_)
        | PaymentError::GatewayRejected(_)
        | PaymentError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
        PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
        PaymentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorEnvelope {
        error: ErrorPayload { code: err.code().to_string(), message: err.to_string() },
    };
    (status, Json(body))
}
