use crate::gateways::GatewayCallback;
use crate::http::handlers::payments::error_response;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

/// Gateway callback ingress. Always acknowledges known-but-settled and
/// unknown payments with 200 so the gateway stops retrying; only internal
/// failures surface as errors.
pub async fn gateway_callback(
    State(state): State<AppState>,
    Json(callback): Json<GatewayCallback>,
) -> impl IntoResponse {
    match state.engine.apply_webhook(callback).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}
