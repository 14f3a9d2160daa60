use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use dossier_core::payment::PaymentEvent;

use crate::error::AppError;
use crate::state::AppState;

/// Payment event as delivered by the gateway integration. Signature
/// verification happens upstream; by the time the body reaches this
/// handler it is trusted.
#[derive(Debug, Deserialize)]
pub struct GatewayEventRequest {
    pub external_session_id: String,
    pub correlation_ref: String,
    pub amount: i32,
    pub customer_email: Option<String>,
}

/// POST /api/webhooks/payments
///
/// Always returns 200 for duplicates and uncorrelatable events so the
/// gateway stops redelivering them.
pub async fn handle_payment_event(
    State(state): State<AppState>,
    Json(payload): Json<GatewayEventRequest>,
) -> Result<StatusCode, AppError> {
    tracing::info!(
        session_id = %payload.external_session_id,
        correlation_ref = %payload.correlation_ref,
        "payment event received"
    );

    let event = PaymentEvent {
        external_session_id: payload.external_session_id,
        correlation_ref: payload.correlation_ref,
        amount: payload.amount,
        customer_email: payload.customer_email,
    };

    state
        .service
        .handle_gateway_event(&event)
        .await
        .map_err(AppError::from_core)?;

    Ok(StatusCode::OK)
}
