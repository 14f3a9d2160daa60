use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MarkPaidRequest {
    pub payment_ref: Option<String>,
    pub customer_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MarkPaidResponse {
    pub ok: bool,
    pub status: String,
}

/// The single privileged surface: a shared-secret bearer key.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let presented = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("admin credential required".to_string()))?;

    if state.admin_api_key.is_empty() || presented != state.admin_api_key {
        return Err(AppError::Forbidden("invalid admin credential".to_string()));
    }
    Ok(())
}

/// POST /api/admin/orders/{id}/mark-paid
/// Manual payment confirmation; idempotent under replay.
pub async fn mark_paid(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<MarkPaidRequest>,
) -> Result<Json<MarkPaidResponse>, AppError> {
    require_admin(&state, &headers)?;

    state
        .service
        .confirm_payment(order_id, req.payment_ref, req.customer_email)
        .await
        .map_err(AppError::from_core)?;

    Ok(Json(MarkPaidResponse {
        ok: true,
        status: "paid".to_string(),
    }))
}

/// POST /api/admin/orders/{id}/retry
/// Resets a failed (or stale-processing) order to paid and re-runs
/// fulfillment.
pub async fn retry(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_admin(&state, &headers)?;

    state
        .service
        .retry_fulfillment(order_id)
        .await
        .map_err(AppError::from_core)?;

    Ok(Json(json!({ "ok": true })))
}
