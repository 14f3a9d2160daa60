use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dossier_core::storage::proof_key;
use dossier_core::{Artifacts, Plan};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub plan: String,
    pub query: String,
    pub customer_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
    pub status: String,
    pub amount_due: i32,
    pub currency: String,
    pub payment_methods: Vec<PaymentMethod>,
    pub download_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentMethod {
    pub id: &'static str,
    pub label: &'static str,
    pub instructions: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub artifacts: Option<Artifacts>,
}

#[derive(Debug, Serialize)]
pub struct ProofResponse {
    pub ok: bool,
    pub order_id: Uuid,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub token: Option<String>,
}

// Payment instructions shown to the client after order creation. Kept
// server-side so account details never live in the frontend.
fn payment_methods() -> Vec<PaymentMethod> {
    vec![
        PaymentMethod {
            id: "bank_transfer",
            label: "Bank transfer (SPEI)",
            instructions: "Transfer the exact amount and keep the reference number.",
        },
        PaymentMethod {
            id: "oxxo",
            label: "OXXO",
            instructions: "Deposit at any branch and keep the ticket.",
        },
        PaymentMethod {
            id: "paypal",
            label: "PayPal",
            instructions: "Send the amount and keep the transaction id.",
        },
    ]
}

/// Requesting principal, from the `x-user-id` header. Upstream validates
/// the session; this service only needs the principal id.
fn require_owner(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized("auth required".to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/orders
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    let owner_id = require_owner(&headers)?;
    let plan = Plan::parse(&req.plan)
        .ok_or_else(|| AppError::BadRequest(format!("unknown plan '{}'", req.plan)))?;

    let order = state
        .service
        .create_order(&owner_id, plan, &req.query, req.customer_email)
        .await
        .map_err(AppError::from_core)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order_id: order.id,
            status: order.status.to_string(),
            amount_due: order.amount_due,
            currency: order.currency,
            payment_methods: payment_methods(),
            download_token: order.download_token.map(|t| t.value),
        }),
    ))
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    let owner_id = require_owner(&headers)?;
    let view = state
        .service
        .get_status(order_id, &owner_id)
        .await
        .map_err(AppError::from_core)?;

    Ok(Json(StatusResponse {
        status: view.status.to_string(),
        artifacts: view.artifacts,
    }))
}

/// POST /api/orders/{id}/proof
/// Multipart upload of the proof-of-payment file.
pub async fn attach_proof(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ProofResponse>, AppError> {
    let owner_id = require_owner(&headers)?;

    // Validate ownership and state up front so rejected requests never
    // write a blob.
    state
        .service
        .ensure_awaiting_proof(order_id, &owner_id)
        .await
        .map_err(AppError::from_core)?;

    let mut blob = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid upload: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("invalid upload: {e}")))?;
            blob = Some(bytes);
            break;
        }
    }
    let blob = blob.ok_or_else(|| AppError::BadRequest("no file received".to_string()))?;

    let key = proof_key(order_id);
    let proof_ref = state
        .artifact_store
        .put(&blob, &key)
        .await
        .map_err(|e| AppError::BadGateway(format!("proof upload failed: {e}")))?;

    let order = state
        .service
        .attach_proof(order_id, &owner_id, &proof_ref)
        .await
        .map_err(AppError::from_core)?;

    Ok(Json(ProofResponse {
        ok: true,
        order_id,
        status: order.status.to_string(),
    }))
}

/// GET /api/orders/{id}/download
///
/// Owner-checked redirect to the bundle. A `?token=` query selects the
/// single-use capability path instead and needs no owner header.
pub async fn download(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    let target = if let Some(token) = query.token {
        state
            .service
            .exchange_download_token(order_id, &token)
            .await
            .map_err(AppError::from_core)?
    } else {
        let owner_id = require_owner(&headers)?;
        state
            .service
            .get_download(order_id, &owner_id)
            .await
            .map_err(AppError::from_core)?
    };

    Ok(Redirect::to(&target))
}
