use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use dossier_core::repository::OrderRepository;
use dossier_core::OrderStatus;
use dossier_order::{FulfillmentPipeline, OrderService};
use dossier_report::StubReportGenerator;
use dossier_store::{LocalArtifactStore, LogNotifier, MemoryOrderRepository};
use tokio::sync::mpsc;

use crate::{app, AppState};

const ADMIN_KEY: &str = "test-admin-key";

struct Harness {
    app: axum::Router,
    repo: Arc<MemoryOrderRepository>,
    pipeline: FulfillmentPipeline,
    rx: mpsc::UnboundedReceiver<Uuid>,
    storage_dir: std::path::PathBuf,
}

fn harness() -> Harness {
    let repo = Arc::new(MemoryOrderRepository::new());
    let (tx, rx) = mpsc::unbounded_channel();
    let service = Arc::new(OrderService::new(repo.clone(), tx, 900));
    let storage_dir = std::env::temp_dir().join(format!("dossier-api-test-{}", Uuid::new_v4()));
    let artifact_store = Arc::new(LocalArtifactStore::new(
        storage_dir.clone(),
        "http://localhost:3000",
    ));
    let pipeline = FulfillmentPipeline::new(
        repo.clone(),
        Arc::new(StubReportGenerator),
        artifact_store.clone(),
        Arc::new(LogNotifier::default()),
    );

    let state = AppState {
        service,
        artifact_store,
        admin_api_key: ADMIN_KEY.to_string(),
        cors_origin: "*".to_string(),
        storage_dir: None,
    };

    Harness {
        app: app(state),
        repo,
        pipeline,
        rx,
        storage_dir,
    }
}

fn proof_request(order_id: Uuid, user: &str) -> Request<Body> {
    let boundary = "proofupload";
    let body = format!(
        "--{boundary}\r\n\
         content-disposition: form-data; name=\"file\"; filename=\"receipt.png\"\r\n\
         content-type: image/png\r\n\r\n\
         receipt bytes\r\n\
         --{boundary}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri(format!("/api/orders/{order_id}/proof"))
        .header("x-user-id", user)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", "u1")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_order(h: &Harness) -> Uuid {
    let response = h
        .app
        .clone()
        .oneshot(post_json(
            "/api/orders",
            json!({ "plan": "PRO", "query": "acme" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    body["order_id"].as_str().unwrap().parse().unwrap()
}

async fn drain(h: &mut Harness) {
    while let Ok(id) = h.rx.try_recv() {
        h.pipeline.run(id).await;
    }
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_requires_principal() {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/api/orders")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "plan": "PRO", "query": "acme" }).to_string()))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_rejects_unknown_plan() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(post_json(
            "/api/orders",
            json!({ "plan": "ENTERPRISE", "query": "acme" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_returns_payment_details() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(post_json(
            "/api/orders",
            json!({ "plan": "PRO", "query": "acme" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    assert_eq!(body["status"], "pending_payment");
    assert_eq!(body["amount_due"], 20);
    assert_eq!(body["currency"], "MXN");
    assert!(!body["payment_methods"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_mark_paid_rejects_bad_secret() {
    let mut h = harness();
    let order_id = create_order(&h).await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/admin/orders/{order_id}/mark-paid"))
        .header("content-type", "application/json")
        .header("Authorization", "Bearer wrong-key")
        .body(Body::from(json!({}).to_string()))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // No credential at all is unauthenticated.
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/admin/orders/{order_id}/mark-paid"))
        .header("content-type", "application/json")
        .body(Body::from(json!({}).to_string()))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    drain(&mut h).await;
    let order = h.repo.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::PendingPayment);
}

#[tokio::test]
async fn test_mark_paid_then_download() {
    let mut h = harness();
    let order_id = create_order(&h).await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/admin/orders/{order_id}/mark-paid"))
        .header("content-type", "application/json")
        .header("Authorization", format!("Bearer {ADMIN_KEY}"))
        .body(Body::from(json!({ "payment_ref": "spei-1" }).to_string()))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    drain(&mut h).await;

    let request = Request::builder()
        .uri(format!("/api/orders/{order_id}"))
        .header("x-user-id", "u1")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ready");
    assert!(body["artifacts"]["document_url"].as_str().unwrap().len() > 0);

    // Owner download redirects.
    let request = Request::builder()
        .uri(format!("/api/orders/{order_id}/download"))
        .header("x-user-id", "u1")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // Anyone else is refused, even though the order is ready.
    let request = Request::builder()
        .uri(format!("/api/orders/{order_id}/download"))
        .header("x-user-id", "u2")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_download_before_ready_conflicts() {
    let h = harness();
    let order_id = create_order(&h).await;

    let request = Request::builder()
        .uri(format!("/api/orders/{order_id}/download"))
        .header("x-user-id", "u1")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_webhook_duplicate_delivery() {
    let mut h = harness();
    let order_id = create_order(&h).await;

    let event = json!({
        "external_session_id": "cs_1",
        "correlation_ref": order_id.to_string(),
        "amount": 20,
        "customer_email": "buyer@example.com"
    });
    for _ in 0..2 {
        let request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/payments")
            .header("content-type", "application/json")
            .body(Body::from(event.to_string()))
            .unwrap();
        let response = h.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Exactly one fulfillment was scheduled across both deliveries.
    assert!(h.rx.try_recv().is_ok());
    assert!(h.rx.try_recv().is_err());

    let order = h.repo.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_proof_upload_checked_before_storing() {
    let h = harness();
    let order_id = create_order(&h).await;
    let proof_path = h.storage_dir.join(format!("proofs/{order_id}"));

    // A non-owner is refused and no blob lands in storage.
    let response = h.app.clone().oneshot(proof_request(order_id, "u2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!proof_path.exists());

    // The owner's upload goes through and is recorded on the order.
    let response = h.app.clone().oneshot(proof_request(order_id, "u1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(proof_path.exists());
    let body = json_body(response).await;
    assert_eq!(body["status"], "proof_submitted");

    // A second upload is rejected without overwriting anything.
    let response = h.app.clone().oneshot(proof_request(order_id, "u1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_status_of_unknown_order() {
    let h = harness();
    let request = Request::builder()
        .uri(format!("/api/orders/{}", Uuid::new_v4()))
        .header("x-user-id", "u1")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
