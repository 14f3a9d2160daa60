use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod error;
pub mod orders;
pub mod state;
pub mod webhooks;
pub mod worker;

#[cfg(test)]
mod router_tests;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origin);

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/api/orders", post(orders::create_order))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/proof", post(orders::attach_proof))
        .route("/api/orders/{id}/download", get(orders::download))
        .route("/api/admin/orders/{id}/mark-paid", post(admin::mark_paid))
        .route("/api/admin/orders/{id}/retry", post(admin::retry))
        .route("/api/webhooks/payments", post(webhooks::handle_payment_event));

    // Local storage mode serves generated artifacts directly.
    if let Some(dir) = &state.storage_dir {
        router = router.nest_service("/storage", ServeDir::new(dir));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
        ]);

    if origin == "*" {
        return cors.allow_origin(tower_http::cors::Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => cors.allow_origin(value),
        Err(_) => {
            tracing::warn!(origin, "unparseable CORS origin, allowing any");
            cors.allow_origin(tower_http::cors::Any)
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}
