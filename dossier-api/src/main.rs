use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use dossier_api::{app, worker, AppState};
use dossier_core::repository::OrderRepository;
use dossier_order::{FulfillmentPipeline, OrderService};
use dossier_report::StubReportGenerator;
use dossier_store::{LogNotifier, MemoryOrderRepository, PgOrderRepository, StorageMode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dossier_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = dossier_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Dossier API on port {}", config.server.port);

    let repo: Arc<dyn OrderRepository> = if config.database.url.is_empty() {
        tracing::warn!("No database URL configured; orders will not survive a restart");
        Arc::new(MemoryOrderRepository::new())
    } else {
        let pool = dossier_store::database::connect(&config.database.url)
            .await
            .expect("Failed to connect to Postgres");
        dossier_store::database::migrate(&pool)
            .await
            .expect("Failed to run migrations");
        Arc::new(PgOrderRepository::new(pool))
    };

    let artifact_store =
        dossier_store::artifact_store::from_config(&config.storage, &config.server.base_url);
    let notifier = Arc::new(LogNotifier::new(&config.mail.from));
    let generator = Arc::new(StubReportGenerator);

    let pipeline = Arc::new(FulfillmentPipeline::new(
        repo.clone(),
        generator,
        artifact_store.clone(),
        notifier,
    ));
    let queue = worker::spawn_fulfillment_worker(pipeline, repo.clone());
    let service = Arc::new(OrderService::new(
        repo,
        queue,
        config.fulfillment.stale_processing_seconds,
    ));

    let storage_dir = (config.storage.mode == StorageMode::Local)
        .then(|| PathBuf::from(&config.storage.local_dir));

    let state = AppState {
        service,
        artifact_store,
        admin_api_key: config.auth.admin_api_key.clone(),
        cors_origin: config.server.cors_origin.clone(),
        storage_dir,
    };

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
