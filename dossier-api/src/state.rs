use std::path::PathBuf;
use std::sync::Arc;

use dossier_core::storage::ArtifactStore;
use dossier_order::OrderService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrderService>,
    pub artifact_store: Arc<dyn ArtifactStore>,
    pub admin_api_key: String,
    pub cors_origin: String,
    /// Set in local storage mode; the directory served under `/storage`.
    pub storage_dir: Option<PathBuf>,
}
