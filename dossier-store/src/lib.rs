pub mod app_config;
pub mod artifact_store;
pub mod database;
pub mod memory_repo;
pub mod notifier;
pub mod order_repo;

pub use app_config::{Config, StorageMode};
pub use artifact_store::{LocalArtifactStore, SignedArtifactStore};
pub use memory_repo::MemoryOrderRepository;
pub use notifier::LogNotifier;
pub use order_repo::PgOrderRepository;
