use async_trait::async_trait;
use uuid::Uuid;

use crate::BoxError;

/// Durable blob storage with read-URL issuance.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes `bytes` under `key` (idempotent overwrite) and returns a
    /// durable read URL for it.
    async fn put(&self, bytes: &[u8], key: &str) -> Result<String, BoxError>;
}

/// Artifact keys are deterministic per order id so that overwrites and
/// cleanup are well-defined.
pub fn document_key(order_id: Uuid) -> String {
    format!("{order_id}.pdf")
}

pub fn bundle_key(order_id: Uuid) -> String {
    format!("{order_id}.zip")
}

pub fn proof_key(order_id: Uuid) -> String {
    format!("proofs/{order_id}")
}
