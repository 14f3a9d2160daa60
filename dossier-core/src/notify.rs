use async_trait::async_trait;

use crate::BoxError;

/// Delivery-email capability. Failures are non-fatal to order state by
/// contract; callers log and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, link: &str, subject_context: &str) -> Result<(), BoxError>;
}
