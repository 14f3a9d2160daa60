use async_trait::async_trait;

use crate::models::Plan;
use crate::BoxError;

/// Rendered deliverables for one order: the report document plus the
/// downloadable bundle.
#[derive(Debug, Clone)]
pub struct ReportBundle {
    pub document: Vec<u8>,
    pub bundle: Vec<u8>,
}

/// Pure transform from a query string to rendered report bytes. No side
/// effects; safe to retry.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, query: &str, plan: Plan) -> Result<ReportBundle, BoxError>;
}
