use async_trait::async_trait;
use dossier_core::report::{ReportBundle, ReportGenerator};
use dossier_core::{BoxError, Plan};

use crate::findings::gather;
use crate::render::{render_bundle, render_document};

/// Default report generator: stubbed gathering plus deterministic
/// rendering. Pure and retryable.
pub struct StubReportGenerator;

#[async_trait]
impl ReportGenerator for StubReportGenerator {
    async fn generate(&self, query: &str, plan: Plan) -> Result<ReportBundle, BoxError> {
        if query.trim().is_empty() {
            return Err("empty query".into());
        }

        let data = gather(query, plan);
        tracing::debug!(target = %data.target, findings = data.findings.len(), "report gathered");

        Ok(ReportBundle {
            document: render_document(&data, plan),
            bundle: render_bundle(&data, plan),
        })
    }
}
