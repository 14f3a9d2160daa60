use std::sync::Arc;

use dossier_core::notify::Notifier;
use dossier_core::report::ReportGenerator;
use dossier_core::repository::{OrderRepository, RepoError, StatusPatch};
use dossier_core::storage::{bundle_key, document_key, ArtifactStore};
use dossier_core::{Artifacts, Order, OrderStatus};
use uuid::Uuid;

/// Result of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Claimed the order and brought it to Ready.
    Completed,
    /// Claimed the order but a step failed; order is now Failed.
    Failed,
    /// Did not claim the order (already claimed, wrong state, or gone).
    Skipped,
}

/// Produces and publishes artifacts for a paid order, exactly once.
///
/// Exclusivity comes from the atomic Paid → Processing compare-and-set,
/// not from an in-process lock: triggers may arrive from the webhook,
/// the admin path, and retries, possibly across process restarts. Only
/// the invocation that wins the claim does work; the rest no-op.
pub struct FulfillmentPipeline {
    repo: Arc<dyn OrderRepository>,
    generator: Arc<dyn ReportGenerator>,
    store: Arc<dyn ArtifactStore>,
    notifier: Arc<dyn Notifier>,
}

impl FulfillmentPipeline {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        generator: Arc<dyn ReportGenerator>,
        store: Arc<dyn ArtifactStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            generator,
            store,
            notifier,
        }
    }

    pub async fn run(&self, order_id: Uuid) -> PipelineOutcome {
        // Claim. A conflict here is a benign race, not an error.
        let order = match self
            .repo
            .compare_and_set_status(
                order_id,
                OrderStatus::Paid,
                OrderStatus::Processing,
                StatusPatch::default(),
            )
            .await
        {
            Ok(order) => order,
            Err(RepoError::Conflict { found, .. }) => {
                tracing::debug!(%order_id, %found, "fulfillment skipped, order not claimable");
                return PipelineOutcome::Skipped;
            }
            Err(RepoError::NotFound(_)) => {
                tracing::warn!(%order_id, "fulfillment skipped, order missing");
                return PipelineOutcome::Skipped;
            }
            Err(e) => {
                tracing::error!(%order_id, error = %e, "fulfillment claim failed");
                return PipelineOutcome::Skipped;
            }
        };

        match self.execute(&order).await {
            Ok(artifacts) => {
                if let Err(e) = self.finalize(order_id, artifacts.clone()).await {
                    tracing::error!(%order_id, error = %e, "finalize failed");
                    self.fail(order_id, "finalize transition lost").await;
                    return PipelineOutcome::Failed;
                }
                self.notify(&order, &artifacts).await;
                tracing::info!(%order_id, "fulfillment completed");
                PipelineOutcome::Completed
            }
            Err(reason) => {
                tracing::error!(%order_id, %reason, "fulfillment failed");
                self.fail(order_id, &reason).await;
                PipelineOutcome::Failed
            }
        }
    }

    /// Generate and persist. Any error aborts this invocation; nothing
    /// here retries (retry is an explicit admin action).
    async fn execute(&self, order: &Order) -> Result<Artifacts, String> {
        let report = self
            .generator
            .generate(&order.query, order.plan)
            .await
            .map_err(|e| format!("report generation failed: {e}"))?;

        let document_url = self
            .store
            .put(&report.document, &document_key(order.id))
            .await
            .map_err(|e| format!("document upload failed: {e}"))?;

        let bundle_url = self
            .store
            .put(&report.bundle, &bundle_key(order.id))
            .await
            .map_err(|e| format!("bundle upload failed: {e}"))?;

        Ok(Artifacts {
            document_url,
            bundle_url,
        })
    }

    /// Processing → Ready with artifacts in the same atomic update.
    async fn finalize(&self, order_id: Uuid, artifacts: Artifacts) -> Result<(), RepoError> {
        let patch = StatusPatch {
            artifacts: Some(artifacts),
            clear_failure_reason: true,
            ..Default::default()
        };
        self.repo
            .compare_and_set_status(order_id, OrderStatus::Processing, OrderStatus::Ready, patch)
            .await?;
        Ok(())
    }

    async fn fail(&self, order_id: Uuid, reason: &str) {
        let result = self
            .repo
            .compare_and_set_status(
                order_id,
                OrderStatus::Processing,
                OrderStatus::Failed,
                StatusPatch::failure(reason),
            )
            .await;
        if let Err(e) = result {
            // The claim was exclusive, so this should not happen; the
            // order is left for manual inspection.
            tracing::error!(%order_id, error = %e, "could not record failure");
        }
    }

    /// Best-effort delivery email. Never affects order state.
    async fn notify(&self, order: &Order, artifacts: &Artifacts) {
        let Some(email) = order.customer_email.as_deref() else {
            return;
        };
        if let Err(e) = self
            .notifier
            .send(email, &artifacts.bundle_url, &order.query)
            .await
        {
            tracing::warn!(order_id = %order.id, error = %e, "delivery email failed");
        }
    }
}
