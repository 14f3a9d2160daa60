use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use dossier_core::repository::{OrderRepository, StatusPatch};
use dossier_core::OrderStatus;
use dossier_order::{FulfillmentPipeline, FulfillmentQueue};

/// Spawns the fulfillment worker and returns the queue handle for the
/// service. Each order runs in its own task, so independent orders
/// proceed in parallel; per-order exclusivity comes from the pipeline's
/// claim, not from this loop.
pub fn spawn_fulfillment_worker(
    pipeline: Arc<FulfillmentPipeline>,
    repo: Arc<dyn OrderRepository>,
) -> FulfillmentQueue {
    let (tx, mut rx) = mpsc::unbounded_channel::<Uuid>();

    tokio::spawn(async move {
        info!("Fulfillment worker started");
        while let Some(order_id) = rx.recv().await {
            let pipeline = pipeline.clone();
            let repo = repo.clone();
            tokio::spawn(async move {
                // Extra spawn so a panic inside the pipeline surfaces as
                // a JoinError here instead of killing the supervisor.
                let run = tokio::spawn({
                    let pipeline = pipeline.clone();
                    async move { pipeline.run(order_id).await }
                });
                match run.await {
                    Ok(outcome) => {
                        tracing::debug!(%order_id, ?outcome, "fulfillment run finished");
                    }
                    Err(e) => {
                        tracing::error!(%order_id, error = %e, "fulfillment task aborted");
                        let _ = repo
                            .compare_and_set_status(
                                order_id,
                                OrderStatus::Processing,
                                OrderStatus::Failed,
                                StatusPatch::failure("fulfillment task aborted"),
                            )
                            .await;
                    }
                }
            });
        }
        info!("Fulfillment worker stopped");
    });

    tx
}
