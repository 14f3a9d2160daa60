use std::sync::Arc;

use chrono::{Duration, Utc};
use dossier_core::payment::PaymentEvent;
use dossier_core::repository::{OrderRepository, RepoError, StatusPatch};
use dossier_core::{Artifacts, CoreError, CoreResult, Order, OrderStatus, Plan};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Handle for scheduling fulfillment runs. Handlers enqueue order ids;
/// the background worker owns pipeline execution.
pub type FulfillmentQueue = mpsc::UnboundedSender<Uuid>;

/// Owner-facing view of an order. Artifacts are only exposed once the
/// order is Ready.
#[derive(Debug, Clone)]
pub struct StatusView {
    pub status: OrderStatus,
    pub artifacts: Option<Artifacts>,
}

/// Transport-agnostic order operations. Validates ownership and
/// arguments, mutates through the repository, and schedules the
/// fulfillment pipeline for paid orders. Never runs the pipeline
/// inline.
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    queue: FulfillmentQueue,
    stale_processing: Duration,
}

impl OrderService {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        queue: FulfillmentQueue,
        stale_processing_seconds: u64,
    ) -> Self {
        Self {
            repo,
            queue,
            stale_processing: Duration::seconds(stale_processing_seconds as i64),
        }
    }

    pub async fn create_order(
        &self,
        owner_id: &str,
        plan: Plan,
        query: &str,
        customer_email: Option<String>,
    ) -> CoreResult<Order> {
        if query.trim().is_empty() {
            return Err(CoreError::InvalidArgument("query must not be empty".into()));
        }

        let order = Order::new(
            owner_id.to_string(),
            plan,
            query.trim().to_string(),
            customer_email,
        );
        self.repo.create(&order).await?;
        tracing::info!(order_id = %order.id, plan = plan.as_str(), "order created");
        Ok(order)
    }

    /// Precondition check for proof submission: the caller must own the
    /// order, which must still be awaiting payment with no proof set.
    /// Runs before the proof blob is uploaded, so a rejected request
    /// never writes storage.
    pub async fn ensure_awaiting_proof(&self, order_id: Uuid, owner_id: &str) -> CoreResult<()> {
        let order = self.load_owned(order_id, owner_id).await?;
        if order.status != OrderStatus::PendingPayment || order.proof_ref.is_some() {
            return Err(CoreError::InvalidState(
                "order is not awaiting proof of payment".into(),
            ));
        }
        Ok(())
    }

    pub async fn attach_proof(
        &self,
        order_id: Uuid,
        owner_id: &str,
        proof_ref: &str,
    ) -> CoreResult<Order> {
        self.ensure_awaiting_proof(order_id, owner_id).await?;
        let updated = self.repo.attach_proof(order_id, proof_ref).await?;
        tracing::info!(%order_id, "payment proof attached");
        Ok(updated)
    }

    /// Converged confirmation path for the admin mark-paid action and
    /// gateway events. Idempotent: `Ok(false)` means the order was
    /// already paid or later and nothing was reprocessed.
    pub async fn confirm_payment(
        &self,
        order_id: Uuid,
        payment_ref: Option<String>,
        customer_email: Option<String>,
    ) -> CoreResult<bool> {
        let order = self.repo.get(order_id).await?.ok_or(CoreError::NotFound)?;

        if order.status.is_paid_or_later() {
            tracing::debug!(%order_id, status = %order.status, "confirm replay ignored");
            return Ok(false);
        }

        let patch = StatusPatch {
            payment_ref,
            customer_email,
            ..Default::default()
        };
        match self
            .repo
            .compare_and_set_status(order_id, order.status, OrderStatus::Paid, patch)
            .await
        {
            Ok(_) => {
                tracing::info!(%order_id, "order marked paid");
                self.enqueue(order_id);
                Ok(true)
            }
            // A concurrent trigger may have confirmed first; that still
            // counts as success for the caller.
            Err(RepoError::Conflict { found, .. }) if found.is_paid_or_later() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Gateway entry point. Confirmation is idempotent on its own;
    /// duplicate deliveries of the same session id replay harmlessly.
    /// The session id is registered only after the confirmation is
    /// durable, so a transient storage failure leaves the event
    /// replayable instead of consuming the key with the order still
    /// unpaid. Events that cannot be correlated to an order are logged
    /// and dropped, since the gateway will retry on anything but
    /// success.
    pub async fn handle_gateway_event(&self, event: &PaymentEvent) -> CoreResult<()> {
        let Ok(order_id) = Uuid::parse_str(&event.correlation_ref) else {
            tracing::warn!(
                correlation_ref = %event.correlation_ref,
                "payment event with unusable correlation ref"
            );
            return Ok(());
        };

        match self
            .confirm_payment(
                order_id,
                Some(event.external_session_id.clone()),
                event.customer_email.clone(),
            )
            .await
        {
            Ok(_) => {
                if !self
                    .repo
                    .record_payment_event(&event.external_session_id)
                    .await?
                {
                    tracing::info!(
                        session_id = %event.external_session_id,
                        "duplicate payment event ignored"
                    );
                }
                Ok(())
            }
            Err(CoreError::NotFound) => {
                tracing::warn!(%order_id, "payment event for unknown order");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_status(&self, order_id: Uuid, owner_id: &str) -> CoreResult<StatusView> {
        let order = self.load_owned(order_id, owner_id).await?;
        let artifacts = if order.status == OrderStatus::Ready {
            order.artifacts
        } else {
            None
        };
        Ok(StatusView {
            status: order.status,
            artifacts,
        })
    }

    /// Owner-checked download. Returns the redirect target for the
    /// bundle; never a partial link before Ready.
    pub async fn get_download(&self, order_id: Uuid, owner_id: &str) -> CoreResult<String> {
        let order = self.load_owned(order_id, owner_id).await?;
        Self::bundle_url(&order)
    }

    /// Capability download path: a valid, unexpired, unused token
    /// authorizes one download without the owner credential.
    pub async fn exchange_download_token(
        &self,
        order_id: Uuid,
        token_value: &str,
    ) -> CoreResult<String> {
        let order = self.repo.get(order_id).await?.ok_or(CoreError::NotFound)?;

        let token = order.download_token.as_ref().ok_or(CoreError::Forbidden)?;
        if !token.authorizes(token_value, Utc::now()) {
            return Err(CoreError::Forbidden);
        }
        let url = Self::bundle_url(&order)?;

        // First successful exchange wins; a lost race means another
        // request already spent the token.
        match self.repo.mark_token_used(order_id, token_value).await {
            Ok(_) => Ok(url),
            Err(RepoError::InvalidState(_)) => Err(CoreError::Forbidden),
            Err(e) => Err(e.into()),
        }
    }

    /// Administrative retry: Failed orders always, Processing orders
    /// only once stale (crash recovery). Resets to Paid and re-enqueues;
    /// never resumes a run mid-pipeline.
    pub async fn retry_fulfillment(&self, order_id: Uuid) -> CoreResult<()> {
        let order = self.repo.get(order_id).await?.ok_or(CoreError::NotFound)?;

        let expected = match order.status {
            OrderStatus::Failed => OrderStatus::Failed,
            OrderStatus::Processing => {
                if Utc::now() - order.updated_at < self.stale_processing {
                    return Err(CoreError::InvalidState(
                        "fulfillment is still running".into(),
                    ));
                }
                OrderStatus::Processing
            }
            other => {
                return Err(CoreError::InvalidState(format!(
                    "cannot retry order in status {other}"
                )));
            }
        };

        let patch = StatusPatch {
            clear_failure_reason: true,
            ..Default::default()
        };
        self.repo
            .compare_and_set_status(order_id, expected, OrderStatus::Paid, patch)
            .await?;
        tracing::info!(%order_id, "order reset for retry");
        self.enqueue(order_id);
        Ok(())
    }

    async fn load_owned(&self, order_id: Uuid, owner_id: &str) -> CoreResult<Order> {
        let order = self.repo.get(order_id).await?.ok_or(CoreError::NotFound)?;
        if order.owner_id != owner_id {
            return Err(CoreError::Forbidden);
        }
        Ok(order)
    }

    fn bundle_url(order: &Order) -> CoreResult<String> {
        if order.status != OrderStatus::Ready {
            return Err(CoreError::Conflict("order is not ready".into()));
        }
        order
            .artifacts
            .as_ref()
            .map(|a| a.bundle_url.clone())
            .ok_or_else(|| CoreError::Internal("ready order without artifacts".into()))
    }

    fn enqueue(&self, order_id: Uuid) {
        // A closed queue means the worker is gone; the order stays Paid
        // and the admin retry path can pick it up later.
        if self.queue.send(order_id).is_err() {
            tracing::error!(%order_id, "fulfillment queue closed, order left paid");
        }
    }
}
