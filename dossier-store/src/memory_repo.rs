use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use dossier_core::repository::{OrderRepository, RepoError, StatusPatch};
use dossier_core::{Order, OrderStatus};

/// Non-durable repository for development and tests. All mutations go
/// through the same compare-and-set discipline as the Postgres
/// implementation; the write lock stands in for the storage
/// transaction.
pub struct MemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
    payment_events: RwLock<HashSet<String>>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            payment_events: RwLock::new(HashSet::new()),
        }
    }
}

impl Default for MemoryOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn create(&self, order: &Order) -> Result<(), RepoError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(RepoError::Storage(format!(
                "duplicate order id {}",
                order.id
            )));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn attach_proof(&self, id: Uuid, proof_ref: &str) -> Result<Order, RepoError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or(RepoError::NotFound(id))?;

        if order.status != OrderStatus::PendingPayment || order.proof_ref.is_some() {
            return Err(RepoError::InvalidState(
                "order is not awaiting proof of payment".into(),
            ));
        }

        order.proof_ref = Some(proof_ref.to_string());
        order.status = OrderStatus::ProofSubmitted;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        new: OrderStatus,
        patch: StatusPatch,
    ) -> Result<Order, RepoError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or(RepoError::NotFound(id))?;

        if order.status != expected {
            return Err(RepoError::Conflict {
                expected,
                found: order.status,
            });
        }

        order.status = new;
        if patch.clear_failure_reason {
            order.failure_reason = None;
        }
        if let Some(payment_ref) = patch.payment_ref {
            order.payment_ref = Some(payment_ref);
        }
        if let Some(email) = patch.customer_email {
            order.customer_email = Some(email);
        }
        if let Some(artifacts) = patch.artifacts {
            order.artifacts = Some(artifacts);
        }
        if let Some(reason) = patch.failure_reason {
            order.failure_reason = Some(reason);
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn mark_token_used(&self, id: Uuid, token_value: &str) -> Result<Order, RepoError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or(RepoError::NotFound(id))?;

        let token = order
            .download_token
            .as_mut()
            .filter(|t| t.value == token_value)
            .ok_or_else(|| RepoError::InvalidState("download token mismatch".into()))?;
        if token.used {
            return Err(RepoError::InvalidState("download token already used".into()));
        }

        token.used = true;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn record_payment_event(&self, session_id: &str) -> Result<bool, RepoError> {
        Ok(self
            .payment_events
            .write()
            .await
            .insert(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::{Artifacts, Plan};

    fn order() -> Order {
        Order::new("u1".to_string(), Plan::Basic, "acme".to_string(), None)
    }

    #[tokio::test]
    async fn test_cas_applies_patch_atomically() {
        let repo = MemoryOrderRepository::new();
        let o = order();
        repo.create(&o).await.unwrap();

        let updated = repo
            .compare_and_set_status(
                o.id,
                OrderStatus::PendingPayment,
                OrderStatus::Paid,
                StatusPatch {
                    payment_ref: Some("ref-1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Paid);
        assert_eq!(updated.payment_ref.as_deref(), Some("ref-1"));
    }

    #[tokio::test]
    async fn test_cas_conflict_leaves_order_untouched() {
        let repo = MemoryOrderRepository::new();
        let o = order();
        repo.create(&o).await.unwrap();

        let err = repo
            .compare_and_set_status(
                o.id,
                OrderStatus::Paid,
                OrderStatus::Processing,
                StatusPatch::failure("should not be recorded"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Conflict {
                expected: OrderStatus::Paid,
                found: OrderStatus::PendingPayment,
            }
        ));

        let stored = repo.get(o.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::PendingPayment);
        assert!(stored.failure_reason.is_none());
    }

    #[tokio::test]
    async fn test_artifacts_set_with_ready_transition() {
        let repo = MemoryOrderRepository::new();
        let o = order();
        repo.create(&o).await.unwrap();
        repo.compare_and_set_status(
            o.id,
            OrderStatus::PendingPayment,
            OrderStatus::Paid,
            StatusPatch::default(),
        )
        .await
        .unwrap();
        repo.compare_and_set_status(
            o.id,
            OrderStatus::Paid,
            OrderStatus::Processing,
            StatusPatch::default(),
        )
        .await
        .unwrap();

        let artifacts = Artifacts {
            document_url: "http://x/1.pdf".into(),
            bundle_url: "http://x/1.zip".into(),
        };
        let updated = repo
            .compare_and_set_status(
                o.id,
                OrderStatus::Processing,
                OrderStatus::Ready,
                StatusPatch {
                    artifacts: Some(artifacts.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.artifacts, Some(artifacts));
    }

    #[tokio::test]
    async fn test_attach_proof_is_set_once() {
        let repo = MemoryOrderRepository::new();
        let o = order();
        repo.create(&o).await.unwrap();

        let updated = repo.attach_proof(o.id, "proofs/a").await.unwrap();
        assert_eq!(updated.status, OrderStatus::ProofSubmitted);

        let err = repo.attach_proof(o.id, "proofs/b").await.unwrap_err();
        assert!(matches!(err, RepoError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_token_used_flips_once() {
        let repo = MemoryOrderRepository::new();
        let o = order();
        let value = o.download_token.as_ref().unwrap().value.clone();
        repo.create(&o).await.unwrap();

        repo.mark_token_used(o.id, &value).await.unwrap();
        let err = repo.mark_token_used(o.id, &value).await.unwrap_err();
        assert!(matches!(err, RepoError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_payment_event_dedupe() {
        let repo = MemoryOrderRepository::new();
        assert!(repo.record_payment_event("cs_1").await.unwrap());
        assert!(!repo.record_payment_event("cs_1").await.unwrap());
        assert!(repo.record_payment_event("cs_2").await.unwrap());
    }
}
