use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Artifacts, Order, OrderStatus};

/// Fields a status transition may update alongside the status itself.
/// `None` fields are left untouched by the repository.
#[derive(Debug, Default, Clone)]
pub struct StatusPatch {
    pub payment_ref: Option<String>,
    pub customer_email: Option<String>,
    pub artifacts: Option<Artifacts>,
    pub failure_reason: Option<String>,
    /// Clears any recorded failure reason; used by the admin retry path.
    pub clear_failure_reason: bool,
}

impl StatusPatch {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            failure_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("order not found: {0}")]
    NotFound(Uuid),

    #[error("status conflict: expected {expected}, found {found}")]
    Conflict {
        expected: OrderStatus,
        found: OrderStatus,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Durable order storage with atomic conditional update.
///
/// `compare_and_set_status` is the only mutation primitive used by the
/// fulfillment pipeline and the confirmation paths; implementations
/// must apply it in a single storage transaction so concurrent triggers
/// for the same order cannot both win.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: &Order) -> Result<(), RepoError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepoError>;

    /// Records the proof-of-payment reference and moves the order to
    /// ProofSubmitted. Set-once: fails once a proof exists or the order
    /// has moved past PendingPayment.
    async fn attach_proof(&self, id: Uuid, proof_ref: &str) -> Result<Order, RepoError>;

    /// Atomically transitions `expected` → `new`, applying `patch` in
    /// the same update. Returns `Conflict` (patch not applied) when the
    /// current status differs from `expected`.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        new: OrderStatus,
        patch: StatusPatch,
    ) -> Result<Order, RepoError>;

    /// Flips the download token's `used` flag, first caller wins.
    async fn mark_token_used(&self, id: Uuid, token_value: &str) -> Result<Order, RepoError>;

    /// Registers a payment-gateway idempotency key. Returns `false` when
    /// the key was seen before (duplicate delivery).
    async fn record_payment_event(&self, session_id: &str) -> Result<bool, RepoError>;
}
