use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Settlement currency for all plans.
pub const CURRENCY: &str = "MXN";

/// How long a freshly issued download token stays valid.
pub const DOWNLOAD_TOKEN_TTL_HOURS: i64 = 4;

/// Purchasable report plan. Determines price and report depth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    Basic,
    Pro,
}

impl Plan {
    pub fn amount_due(&self) -> i32 {
        match self {
            Plan::Basic => 10,
            Plan::Pro => 20,
        }
    }

    pub fn parse(s: &str) -> Option<Plan> {
        match s.to_ascii_uppercase().as_str() {
            "BASIC" => Some(Plan::Basic),
            "PRO" => Some(Plan::Pro),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Basic => "BASIC",
            Plan::Pro => "PRO",
        }
    }
}

/// Order status in the lifecycle.
///
/// PendingPayment → ProofSubmitted → Paid → Processing → {Ready | Failed}.
/// ProofSubmitted is optional; gateway-confirmed orders go straight to
/// Paid. The only permitted backwards edge is the explicit admin retry
/// (Failed → Paid, or stale Processing → Paid).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    ProofSubmitted,
    Paid,
    Processing,
    Ready,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::ProofSubmitted => "proof_submitted",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Ready => "ready",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "pending_payment" => Some(OrderStatus::PendingPayment),
            "proof_submitted" => Some(OrderStatus::ProofSubmitted),
            "paid" => Some(OrderStatus::Paid),
            "processing" => Some(OrderStatus::Processing),
            "ready" => Some(OrderStatus::Ready),
            "failed" => Some(OrderStatus::Failed),
            _ => None,
        }
    }

    /// True once payment has been accepted (Paid or any later state).
    pub fn is_paid_or_later(&self) -> bool {
        !matches!(self, OrderStatus::PendingPayment | OrderStatus::ProofSubmitted)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Ready | OrderStatus::Failed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deliverables produced by the fulfillment pipeline. Set exactly once,
/// when the order transitions to Ready.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifacts {
    pub document_url: String,
    pub bundle_url: String,
}

/// Single-use, time-bounded download capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl DownloadToken {
    pub fn issue(ttl: Duration) -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill(&mut bytes[..]);
        let value = bytes.iter().fold(String::with_capacity(32), |mut s, b| {
            use fmt::Write;
            let _ = write!(s, "{b:02x}");
            s
        });
        Self {
            value,
            expires_at: Utc::now() + ttl,
            used: false,
        }
    }

    /// A token authorizes a download only while unused, unexpired, and
    /// matching the presented value.
    pub fn authorizes(&self, presented: &str, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at && self.value == presented
    }
}

/// The unit of work representing one paid report request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub owner_id: String,
    pub plan: Plan,
    pub query: String,
    pub status: OrderStatus,
    pub amount_due: i32,
    pub currency: String,
    pub customer_email: Option<String>,
    pub proof_ref: Option<String>,
    pub payment_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub artifacts: Option<Artifacts>,
    pub download_token: Option<DownloadToken>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(owner_id: String, plan: Plan, query: String, customer_email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            plan,
            query,
            status: OrderStatus::PendingPayment,
            amount_due: plan.amount_due(),
            currency: CURRENCY.to_string(),
            customer_email,
            proof_ref: None,
            payment_ref: None,
            failure_reason: None,
            artifacts: None,
            download_token: Some(DownloadToken::issue(Duration::hours(
                DOWNLOAD_TOKEN_TTL_HOURS,
            ))),
            created_at: now,
            updated_at: now,
        }
    }
}
