use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use dossier_core::models::DownloadToken;
use dossier_core::repository::{OrderRepository, RepoError, StatusPatch};
use dossier_core::{Artifacts, Order, OrderStatus, Plan};

/// Postgres-backed order repository. The compare-and-set contract maps
/// to a conditional UPDATE; zero affected rows means either an unknown
/// id or a status conflict, disambiguated with a follow-up read.
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_status(&self, id: Uuid) -> Result<Option<OrderStatus>, RepoError> {
        let row = sqlx::query("SELECT status FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            None => Ok(None),
            Some(row) => {
                let status: String = row.try_get("status").map_err(storage)?;
                OrderStatus::parse(&status)
                    .map(Some)
                    .ok_or_else(|| RepoError::Storage(format!("unknown status '{status}'")))
            }
        }
    }
}

fn storage(err: sqlx::Error) -> RepoError {
    RepoError::Storage(err.to_string())
}

fn order_from_row(row: &PgRow) -> Result<Order, RepoError> {
    let status_str: String = row.try_get("status").map_err(storage)?;
    let status = OrderStatus::parse(&status_str)
        .ok_or_else(|| RepoError::Storage(format!("unknown status '{status_str}'")))?;

    let plan_str: String = row.try_get("plan").map_err(storage)?;
    let plan = Plan::parse(&plan_str)
        .ok_or_else(|| RepoError::Storage(format!("unknown plan '{plan_str}'")))?;

    let artifacts: Option<Json<Artifacts>> = row.try_get("artifacts").map_err(storage)?;

    let token_value: Option<String> = row.try_get("token_value").map_err(storage)?;
    let token_expires_at: Option<DateTime<Utc>> =
        row.try_get("token_expires_at").map_err(storage)?;
    let token_used: bool = row.try_get("token_used").map_err(storage)?;
    let download_token = match (token_value, token_expires_at) {
        (Some(value), Some(expires_at)) => Some(DownloadToken {
            value,
            expires_at,
            used: token_used,
        }),
        _ => None,
    };

    Ok(Order {
        id: row.try_get("id").map_err(storage)?,
        owner_id: row.try_get("owner_id").map_err(storage)?,
        plan,
        query: row.try_get("query").map_err(storage)?,
        status,
        amount_due: row.try_get("amount_due").map_err(storage)?,
        currency: row.try_get("currency").map_err(storage)?,
        customer_email: row.try_get("customer_email").map_err(storage)?,
        proof_ref: row.try_get("proof_ref").map_err(storage)?,
        payment_ref: row.try_get("payment_ref").map_err(storage)?,
        failure_reason: row.try_get("failure_reason").map_err(storage)?,
        artifacts: artifacts.map(|j| j.0),
        download_token,
        created_at: row.try_get("created_at").map_err(storage)?,
        updated_at: row.try_get("updated_at").map_err(storage)?,
    })
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: &Order) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, owner_id, plan, query, status, amount_due, currency,
                customer_email, proof_ref, payment_ref, failure_reason,
                artifacts, token_value, token_expires_at, token_used,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(order.id)
        .bind(&order.owner_id)
        .bind(order.plan.as_str())
        .bind(&order.query)
        .bind(order.status.as_str())
        .bind(order.amount_due)
        .bind(&order.currency)
        .bind(&order.customer_email)
        .bind(&order.proof_ref)
        .bind(&order.payment_ref)
        .bind(&order.failure_reason)
        .bind(order.artifacts.clone().map(Json))
        .bind(order.download_token.as_ref().map(|t| t.value.clone()))
        .bind(order.download_token.as_ref().map(|t| t.expires_at))
        .bind(order.download_token.as_ref().map(|t| t.used).unwrap_or(false))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn attach_proof(&self, id: Uuid, proof_ref: &str) -> Result<Order, RepoError> {
        let row = sqlx::query(
            r#"
            UPDATE orders
            SET proof_ref = $2, status = 'proof_submitted', updated_at = NOW()
            WHERE id = $1 AND status = 'pending_payment' AND proof_ref IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(proof_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        match row {
            Some(row) => order_from_row(&row),
            None => match self.current_status(id).await? {
                None => Err(RepoError::NotFound(id)),
                Some(_) => Err(RepoError::InvalidState(
                    "order is not awaiting proof of payment".into(),
                )),
            },
        }
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        new: OrderStatus,
        patch: StatusPatch,
    ) -> Result<Order, RepoError> {
        let row = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3,
                payment_ref = COALESCE($4, payment_ref),
                customer_email = COALESCE($5, customer_email),
                artifacts = COALESCE($6, artifacts),
                failure_reason = CASE WHEN $8 THEN NULL
                                      ELSE COALESCE($7, failure_reason) END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(new.as_str())
        .bind(patch.payment_ref)
        .bind(patch.customer_email)
        .bind(patch.artifacts.map(Json))
        .bind(patch.failure_reason)
        .bind(patch.clear_failure_reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        match row {
            Some(row) => order_from_row(&row),
            None => match self.current_status(id).await? {
                None => Err(RepoError::NotFound(id)),
                Some(found) => Err(RepoError::Conflict { expected, found }),
            },
        }
    }

    async fn mark_token_used(&self, id: Uuid, token_value: &str) -> Result<Order, RepoError> {
        let row = sqlx::query(
            r#"
            UPDATE orders
            SET token_used = TRUE, updated_at = NOW()
            WHERE id = $1 AND token_value = $2 AND token_used = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(token_value)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        match row {
            Some(row) => order_from_row(&row),
            None => match self.current_status(id).await? {
                None => Err(RepoError::NotFound(id)),
                Some(_) => Err(RepoError::InvalidState(
                    "download token already used or mismatched".into(),
                )),
            },
        }
    }

    async fn record_payment_event(&self, session_id: &str) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "INSERT INTO payment_events (session_id) VALUES ($1) ON CONFLICT (session_id) DO NOTHING",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(result.rows_affected() == 1)
    }
}
