//! Refund ledger persistence.
//!
//! Inserting a refund and summing the committed refund total both happen
//! inside the transaction that holds the owning session's row lock, so the
//! sum-of-refunds invariant cannot be violated by racing requests.

use crate::database::error::DatabaseError;
use crate::payments::types::RefundStatus;
use serde::Serialize;
use sqlx::{types::BigDecimal, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Refund entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Refund {
    pub id: Uuid,
    pub payment_session_id: Uuid,
    pub merchant_id: Uuid,
    pub amount: BigDecimal,
    pub status: RefundStatus,
    pub reason: Option<String>,
    pub tx_hash: Option<String>,
    pub block_number: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

const REFUND_COLUMNS: &str = "id, payment_session_id, merchant_id, amount, status, reason, \
     tx_hash, block_number, created_at, completed_at";

/// Repository for refunds
pub struct RefundRepository {
    pool: PgPool,
}

impl RefundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Sum of refund amounts already issued against a session, excluding
    /// failed refunds. Must run inside the transaction holding the session
    /// row lock.
    pub async fn sum_active_refunds(
        tx: &mut Transaction<'static, Postgres>,
        payment_session_id: Uuid,
    ) -> Result<BigDecimal, DatabaseError> {
        sqlx::query_scalar::<_, BigDecimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM refunds \
             WHERE payment_session_id = $1 AND status != 'failed'",
        )
        .bind(payment_session_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Insert a pending refund inside the caller's transaction.
    pub async fn insert(
        tx: &mut Transaction<'static, Postgres>,
        payment_session_id: Uuid,
        merchant_id: Uuid,
        amount: &BigDecimal,
        reason: Option<&str>,
    ) -> Result<Refund, DatabaseError> {
        sqlx::query_as::<_, Refund>(&format!(
            "INSERT INTO refunds (payment_session_id, merchant_id, amount, reason, status) \
             VALUES ($1, $2, $3, $4, 'pending') \
             RETURNING {}",
            REFUND_COLUMNS
        ))
        .bind(payment_session_id)
        .bind(merchant_id)
        .bind(amount)
        .bind(reason)
        .fetch_one(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Find a refund by id, scoped to its owner.
    pub async fn find_by_id(
        &self,
        merchant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Refund>, DatabaseError> {
        sqlx::query_as::<_, Refund>(&format!(
            "SELECT {} FROM refunds WHERE id = $1 AND merchant_id = $2",
            REFUND_COLUMNS
        ))
        .bind(id)
        .bind(merchant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// List a merchant's refunds, optionally filtered by session and status.
    pub async fn list(
        &self,
        merchant_id: Uuid,
        payment_session_id: Option<Uuid>,
        status: Option<RefundStatus>,
        limit: i64,
    ) -> Result<Vec<Refund>, DatabaseError> {
        sqlx::query_as::<_, Refund>(&format!(
            "SELECT {} FROM refunds \
             WHERE merchant_id = $1 \
               AND ($2::uuid IS NULL OR payment_session_id = $2) \
               AND ($3::varchar IS NULL OR status = $3) \
             ORDER BY created_at DESC \
             LIMIT $4",
            REFUND_COLUMNS
        ))
        .bind(merchant_id)
        .bind(payment_session_id)
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
