//! Payment session persistence and the per-row concurrency boundary.
//!
//! Every mutation of a session happens inside a transaction that first takes
//! an exclusive lock on that one row (`SELECT ... FOR UPDATE` with a bounded
//! `lock_timeout`). Concurrent mutators of the same session serialize on the
//! lock; sessions never block each other.

use crate::database::error::DatabaseError;
use crate::payments::types::{PaymentSessionPatch, PaymentStatus};
use serde::Serialize;
use sqlx::{types::BigDecimal, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Payment session entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentSession {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub network: String,
    pub token: String,
    pub merchant_address: String,
    pub customer_address: Option<String>,
    pub tx_hash: Option<String>,
    pub block_number: Option<i64>,
    pub confirmations: Option<i32>,
    pub status: PaymentStatus,
    pub description: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub idempotency_key: Option<String>,
    #[serde(skip_serializing)]
    pub request_fingerprint: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Parameters for inserting a new session. Immutable fields are fixed here
/// and are never part of any UPDATE statement.
#[derive(Debug, Clone)]
pub struct NewPaymentSession {
    pub merchant_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub network: String,
    pub token: String,
    pub merchant_address: String,
    pub description: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub idempotency_key: Option<String>,
    pub request_fingerprint: Option<String>,
}

const SESSION_COLUMNS: &str = "id, merchant_id, amount, currency, network, token, \
     merchant_address, customer_address, tx_hash, block_number, confirmations, status, \
     description, success_url, cancel_url, expires_at, idempotency_key, request_fingerprint, \
     created_at, updated_at, completed_at";

/// How long a mutator waits for the session row lock before failing with a
/// retryable error instead of hanging.
const ROW_LOCK_TIMEOUT: &str = "5s";

/// Repository for payment sessions
pub struct PaymentSessionRepository {
    pool: PgPool,
}

impl PaymentSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a new pending session. A unique-violation on the idempotency
    /// index is surfaced as such so the caller can replay-compare.
    pub async fn insert(&self, new: &NewPaymentSession) -> Result<PaymentSession, DatabaseError> {
        sqlx::query_as::<_, PaymentSession>(&format!(
            "INSERT INTO payment_sessions \
             (merchant_id, amount, currency, network, token, merchant_address, description, \
              success_url, cancel_url, expires_at, idempotency_key, request_fingerprint, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'pending') \
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(new.merchant_id)
        .bind(&new.amount)
        .bind(&new.currency)
        .bind(&new.network)
        .bind(&new.token)
        .bind(&new.merchant_address)
        .bind(&new.description)
        .bind(&new.success_url)
        .bind(&new.cancel_url)
        .bind(new.expires_at)
        .bind(&new.idempotency_key)
        .bind(&new.request_fingerprint)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Find a session by id, scoped to its owner.
    pub async fn find_by_id(
        &self,
        merchant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<PaymentSession>, DatabaseError> {
        sqlx::query_as::<_, PaymentSession>(&format!(
            "SELECT {} FROM payment_sessions WHERE id = $1 AND merchant_id = $2",
            SESSION_COLUMNS
        ))
        .bind(id)
        .bind(merchant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Find the session previously created under (merchant, idempotency key).
    pub async fn find_by_idempotency_key(
        &self,
        merchant_id: Uuid,
        key: &str,
    ) -> Result<Option<PaymentSession>, DatabaseError> {
        sqlx::query_as::<_, PaymentSession>(&format!(
            "SELECT {} FROM payment_sessions WHERE merchant_id = $1 AND idempotency_key = $2",
            SESSION_COLUMNS
        ))
        .bind(merchant_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// List a merchant's sessions, newest first.
    pub async fn list_by_merchant(
        &self,
        merchant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PaymentSession>, DatabaseError> {
        sqlx::query_as::<_, PaymentSession>(&format!(
            "SELECT {} FROM payment_sessions \
             WHERE merchant_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2",
            SESSION_COLUMNS
        ))
        .bind(merchant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Open a transaction and take the exclusive lock on one session row.
    ///
    /// Returns the transaction together with the row as committed by the last
    /// writer. `None` covers both "does not exist" and "not owned"; the
    /// caller must not distinguish them. The lock wait is bounded; on timeout
    /// the underlying error carries SQLSTATE 55P03 and maps to a retryable
    /// failure.
    pub async fn begin_locked(
        &self,
        merchant_id: Uuid,
        id: Uuid,
    ) -> Result<(Transaction<'static, Postgres>, Option<PaymentSession>), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        sqlx::query(&format!("SET LOCAL lock_timeout = '{}'", ROW_LOCK_TIMEOUT))
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let session = sqlx::query_as::<_, PaymentSession>(&format!(
            "SELECT {} FROM payment_sessions WHERE id = $1 AND merchant_id = $2 FOR UPDATE",
            SESSION_COLUMNS
        ))
        .bind(id)
        .bind(merchant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok((tx, session))
    }

    /// Apply the whitelisted mutable fields inside the caller's transaction.
    ///
    /// `status` is the status already approved by the state machine (None
    /// keeps the current value). `completed_at` is stamped exactly once, when
    /// the session first enters completed.
    pub async fn apply_update(
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
        patch: &PaymentSessionPatch,
        status: Option<PaymentStatus>,
    ) -> Result<PaymentSession, DatabaseError> {
        let mark_completed = status == Some(PaymentStatus::Completed);
        sqlx::query_as::<_, PaymentSession>(&format!(
            "UPDATE payment_sessions SET \
                 customer_address = COALESCE($2, customer_address), \
                 tx_hash = COALESCE($3, tx_hash), \
                 block_number = COALESCE($4, block_number), \
                 confirmations = COALESCE($5, confirmations), \
                 status = COALESCE($6, status), \
                 completed_at = CASE WHEN $7 AND completed_at IS NULL THEN NOW() \
                                     ELSE completed_at END, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(id)
        .bind(&patch.customer_address)
        .bind(&patch.tx_hash)
        .bind(patch.block_number)
        .bind(patch.confirmations)
        .bind(status)
        .bind(mark_completed)
        .fetch_one(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Flip a session to failed inside the caller's transaction. Used by the
    /// expiry policy's auto-fail path.
    pub async fn mark_failed(
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
    ) -> Result<PaymentSession, DatabaseError> {
        sqlx::query_as::<_, PaymentSession>(&format!(
            "UPDATE payment_sessions SET status = 'failed', updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
