//! Payment session lifecycle service.
//!
//! Composes the repository with the idempotency guard on the create path and
//! with the expiry policy, blockchain field guard and state machine on the
//! update path. All mutation decisions are made against the row as re-read
//! under its exclusive lock.

use crate::database::payment_session_repository::{NewPaymentSession, PaymentSession, PaymentSessionRepository};
use crate::error::{AppError, AppResult};
use crate::payments::blockchain_guard::check_blockchain_fields;
use crate::payments::expiry::{check_expiry, ExpiryDecision};
use crate::payments::idempotency::{request_fingerprint, validate_idempotency_key};
use crate::payments::state_machine::{check_transition, Transition};
use crate::payments::types::{CreatePaymentSessionRequest, PaymentSessionPatch, PaymentStatus};
use crate::services::events::{EventPublisher, EventType, GatewayEvent};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of a create call: the session plus whether this request inserted
/// it (false means an idempotent replay returned the earlier row).
#[derive(Debug)]
pub struct CreateOutcome {
    pub session: PaymentSession,
    pub created: bool,
}

pub struct PaymentSessionService {
    repository: Arc<PaymentSessionRepository>,
    events: Arc<dyn EventPublisher>,
    session_ttl: Duration,
}

impl PaymentSessionService {
    pub fn new(
        repository: Arc<PaymentSessionRepository>,
        events: Arc<dyn EventPublisher>,
        session_ttl_secs: i64,
    ) -> Self {
        Self {
            repository,
            events,
            session_ttl: Duration::seconds(session_ttl_secs),
        }
    }

    /// Create a session, or replay a prior creation under the same
    /// (merchant, idempotency key).
    pub async fn create_session(
        &self,
        merchant_id: Uuid,
        idempotency_key: Option<&str>,
        request: CreatePaymentSessionRequest,
    ) -> AppResult<CreateOutcome> {
        // Key format is checked before any lookup or validation of the body.
        if let Some(key) = idempotency_key {
            validate_idempotency_key(key)?;
        }
        let amount = request.validate()?;

        let Some(key) = idempotency_key else {
            let session = self.insert_session(merchant_id, &request, amount, None, None).await?;
            return Ok(CreateOutcome { session, created: true });
        };

        let fingerprint = request_fingerprint(&request);

        if let Some(existing) = self
            .repository
            .find_by_idempotency_key(merchant_id, key)
            .await?
        {
            return self.replay_compare(existing, key, &fingerprint);
        }

        match self
            .insert_session(
                merchant_id,
                &request,
                amount,
                Some(key.to_string()),
                Some(fingerprint.clone()),
            )
            .await
        {
            Ok(session) => Ok(CreateOutcome { session, created: true }),
            Err(AppError::Database(db_err)) if db_err.is_unique_violation() => {
                // Lost the first-time-create race: exactly one concurrent
                // request inserted; this one becomes a replay-compare.
                warn!(
                    merchant_id = %merchant_id,
                    idempotency_key = key,
                    "Concurrent create with same idempotency key, replaying"
                );
                let existing = self
                    .repository
                    .find_by_idempotency_key(merchant_id, key)
                    .await?
                    .ok_or_else(|| AppError::Internal {
                        message: "idempotency race winner not visible after unique violation"
                            .to_string(),
                    })?;
                self.replay_compare(existing, key, &fingerprint)
            }
            Err(other) => Err(other),
        }
    }

    fn replay_compare(
        &self,
        existing: PaymentSession,
        key: &str,
        fingerprint: &str,
    ) -> AppResult<CreateOutcome> {
        if existing.request_fingerprint.as_deref() == Some(fingerprint) {
            info!(
                payment_session_id = %existing.id,
                idempotency_key = key,
                "Idempotent replay, returning existing session"
            );
            Ok(CreateOutcome {
                session: existing,
                created: false,
            })
        } else {
            Err(AppError::IdempotencyConflict {
                key: key.to_string(),
            })
        }
    }

    async fn insert_session(
        &self,
        merchant_id: Uuid,
        request: &CreatePaymentSessionRequest,
        amount: bigdecimal::BigDecimal,
        idempotency_key: Option<String>,
        request_fingerprint: Option<String>,
    ) -> AppResult<PaymentSession> {
        let new = NewPaymentSession {
            merchant_id,
            amount,
            currency: request.currency.clone(),
            network: request.network.clone(),
            token: request.token.clone(),
            merchant_address: request.merchant_address.clone(),
            description: request.description.clone(),
            success_url: request.success_url.clone(),
            cancel_url: request.cancel_url.clone(),
            expires_at: Utc::now() + self.session_ttl,
            idempotency_key,
            request_fingerprint,
        };
        let session = self.repository.insert(&new).await?;
        info!(
            payment_session_id = %session.id,
            merchant_id = %merchant_id,
            amount = %session.amount,
            token = %session.token,
            network = %session.network,
            "Payment session created"
        );
        Ok(session)
    }

    pub async fn get_session(&self, merchant_id: Uuid, id: Uuid) -> AppResult<PaymentSession> {
        self.repository
            .find_by_id(merchant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("payment session"))
    }

    pub async fn list_sessions(
        &self,
        merchant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<PaymentSession>> {
        Ok(self.repository.list_by_merchant(merchant_id, limit).await?)
    }

    /// Apply a PATCH to one session under its row lock.
    ///
    /// Policy order inside the lock: expiry, blockchain field guard, state
    /// machine. A rejected update rolls back untouched, except the expiry
    /// auto-fail which is committed before the rejection is returned.
    pub async fn update_session(
        &self,
        merchant_id: Uuid,
        id: Uuid,
        patch: PaymentSessionPatch,
    ) -> AppResult<PaymentSession> {
        patch.validate()?;

        let (mut tx, session) = self.repository.begin_locked(merchant_id, id).await?;
        let Some(session) = session else {
            return Err(AppError::not_found("payment session"));
        };

        if check_expiry(session.status, session.expires_at, Utc::now(), patch.status)
            == ExpiryDecision::AutoFail
        {
            PaymentSessionRepository::mark_failed(&mut tx, id).await?;
            tx.commit().await.map_err(crate::database::error::DatabaseError::from_sqlx)?;
            warn!(
                payment_session_id = %id,
                expires_at = %session.expires_at,
                "Session expired, auto-failed instead of {:?}",
                patch.status
            );
            self.events
                .publish(GatewayEvent::new(
                    EventType::PaymentFailed,
                    merchant_id,
                    id,
                    serde_json::json!({ "reason": "expired" }),
                ))
                .await;
            return Err(AppError::SessionExpired);
        }

        check_blockchain_fields(session.status, &patch)?;

        let approved_status = match patch.status {
            Some(target) => match check_transition(session.status, target)? {
                Transition::Apply => Some(target),
                Transition::NoOp => None,
            },
            None => None,
        };

        let updated = PaymentSessionRepository::apply_update(&mut tx, id, &patch, approved_status).await?;
        tx.commit().await.map_err(crate::database::error::DatabaseError::from_sqlx)?;

        if let Some(new_status) = approved_status {
            info!(
                payment_session_id = %id,
                from = %session.status,
                to = %new_status,
                "Payment session status transition"
            );
            if let Some(event_type) = Self::event_for_status(new_status) {
                self.events
                    .publish(GatewayEvent::new(
                        event_type,
                        merchant_id,
                        id,
                        serde_json::json!({
                            "status": new_status,
                            "tx_hash": updated.tx_hash,
                        }),
                    ))
                    .await;
            }
        }

        Ok(updated)
    }

    fn event_for_status(status: PaymentStatus) -> Option<EventType> {
        match status {
            PaymentStatus::Confirming => Some(EventType::PaymentConfirming),
            PaymentStatus::Completed => Some(EventType::PaymentCompleted),
            PaymentStatus::Failed => Some(EventType::PaymentFailed),
            PaymentStatus::Refunded => Some(EventType::PaymentRefunded),
            PaymentStatus::Pending => None,
        }
    }
}
