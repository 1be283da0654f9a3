//! Refund issuance against completed payment sessions.
//!
//! The remaining refundable balance is computed while holding the session's
//! row lock, inside the same transaction that inserts the refund. Two racing
//! refund requests for one session serialize on that lock; the loser sees the
//! winner's committed total before deciding.

use crate::database::error::DatabaseError;
use crate::database::payment_session_repository::PaymentSessionRepository;
use crate::database::refund_repository::{Refund, RefundRepository};
use crate::error::{AppError, AppResult};
use crate::payments::types::{CreateRefundRequest, PaymentStatus, RefundStatus};
use crate::services::events::{EventPublisher, EventType, GatewayEvent};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct RefundService {
    sessions: Arc<PaymentSessionRepository>,
    refunds: Arc<RefundRepository>,
    events: Arc<dyn EventPublisher>,
}

impl RefundService {
    pub fn new(
        sessions: Arc<PaymentSessionRepository>,
        refunds: Arc<RefundRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            sessions,
            refunds,
            events,
        }
    }

    pub async fn create_refund(
        &self,
        merchant_id: Uuid,
        request: CreateRefundRequest,
    ) -> AppResult<Refund> {
        let amount = request.validate()?;

        let (mut tx, session) = self
            .sessions
            .begin_locked(merchant_id, request.payment_session_id)
            .await?;
        let Some(session) = session else {
            return Err(AppError::not_found("payment session"));
        };

        if session.status != PaymentStatus::Completed {
            return Err(AppError::PaymentNotCompleted {
                status: session.status,
            });
        }

        let already_refunded =
            RefundRepository::sum_active_refunds(&mut tx, session.id).await?;
        let remaining = &session.amount - &already_refunded;
        if amount > remaining {
            return Err(AppError::RefundExceedsRemaining {
                requested: amount.to_string(),
                remaining: remaining.to_string(),
            });
        }

        let refund = RefundRepository::insert(
            &mut tx,
            session.id,
            merchant_id,
            &amount,
            request.reason.as_deref(),
        )
        .await?;
        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        info!(
            refund_id = %refund.id,
            payment_session_id = %session.id,
            amount = %refund.amount,
            remaining = %(&remaining - &refund.amount),
            "Refund created"
        );
        self.events
            .publish(GatewayEvent::new(
                EventType::RefundCreated,
                merchant_id,
                session.id,
                serde_json::json!({
                    "refund_id": refund.id,
                    "amount": refund.amount.to_string(),
                    "reason": refund.reason,
                }),
            ))
            .await;

        Ok(refund)
    }

    pub async fn get_refund(&self, merchant_id: Uuid, id: Uuid) -> AppResult<Refund> {
        self.refunds
            .find_by_id(merchant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("refund"))
    }

    pub async fn list_refunds(
        &self,
        merchant_id: Uuid,
        payment_session_id: Option<Uuid>,
        status: Option<RefundStatus>,
        limit: i64,
    ) -> AppResult<Vec<Refund>> {
        Ok(self
            .refunds
            .list(merchant_id, payment_session_id, status, limit)
            .await?)
    }
}
