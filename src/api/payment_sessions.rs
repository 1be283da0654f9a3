//! Payment session endpoints.

use crate::api::auth::MerchantId;
use crate::error::{AppError, AppResult};
use crate::payments::types::{CreatePaymentSessionRequest, PaymentSessionPatch};
use crate::services::payment_session::PaymentSessionService;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

const DEFAULT_LIST_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct PaymentSessionsState {
    pub service: Arc<PaymentSessionService>,
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub limit: Option<i64>,
}

fn idempotency_key(headers: &HeaderMap) -> AppResult<Option<String>> {
    match headers.get(IDEMPOTENCY_KEY_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|key| Some(key.to_string()))
            .map_err(|_| AppError::Validation {
                message: "idempotency key must be valid ASCII".to_string(),
                field: Some(IDEMPOTENCY_KEY_HEADER.to_string()),
            }),
    }
}

/// POST /api/payment-sessions
///
/// 201 for a new session, 200 for an idempotent replay of a prior create.
pub async fn create_payment_session(
    State(state): State<PaymentSessionsState>,
    merchant: MerchantId,
    headers: HeaderMap,
    Json(body): Json<CreatePaymentSessionRequest>,
) -> Result<Response, AppError> {
    let key = idempotency_key(&headers)?;
    let outcome = state
        .service
        .create_session(merchant.0, key.as_deref(), body)
        .await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.session)).into_response())
}

/// GET /api/payment-sessions
pub async fn list_payment_sessions(
    State(state): State<PaymentSessionsState>,
    merchant: MerchantId,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Response, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 200);
    let sessions = state.service.list_sessions(merchant.0, limit).await?;
    Ok(Json(sessions).into_response())
}

/// GET /api/payment-sessions/{id}
pub async fn get_payment_session(
    State(state): State<PaymentSessionsState>,
    merchant: MerchantId,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let session = state.service.get_session(merchant.0, id).await?;
    Ok(Json(session).into_response())
}

/// PATCH /api/payment-sessions/{id}
pub async fn update_payment_session(
    State(state): State<PaymentSessionsState>,
    merchant: MerchantId,
    Path(id): Path<Uuid>,
    Json(patch): Json<PaymentSessionPatch>,
) -> Result<Response, AppError> {
    let session = state.service.update_session(merchant.0, id, patch).await?;
    Ok(Json(session).into_response())
}
