//! Refund endpoints.

use crate::api::auth::MerchantId;
use crate::error::AppError;
use crate::payments::types::{CreateRefundRequest, RefundStatus};
use crate::services::refund::RefundService;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_LIST_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct RefundsState {
    pub service: Arc<RefundService>,
}

#[derive(Debug, Deserialize)]
pub struct ListRefundsQuery {
    pub payment_session_id: Option<Uuid>,
    pub status: Option<RefundStatus>,
    pub limit: Option<i64>,
}

/// POST /api/refunds
pub async fn create_refund(
    State(state): State<RefundsState>,
    merchant: MerchantId,
    Json(body): Json<CreateRefundRequest>,
) -> Result<Response, AppError> {
    let refund = state.service.create_refund(merchant.0, body).await?;
    Ok((StatusCode::CREATED, Json(refund)).into_response())
}

/// GET /api/refunds
pub async fn list_refunds(
    State(state): State<RefundsState>,
    merchant: MerchantId,
    Query(query): Query<ListRefundsQuery>,
) -> Result<Response, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 200);
    let refunds = state
        .service
        .list_refunds(merchant.0, query.payment_session_id, query.status, limit)
        .await?;
    Ok(Json(refunds).into_response())
}

/// GET /api/refunds/{id}
pub async fn get_refund(
    State(state): State<RefundsState>,
    merchant: MerchantId,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let refund = state.service.get_refund(merchant.0, id).await?;
    Ok(Json(refund).into_response())
}
