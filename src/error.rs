//! Unified error handling for the payment gateway
//!
//! This module provides a single error type with HTTP status mapping,
//! user-friendly messages, and stable machine-readable error codes for
//! client handling. Every rejected mutation leaves storage untouched, with
//! the one intentional exception of the expiry-driven auto-fail.

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::payments::types::PaymentStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes for programmatic client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Caller-recoverable errors (4xx)
    #[serde(rename = "validation-error")]
    ValidationError,
    #[serde(rename = "not-found")]
    NotFound,
    #[serde(rename = "idempotency-key-conflict")]
    IdempotencyKeyConflict,
    #[serde(rename = "invalid-status-transition")]
    InvalidStatusTransition,
    #[serde(rename = "blockchain-fields-require-status-transition")]
    BlockchainFieldsRequireStatusTransition,
    #[serde(rename = "session-expired")]
    SessionExpired,
    #[serde(rename = "payment-not-completed")]
    PaymentNotCompleted,
    #[serde(rename = "refund-exceeds-remaining")]
    RefundExceedsRemaining,
    #[serde(rename = "unauthorized")]
    Unauthorized,

    // Infrastructure errors (5xx)
    #[serde(rename = "lock-timeout")]
    LockTimeout,
    #[serde(rename = "database-error")]
    DatabaseError,
    #[serde(rename = "internal-error")]
    InternalError,
}

pub type AppResult<T> = Result<T, AppError>;

/// Unified application error type
#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Missing and not-owned resources are deliberately the same error, so
    /// existence is never leaked to non-owners.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("Idempotency key '{key}' was already used with different parameters")]
    IdempotencyConflict { key: String },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Blockchain evidence fields require an accompanying status transition")]
    BlockchainFieldsWithoutTransition,

    #[error("Payment session has expired")]
    SessionExpired,

    #[error("Refunds require a completed payment; session status is {status}")]
    PaymentNotCompleted { status: PaymentStatus },

    #[error("Refund of {requested} exceeds remaining refundable balance of {remaining}")]
    RefundExceedsRemaining {
        requested: String,
        remaining: String,
    },

    #[error("Missing or invalid caller identity")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn not_found(entity: &'static str) -> Self {
        AppError::NotFound { entity }
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::IdempotencyConflict { .. } => 409,
            AppError::InvalidTransition { .. } => 400,
            AppError::BlockchainFieldsWithoutTransition => 400,
            AppError::SessionExpired => 400,
            AppError::PaymentNotCompleted { .. } => 400,
            AppError::RefundExceedsRemaining { .. } => 400,
            AppError::Unauthorized => 401,
            AppError::Database(err) => match err.kind() {
                DatabaseErrorKind::LockTimeout => 503,
                _ => 500,
            },
            AppError::Internal { .. } => 500,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::IdempotencyConflict { .. } => ErrorCode::IdempotencyKeyConflict,
            AppError::InvalidTransition { .. } => ErrorCode::InvalidStatusTransition,
            AppError::BlockchainFieldsWithoutTransition => {
                ErrorCode::BlockchainFieldsRequireStatusTransition
            }
            AppError::SessionExpired => ErrorCode::SessionExpired,
            AppError::PaymentNotCompleted { .. } => ErrorCode::PaymentNotCompleted,
            AppError::RefundExceedsRemaining { .. } => ErrorCode::RefundExceedsRemaining,
            AppError::Unauthorized => ErrorCode::Unauthorized,
            AppError::Database(err) => match err.kind() {
                DatabaseErrorKind::LockTimeout => ErrorCode::LockTimeout,
                _ => ErrorCode::DatabaseError,
            },
            AppError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Get user-friendly error message. Infrastructure details are never
    /// leaked to clients.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(err) if matches!(err.kind(), DatabaseErrorKind::LockTimeout) => {
                "The resource is busy. Please retry the request".to_string()
            }
            AppError::Database(_) | AppError::Internal { .. } => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(err) => err.is_retryable(),
            AppError::Internal { .. } => false,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_error() {
        let error = AppError::InvalidTransition {
            from: PaymentStatus::Pending,
            to: PaymentStatus::Completed,
        };

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::InvalidStatusTransition);
        assert!(error.user_message().contains("pending"));
        assert!(error.user_message().contains("completed"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_idempotency_conflict_error() {
        let error = AppError::IdempotencyConflict {
            key: "order-42".to_string(),
        };

        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), ErrorCode::IdempotencyKeyConflict);
        assert!(error.user_message().contains("order-42"));
    }

    #[test]
    fn test_not_found_hides_ownership() {
        let error = AppError::not_found("payment session");
        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_lock_timeout_is_retryable_503() {
        let error = AppError::Database(DatabaseError::new(DatabaseErrorKind::LockTimeout));
        assert_eq!(error.status_code(), 503);
        assert_eq!(error.error_code(), ErrorCode::LockTimeout);
        assert!(error.is_retryable());
    }

    #[test]
    fn test_error_codes_serialize_as_stable_strings() {
        let code = serde_json::to_string(&ErrorCode::InvalidStatusTransition).unwrap();
        assert_eq!(code, "\"invalid-status-transition\"");
        let code =
            serde_json::to_string(&ErrorCode::BlockchainFieldsRequireStatusTransition).unwrap();
        assert_eq!(code, "\"blockchain-fields-require-status-transition\"");
        let code = serde_json::to_string(&ErrorCode::SessionExpired).unwrap();
        assert_eq!(code, "\"session-expired\"");
        let code = serde_json::to_string(&ErrorCode::RefundExceedsRemaining).unwrap();
        assert_eq!(code, "\"refund-exceeds-remaining\"");
    }
}
