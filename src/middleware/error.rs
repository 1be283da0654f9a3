//! Error response formatting
//!
//! Provides standardized error responses with consistent JSON structure,
//! HTTP status codes, error codes, and user-friendly messages.

use crate::error::{AppError, ErrorCode};
use axum::{
    body::Body,
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error bodies are small; anything larger is not our envelope.
const ERROR_BODY_LIMIT: usize = 64 * 1024;

/// Standardized error response structure
///
/// This is returned to clients for all error cases, ensuring consistent
/// error handling across the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Request ID for debugging and support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    /// Whether the client should retry the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    /// Create a new error response from an AppError
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id: None,
            timestamp: Utc::now().to_rfc3339(),
            retryable: Some(error.is_retryable()),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            // Internal detail goes to the log, never to the client.
            error!(status = status.as_u16(), error = %self, "Request failed");
        }
        (status, Json(ErrorResponse::from_app_error(&self))).into_response()
    }
}

/// Copies the request's `x-request-id` into the error envelope, so the id a
/// client reports back matches the server log line for the failure.
///
/// Must sit inside the request-id layer that sets the header. Bodies that are
/// not our envelope (extractor rejections, panics) pass through untouched.
pub async fn attach_request_id(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let response = next.run(request).await;

    let Some(request_id) = request_id else {
        return response;
    };
    if !response.status().is_client_error() && !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, ERROR_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };
    match serde_json::from_slice::<ErrorResponse>(&bytes) {
        Ok(envelope) => {
            let envelope = envelope.with_request_id(request_id);
            let body = serde_json::to_vec(&envelope).unwrap_or_else(|_| bytes.to_vec());
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(body))
        }
        Err(_) => Response::from_parts(parts, Body::from(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let response = ErrorResponse::from_app_error(&AppError::SessionExpired);
        assert_eq!(response.error, ErrorCode::SessionExpired);
        assert_eq!(response.retryable, Some(false));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error"], "session-expired");
        assert!(json["message"].as_str().unwrap().contains("expired"));
    }

    #[tokio::test]
    async fn test_error_body_carries_request_id() {
        use crate::middleware::logging::UuidRequestId;
        use axum::{routing::get, Router};
        use tower_http::request_id::SetRequestIdLayer;

        async fn expired() -> AppError {
            AppError::SessionExpired
        }

        let app = Router::new().route("/", get(expired)).layer(
            tower::ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(attach_request_id)),
        );

        let request = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "session-expired");
        assert!(json["request_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_success_bodies_left_untouched() {
        use crate::middleware::logging::UuidRequestId;
        use axum::{routing::get, Router};
        use tower_http::request_id::SetRequestIdLayer;

        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(
                tower::ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(axum::middleware::from_fn(attach_request_id)),
            );

        let request = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[test]
    fn test_database_errors_stay_generic() {
        use crate::database::error::{DatabaseError, DatabaseErrorKind};
        let response = ErrorResponse::from_app_error(&AppError::Database(DatabaseError::new(
            DatabaseErrorKind::Unknown {
                message: "relation payment_sessions does not exist".to_string(),
            },
        )));
        assert!(!response.message.contains("payment_sessions"));
    }
}
