pub mod auth;
pub mod payment_sessions;
pub mod refunds;

use crate::config::PaymentConfig;
use crate::database::payment_session_repository::PaymentSessionRepository;
use crate::database::refund_repository::RefundRepository;
use crate::health::{HealthChecker, HealthStatus};
use crate::services::events::{EventPublisher, LogEventPublisher};
use crate::services::payment_session::PaymentSessionService;
use crate::services::refund::RefundService;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    pub checker: HealthChecker,
}

async fn root() -> &'static str {
    "Stablepay payment gateway API"
}

async fn health(
    State(state): State<HealthState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let status = state.checker.check_health().await;
    if status.is_healthy() {
        Ok(Json(status))
    } else {
        error!("Health check failed - service unhealthy");
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    }
}

/// Readiness probe - checks dependencies are reachable
async fn readiness(
    state: State<HealthState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    health(state).await
}

/// Liveness probe - checks the process is responsive
async fn liveness() -> &'static str {
    "OK"
}

/// Assemble the application router over a database pool.
///
/// Integration tests drive this router in-process; `main` wraps it with the
/// request-id and logging layers before serving.
pub fn build_router(pool: PgPool, payment: &PaymentConfig) -> Router {
    build_router_with_events(pool, payment, Arc::new(LogEventPublisher::new()))
}

pub fn build_router_with_events(
    pool: PgPool,
    payment: &PaymentConfig,
    events: Arc<dyn EventPublisher>,
) -> Router {
    let session_repo = Arc::new(PaymentSessionRepository::new(pool.clone()));
    let refund_repo = Arc::new(RefundRepository::new(pool.clone()));

    let session_service = Arc::new(PaymentSessionService::new(
        session_repo.clone(),
        events.clone(),
        payment.session_ttl_secs,
    ));
    let refund_service = Arc::new(RefundService::new(session_repo, refund_repo, events));

    let sessions_state = payment_sessions::PaymentSessionsState {
        service: session_service,
    };
    let refunds_state = refunds::RefundsState {
        service: refund_service,
    };
    let health_state = HealthState {
        checker: HealthChecker::new(pool),
    };

    info!("Application routes configured");

    Router::new()
        .route("/", get(root))
        .merge(
            Router::new()
                .route("/health", get(health))
                .route("/health/ready", get(readiness))
                .route("/health/live", get(liveness))
                .with_state(health_state),
        )
        .merge(
            Router::new()
                .route(
                    "/api/payment-sessions",
                    post(payment_sessions::create_payment_session)
                        .get(payment_sessions::list_payment_sessions),
                )
                .route(
                    "/api/payment-sessions/{id}",
                    get(payment_sessions::get_payment_session)
                        .patch(payment_sessions::update_payment_session),
                )
                .with_state(sessions_state),
        )
        .merge(
            Router::new()
                .route(
                    "/api/refunds",
                    post(refunds::create_refund).get(refunds::list_refunds),
                )
                .route("/api/refunds/{id}", get(refunds::get_refund))
                .with_state(refunds_state),
        )
}
