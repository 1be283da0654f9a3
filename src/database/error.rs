//! Database error classification.
//!
//! sqlx errors are folded into a small set of kinds the rest of the service
//! can act on: unique violations drive the idempotent-create race, lock
//! timeouts surface as retryable 503s, everything else is a generic storage
//! failure.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// A row the query expected was not there.
    NotFound { entity: String, id: String },
    /// Unique constraint violation (e.g. the (merchant, idempotency key) index).
    UniqueViolation { constraint: String },
    /// Bounded row-lock wait expired (SQLSTATE 55P03).
    LockTimeout,
    /// Connection pool exhausted or connection lost.
    Connection { message: String },
    Unknown { message: String },
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DatabaseError {
    kind: DatabaseErrorKind,
    message: String,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        let message = match &kind {
            DatabaseErrorKind::NotFound { entity, id } => {
                format!("{} '{}' not found", entity, id)
            }
            DatabaseErrorKind::UniqueViolation { constraint } => {
                format!("unique constraint violated: {}", constraint)
            }
            DatabaseErrorKind::LockTimeout => "timed out waiting for row lock".to_string(),
            DatabaseErrorKind::Connection { message } => message.clone(),
            DatabaseErrorKind::Unknown { message } => message.clone(),
        };
        Self { kind, message }
    }

    pub fn kind(&self) -> &DatabaseErrorKind {
        &self.kind
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::UniqueViolation { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::LockTimeout | DatabaseErrorKind::Connection { .. }
        )
    }

    /// Classify a raw sqlx error.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::new(DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: String::new(),
            }),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::new(DatabaseErrorKind::Connection {
                    message: err.to_string(),
                })
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
                match code.as_str() {
                    "23505" => Self::new(DatabaseErrorKind::UniqueViolation {
                        constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                    }),
                    "55P03" => Self::new(DatabaseErrorKind::LockTimeout),
                    _ => Self::new(DatabaseErrorKind::Unknown {
                        message: db_err.to_string(),
                    }),
                }
            }
            _ => Self::new(DatabaseErrorKind::Unknown {
                message: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_timeout_is_retryable() {
        let err = DatabaseError::new(DatabaseErrorKind::LockTimeout);
        assert!(err.is_retryable());
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn test_unique_violation_classification() {
        let err = DatabaseError::new(DatabaseErrorKind::UniqueViolation {
            constraint: "idx_payment_sessions_idempotency".to_string(),
        });
        assert!(err.is_unique_violation());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("idx_payment_sessions_idempotency"));
    }
}
