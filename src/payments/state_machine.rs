//! Payment session status transition table.
//!
//! Pure functions with no I/O. Both the session store and the tests use this
//! module as the single source of truth for which status changes are legal.

use crate::error::AppError;
use crate::payments::types::PaymentStatus;

/// Outcome of asking the state machine about a requested transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A real state change that must be persisted.
    Apply,
    /// `from == to`: an idempotent retry, accepted without error.
    NoOp,
}

/// Allowed (from, to) edges. `from == to` pairs are handled separately as
/// no-ops and do not appear here.
const ALLOWED: &[(PaymentStatus, PaymentStatus)] = &[
    (PaymentStatus::Pending, PaymentStatus::Confirming),
    (PaymentStatus::Pending, PaymentStatus::Failed),
    (PaymentStatus::Confirming, PaymentStatus::Completed),
    (PaymentStatus::Confirming, PaymentStatus::Failed),
    (PaymentStatus::Completed, PaymentStatus::Refunded),
];

/// Decide whether `from -> to` is permitted.
pub fn check_transition(from: PaymentStatus, to: PaymentStatus) -> Result<Transition, AppError> {
    if from == to {
        return Ok(Transition::NoOp);
    }
    if ALLOWED.contains(&(from, to)) {
        Ok(Transition::Apply)
    } else {
        Err(AppError::InvalidTransition { from, to })
    }
}

/// True when the state machine would accept `from -> to` as a transition away
/// from the current status (a no-op retry does not count).
pub fn is_transition_away(from: PaymentStatus, to: PaymentStatus) -> bool {
    matches!(check_transition(from, to), Ok(Transition::Apply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentStatus::*;

    const ALL: [PaymentStatus; 5] = [Pending, Confirming, Completed, Failed, Refunded];

    #[test]
    fn test_allowed_edges() {
        assert_eq!(check_transition(Pending, Confirming).unwrap(), Transition::Apply);
        assert_eq!(check_transition(Pending, Failed).unwrap(), Transition::Apply);
        assert_eq!(check_transition(Confirming, Completed).unwrap(), Transition::Apply);
        assert_eq!(check_transition(Confirming, Failed).unwrap(), Transition::Apply);
        assert_eq!(check_transition(Completed, Refunded).unwrap(), Transition::Apply);
    }

    #[test]
    fn test_same_status_is_noop() {
        for status in ALL {
            assert_eq!(check_transition(status, status).unwrap(), Transition::NoOp);
        }
    }

    #[test]
    fn test_every_other_pair_rejected() {
        let allowed: Vec<(PaymentStatus, PaymentStatus)> = vec![
            (Pending, Confirming),
            (Pending, Failed),
            (Confirming, Completed),
            (Confirming, Failed),
            (Completed, Refunded),
        ];
        for from in ALL {
            for to in ALL {
                if from == to || allowed.contains(&(from, to)) {
                    continue;
                }
                let err = check_transition(from, to).unwrap_err();
                match err {
                    AppError::InvalidTransition { from: f, to: t } => {
                        assert_eq!(f, from);
                        assert_eq!(t, to);
                    }
                    other => panic!("expected InvalidTransition, got {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_transition_error_names_both_states() {
        let err = check_transition(Pending, Completed).unwrap_err();
        let message = err.user_message();
        assert!(message.contains("pending"));
        assert!(message.contains("completed"));
    }

    #[test]
    fn test_is_transition_away() {
        assert!(is_transition_away(Pending, Confirming));
        assert!(!is_transition_away(Pending, Pending));
        assert!(!is_transition_away(Pending, Completed));
    }
}
