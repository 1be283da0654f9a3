//! Session deadline policy.
//!
//! Expiry only gates settlement-direction transitions (confirming, completed)
//! on sessions that are still in flight. Marking a session failed, touching
//! non-status fields, or retrying a transition on an already-settled session
//! is never blocked by a past deadline.

use crate::payments::types::PaymentStatus;
use chrono::{DateTime, Utc};

/// What the caller of the expiry check must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryDecision {
    /// Deadline not relevant to this request; continue with the update.
    Proceed,
    /// Deadline has passed and the request targeted a settlement status.
    /// The session must be flipped to failed in the same transaction and the
    /// caller's request rejected as expired.
    AutoFail,
}

pub fn check_expiry(
    current: PaymentStatus,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    requested_status: Option<PaymentStatus>,
) -> ExpiryDecision {
    // Terminal sessions are already settled; auto-failing one would move it
    // along an edge the transition table does not have.
    if current.is_terminal() {
        return ExpiryDecision::Proceed;
    }
    let settlement_target = matches!(
        requested_status,
        Some(PaymentStatus::Confirming) | Some(PaymentStatus::Completed)
    );
    if settlement_target && now > expires_at {
        ExpiryDecision::AutoFail
    } else {
        ExpiryDecision::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_not_expired_proceeds() {
        let now = Utc::now();
        let expires = now + Duration::minutes(30);
        assert_eq!(
            check_expiry(PaymentStatus::Pending, expires, now, Some(PaymentStatus::Confirming)),
            ExpiryDecision::Proceed
        );
    }

    #[test]
    fn test_expired_settlement_targets_auto_fail() {
        let now = Utc::now();
        let expires = now - Duration::seconds(1);
        assert_eq!(
            check_expiry(PaymentStatus::Pending, expires, now, Some(PaymentStatus::Confirming)),
            ExpiryDecision::AutoFail
        );
        assert_eq!(
            check_expiry(PaymentStatus::Confirming, expires, now, Some(PaymentStatus::Completed)),
            ExpiryDecision::AutoFail
        );
    }

    #[test]
    fn test_failed_never_blocked() {
        let now = Utc::now();
        let expires = now - Duration::hours(1);
        assert_eq!(
            check_expiry(PaymentStatus::Pending, expires, now, Some(PaymentStatus::Failed)),
            ExpiryDecision::Proceed
        );
    }

    #[test]
    fn test_non_status_updates_unaffected() {
        let now = Utc::now();
        let expires = now - Duration::hours(1);
        assert_eq!(
            check_expiry(PaymentStatus::Pending, expires, now, None),
            ExpiryDecision::Proceed
        );
    }

    #[test]
    fn test_settled_sessions_never_auto_fail() {
        // A late no-op retry on a completed session must not flip it.
        let now = Utc::now();
        let expires = now - Duration::hours(1);
        assert_eq!(
            check_expiry(PaymentStatus::Completed, expires, now, Some(PaymentStatus::Completed)),
            ExpiryDecision::Proceed
        );
        assert_eq!(
            check_expiry(PaymentStatus::Refunded, expires, now, Some(PaymentStatus::Confirming)),
            ExpiryDecision::Proceed
        );
    }

    #[test]
    fn test_exact_deadline_not_expired() {
        let now = Utc::now();
        assert_eq!(
            check_expiry(PaymentStatus::Pending, now, now, Some(PaymentStatus::Confirming)),
            ExpiryDecision::Proceed
        );
    }
}
