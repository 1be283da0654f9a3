//! Chain-evidence field guard.
//!
//! Transaction hash, block number and confirmation count are settlement
//! evidence supplied by the verifier alongside a settlement-direction status
//! transition (into confirming, completed or refunded). A patch that carries
//! any of them with no such transition is rejected, so evidence can never be
//! planted on a session through a bare field update, and a session that never
//! left pending can never hold a transaction hash.

use crate::error::AppError;
use crate::payments::state_machine;
use crate::payments::types::{PaymentSessionPatch, PaymentStatus};

fn is_settlement_target(status: PaymentStatus) -> bool {
    matches!(
        status,
        PaymentStatus::Confirming | PaymentStatus::Completed | PaymentStatus::Refunded
    )
}

pub fn check_blockchain_fields(
    current: PaymentStatus,
    patch: &PaymentSessionPatch,
) -> Result<(), AppError> {
    if !patch.has_blockchain_fields() {
        return Ok(());
    }
    match patch.status {
        Some(target)
            if is_settlement_target(target)
                && state_machine::is_transition_away(current, target) =>
        {
            Ok(())
        }
        _ => Err(AppError::BlockchainFieldsWithoutTransition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx_hash() -> String {
        format!("0x{}", "ab".repeat(32))
    }

    #[test]
    fn test_bare_tx_hash_rejected() {
        let patch = PaymentSessionPatch {
            tx_hash: Some(tx_hash()),
            ..Default::default()
        };
        let err = check_blockchain_fields(PaymentStatus::Pending, &patch).unwrap_err();
        assert!(matches!(err, AppError::BlockchainFieldsWithoutTransition));
    }

    #[test]
    fn test_evidence_with_approved_transition_allowed() {
        let patch = PaymentSessionPatch {
            tx_hash: Some(tx_hash()),
            status: Some(PaymentStatus::Confirming),
            ..Default::default()
        };
        assert!(check_blockchain_fields(PaymentStatus::Pending, &patch).is_ok());
    }

    #[test]
    fn test_evidence_with_noop_status_rejected() {
        // Re-sending the current status is a no-op, not a transition away.
        let patch = PaymentSessionPatch {
            block_number: Some(123),
            status: Some(PaymentStatus::Pending),
            ..Default::default()
        };
        assert!(check_blockchain_fields(PaymentStatus::Pending, &patch).is_err());
    }

    #[test]
    fn test_evidence_with_invalid_transition_rejected() {
        let patch = PaymentSessionPatch {
            confirmations: Some(3),
            status: Some(PaymentStatus::Completed),
            ..Default::default()
        };
        assert!(check_blockchain_fields(PaymentStatus::Pending, &patch).is_err());
    }

    #[test]
    fn test_evidence_with_failure_transition_rejected() {
        // Failing a session is allowed; smuggling evidence in with the
        // failure is not. A session that never confirmed holds no hash.
        let patch = PaymentSessionPatch {
            tx_hash: Some(tx_hash()),
            status: Some(PaymentStatus::Failed),
            ..Default::default()
        };
        assert!(check_blockchain_fields(PaymentStatus::Pending, &patch).is_err());
        assert!(check_blockchain_fields(PaymentStatus::Confirming, &patch).is_err());
    }

    #[test]
    fn test_evidence_with_refund_transition_allowed() {
        let patch = PaymentSessionPatch {
            tx_hash: Some(tx_hash()),
            status: Some(PaymentStatus::Refunded),
            ..Default::default()
        };
        assert!(check_blockchain_fields(PaymentStatus::Completed, &patch).is_ok());
    }

    #[test]
    fn test_customer_address_not_guarded() {
        let patch = PaymentSessionPatch {
            customer_address: Some("0x742d35Cc6634C0532925a3b844Bc454e4438f44e".to_string()),
            ..Default::default()
        };
        assert!(check_blockchain_fields(PaymentStatus::Pending, &patch).is_ok());
    }
}
