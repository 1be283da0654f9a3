use crate::error::AppError;
use bigdecimal::BigDecimal;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

/// Lifecycle status of a payment session.
///
/// The set is closed: a session can never hold a status outside this enum,
/// and transitions between values are controlled by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Confirming,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Confirming => "confirming",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Terminal statuses accept no further transitions, with the single
    /// exception of completed -> refunded.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Refunded
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "confirming" => Ok(PaymentStatus::Confirming),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(AppError::Validation {
                message: format!("unsupported payment status: {}", value),
                field: Some("status".to_string()),
            }),
        }
    }
}

/// Settlement status of a refund row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Completed,
    Failed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Completed => "completed",
            RefundStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RefundStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(RefundStatus::Pending),
            "completed" => Ok(RefundStatus::Completed),
            "failed" => Ok(RefundStatus::Failed),
            _ => Err(AppError::Validation {
                message: format!("unsupported refund status: {}", value),
                field: Some("status".to_string()),
            }),
        }
    }
}

fn evm_address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid address regex"))
}

fn tx_hash_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("valid tx hash regex"))
}

/// Validate an EVM-style account address (0x + 40 hex chars).
pub fn validate_address(address: &str, field: &str) -> Result<(), AppError> {
    if evm_address_regex().is_match(address) {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: format!("'{}' is not a valid account address", address),
            field: Some(field.to_string()),
        })
    }
}

/// Validate a transaction hash (0x + 64 hex chars).
pub fn validate_tx_hash(hash: &str) -> Result<(), AppError> {
    if tx_hash_regex().is_match(hash) {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: format!("'{}' is not a valid transaction hash", hash),
            field: Some("tx_hash".to_string()),
        })
    }
}

/// Amount bounds accepted at session creation, in the session's currency.
pub const MIN_SESSION_AMOUNT: u32 = 1;
pub const MAX_SESSION_AMOUNT: u32 = 10_000;

/// Parse and bound-check a session amount supplied as a decimal string.
pub fn parse_session_amount(raw: &str) -> Result<BigDecimal, AppError> {
    let amount = BigDecimal::from_str(raw).map_err(|_| AppError::Validation {
        message: format!("invalid decimal amount: {}", raw),
        field: Some("amount".to_string()),
    })?;
    if amount < BigDecimal::from(MIN_SESSION_AMOUNT) || amount > BigDecimal::from(MAX_SESSION_AMOUNT)
    {
        return Err(AppError::Validation {
            message: format!(
                "amount must be between {} and {}",
                MIN_SESSION_AMOUNT, MAX_SESSION_AMOUNT
            ),
            field: Some("amount".to_string()),
        });
    }
    Ok(amount)
}

/// Body of POST /api/payment-sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentSessionRequest {
    pub amount: String,
    pub currency: String,
    pub network: String,
    pub token: String,
    pub merchant_address: String,
    pub description: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

impl CreatePaymentSessionRequest {
    pub fn validate(&self) -> Result<BigDecimal, AppError> {
        let amount = parse_session_amount(&self.amount)?;
        validate_address(&self.merchant_address, "merchant_address")?;
        for (field, value) in [
            ("currency", &self.currency),
            ("network", &self.network),
            ("token", &self.token),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation {
                    message: format!("{} is required", field),
                    field: Some(field.to_string()),
                });
            }
        }
        Ok(amount)
    }
}

/// Body of PATCH /api/payment-sessions/{id}.
///
/// This struct IS the mutable-field whitelist: clients may post any JSON body,
/// but only these fields are ever read. Immutable columns (amount, currency,
/// network, token, merchant_address) have no representation here, so extra
/// body fields are inert rather than rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentSessionPatch {
    pub customer_address: Option<String>,
    pub tx_hash: Option<String>,
    pub block_number: Option<i64>,
    pub confirmations: Option<i32>,
    pub status: Option<PaymentStatus>,
}

impl PaymentSessionPatch {
    pub fn is_empty(&self) -> bool {
        self.customer_address.is_none()
            && self.tx_hash.is_none()
            && self.block_number.is_none()
            && self.confirmations.is_none()
            && self.status.is_none()
    }

    /// True when the patch carries any chain-evidence field.
    pub fn has_blockchain_fields(&self) -> bool {
        self.tx_hash.is_some() || self.block_number.is_some() || self.confirmations.is_some()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(addr) = &self.customer_address {
            validate_address(addr, "customer_address")?;
        }
        if let Some(hash) = &self.tx_hash {
            validate_tx_hash(hash)?;
        }
        if let Some(block) = self.block_number {
            if block < 0 {
                return Err(AppError::Validation {
                    message: "block_number must be non-negative".to_string(),
                    field: Some("block_number".to_string()),
                });
            }
        }
        if let Some(confs) = self.confirmations {
            if confs < 0 {
                return Err(AppError::Validation {
                    message: "confirmations must be non-negative".to_string(),
                    field: Some("confirmations".to_string()),
                });
            }
        }
        Ok(())
    }
}

/// Body of POST /api/refunds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRefundRequest {
    pub payment_session_id: Uuid,
    pub amount: String,
    pub reason: Option<String>,
}

impl CreateRefundRequest {
    pub fn validate(&self) -> Result<BigDecimal, AppError> {
        let amount = BigDecimal::from_str(&self.amount).map_err(|_| AppError::Validation {
            message: format!("invalid decimal amount: {}", self.amount),
            field: Some("amount".to_string()),
        })?;
        if amount <= BigDecimal::from(0) {
            return Err(AppError::Validation {
                message: "refund amount must be greater than zero".to_string(),
                field: Some("amount".to_string()),
            });
        }
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_round_trip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Confirming,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Confirming.is_terminal());
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_address_validation() {
        assert!(validate_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44e", "x").is_ok());
        assert!(validate_address("742d35Cc6634C0532925a3b844Bc454e4438f44e", "x").is_err());
        assert!(validate_address("0x742d", "x").is_err());
        assert!(validate_address("", "x").is_err());
    }

    #[test]
    fn test_tx_hash_validation() {
        let good = format!("0x{}", "ab".repeat(32));
        assert!(validate_tx_hash(&good).is_ok());
        assert!(validate_tx_hash("0xabcd").is_err());
    }

    #[test]
    fn test_amount_bounds() {
        assert!(parse_session_amount("1").is_ok());
        assert!(parse_session_amount("10000").is_ok());
        assert!(parse_session_amount("100.50").is_ok());
        assert!(parse_session_amount("0.99").is_err());
        assert!(parse_session_amount("10000.01").is_err());
        assert!(parse_session_amount("-5").is_err());
        assert!(parse_session_amount("abc").is_err());
    }

    #[test]
    fn test_patch_whitelist_ignores_unknown_fields() {
        // amount/merchant_address in a PATCH body must deserialize away.
        let patch: PaymentSessionPatch = serde_json::from_str(
            r#"{"amount": "9999", "merchant_address": "0xevil", "customer_address": null}"#,
        )
        .unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_patch_blockchain_field_detection() {
        let patch = PaymentSessionPatch {
            tx_hash: Some(format!("0x{}", "ab".repeat(32))),
            ..Default::default()
        };
        assert!(patch.has_blockchain_fields());

        let patch = PaymentSessionPatch {
            customer_address: Some("0x742d35Cc6634C0532925a3b844Bc454e4438f44e".to_string()),
            ..Default::default()
        };
        assert!(!patch.has_blockchain_fields());
    }
}
