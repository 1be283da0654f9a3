//! Idempotent session creation support.
//!
//! A caller may tag POST /api/payment-sessions with an idempotency key. The
//! key is scoped to the merchant, never global, and maps to at most one
//! session. Whether a retry is a safe replay or a conflicting reuse is decided
//! by comparing a canonical fingerprint of the creation parameters.

use crate::error::AppError;
use crate::payments::types::CreatePaymentSessionRequest;
use sha2::{Digest, Sha256};

/// Keys are 1-64 characters from [A-Za-z0-9_-]. Checked before any lookup.
pub fn validate_idempotency_key(key: &str) -> Result<(), AppError> {
    if key.is_empty() || key.len() > 64 {
        return Err(AppError::Validation {
            message: "idempotency key must be 1-64 characters".to_string(),
            field: Some("idempotency-key".to_string()),
        });
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::Validation {
            message: "idempotency key may only contain alphanumerics, hyphen and underscore"
                .to_string(),
            field: Some("idempotency-key".to_string()),
        });
    }
    Ok(())
}

/// Canonical SHA-256 fingerprint over the semantically significant creation
/// parameters. The field list is deliberately explicit: amount, currency,
/// network, token, merchant_address and description participate; success_url
/// and cancel_url are cosmetic and do not. Adding a creatable field means
/// deciding here whether it alters payment intent.
///
/// The encoding is injective: present values are length-prefixed so no two
/// distinct parameter sets share a digest input, and an absent optional field
/// is marked differently from an empty one.
pub fn request_fingerprint(request: &CreatePaymentSessionRequest) -> String {
    let mut hasher = Sha256::new();
    for (field, value) in [
        ("amount", Some(request.amount.as_str())),
        ("currency", Some(request.currency.as_str())),
        ("network", Some(request.network.as_str())),
        ("token", Some(request.token.as_str())),
        ("merchant_address", Some(request.merchant_address.as_str())),
        ("description", request.description.as_deref()),
    ] {
        hasher.update(field.as_bytes());
        match value {
            Some(value) => {
                hasher.update(b"=");
                hasher.update((value.len() as u64).to_be_bytes());
                hasher.update(value.as_bytes());
            }
            None => hasher.update(b"-"),
        }
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreatePaymentSessionRequest {
        CreatePaymentSessionRequest {
            amount: "100".to_string(),
            currency: "USD".to_string(),
            network: "ethereum".to_string(),
            token: "USDC".to_string(),
            merchant_address: "0x742d35Cc6634C0532925a3b844Bc454e4438f44e".to_string(),
            description: Some("order #42".to_string()),
            success_url: None,
            cancel_url: None,
        }
    }

    #[test]
    fn test_key_format() {
        assert!(validate_idempotency_key("order-42_retry").is_ok());
        assert!(validate_idempotency_key("a").is_ok());
        assert!(validate_idempotency_key(&"k".repeat(64)).is_ok());
        assert!(validate_idempotency_key("").is_err());
        assert!(validate_idempotency_key(&"k".repeat(65)).is_err());
        assert!(validate_idempotency_key("has space").is_err());
        assert!(validate_idempotency_key("key!").is_err());
    }

    #[test]
    fn test_fingerprint_stable_across_retries() {
        assert_eq!(request_fingerprint(&request()), request_fingerprint(&request()));
    }

    #[test]
    fn test_fingerprint_changes_with_significant_fields() {
        let base = request_fingerprint(&request());

        let mut changed = request();
        changed.amount = "200".to_string();
        assert_ne!(request_fingerprint(&changed), base);

        let mut changed = request();
        changed.token = "USDT".to_string();
        assert_ne!(request_fingerprint(&changed), base);

        let mut changed = request();
        changed.description = None;
        assert_ne!(request_fingerprint(&changed), base);
    }

    #[test]
    fn test_fingerprint_distinguishes_absent_from_empty() {
        let mut absent = request();
        absent.description = None;
        let mut empty = request();
        empty.description = Some(String::new());
        assert_ne!(request_fingerprint(&absent), request_fingerprint(&empty));
    }

    #[test]
    fn test_fingerprint_ignores_cosmetic_fields() {
        let base = request_fingerprint(&request());
        let mut changed = request();
        changed.success_url = Some("https://shop.example/thanks".to_string());
        changed.cancel_url = Some("https://shop.example/cancel".to_string());
        assert_eq!(request_fingerprint(&changed), base);
    }

    #[test]
    fn test_fingerprint_field_boundaries() {
        // "ab" + "c" must not collide with "a" + "bc".
        let mut left = request();
        left.currency = "ABC".to_string();
        left.network = "D".to_string();
        let mut right = request();
        right.currency = "AB".to_string();
        right.network = "CD".to_string();
        assert_ne!(request_fingerprint(&left), request_fingerprint(&right));
    }
}
