//! Trusted caller identity.
//!
//! Authentication itself lives upstream (API keys / JWT at the edge); by the
//! time a request reaches these handlers the auth layer has resolved the
//! merchant and injected it as the `x-merchant-id` header. The extractor
//! rejects requests where that contract was not honored.

use crate::error::AppError;
use axum::extract::FromRequestParts;
use http::request::Parts;
use uuid::Uuid;

pub const MERCHANT_ID_HEADER: &str = "x-merchant-id";

/// The authenticated merchant making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerchantId(pub Uuid);

impl<S> FromRequestParts<S> for MerchantId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(MERCHANT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok())
            .map(MerchantId)
            .ok_or(AppError::Unauthorized)
    }
}
