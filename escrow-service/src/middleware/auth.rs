use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use service_core::error::AppError;

/// Raw bearer token from the `Authorization` header.
///
/// Verification happens in the handler, because a missing token is reported
/// together with missing body fields. Extract as `Option<BearerToken>` to
/// receive `None` instead of a rejection.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
            })?;

        Ok(BearerToken(token.to_string()))
    }
}
