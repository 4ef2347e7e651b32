use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::{
    auth::{identity::Principal, jwt::JwtKeys},
    error::ApiError,
};

/// Extracts the bearer token, verifies it and yields the caller's principal.
/// Everything behind this extractor runs with an authenticated identity;
/// the numeric user id is resolved later, per operation.
pub struct AuthPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::InvalidToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(ApiError::InvalidToken)?;

        let verified = keys.verify(token).map_err(|e| {
            warn!("bearer token failed verification");
            e
        })?;
        if verified.is_expired {
            warn!(username = %verified.subject, "expired bearer token");
            return Err(ApiError::InvalidToken);
        }

        Ok(AuthPrincipal(Principal::Username(verified.subject)))
    }
}
