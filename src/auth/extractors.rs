use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::error::AppError;

/// Resolves the bearer token in `headers` to the public user id it was issued for.
pub fn authorize(headers: &HeaderMap, keys: &JwtKeys) -> Result<String, AppError> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized("Missing Authorization header"))?;

    // Expect "Bearer <token>"
    let (scheme, token) = auth
        .split_once(' ')
        .ok_or(AppError::Unauthorized("Invalid Authorization header"))?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AppError::Unauthorized("Invalid Authorization header"));
    }

    match keys.verify(token.trim()) {
        Ok(claims) => Ok(claims.sub),
        Err(e) => {
            warn!(error = %e, "invalid or expired token");
            Err(AppError::Unauthorized("Invalid or expired token"))
        }
    }
}

/// Extracts and validates the JWT, yielding the caller's public user id.
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        authorize(&parts.headers, &keys).map(AuthUser)
    }
}
