//! Bearer-token authentication for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use jobtrail_core::error::CoreError;
use jobtrail_core::types::DbId;

use crate::auth::tokens::{AccessClaims, TokenError, TokenFactory};
use crate::error::AppError;
use crate::state::AppState;

/// Resolve the caller from the `Authorization: Bearer <token>` header.
///
/// The scheme name is matched case-insensitively. Every failure is
/// `CoreError::Unauthorized`; the message says whether the header was
/// missing, malformed, expired or otherwise invalid.
pub fn authenticate(headers: &HeaderMap, tokens: &TokenFactory) -> Result<AccessClaims, CoreError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| CoreError::Unauthorized("Token required".into()))?;

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.trim_start().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| CoreError::Unauthorized("Invalid authorization format".into()))?;

    tokens.verify(token).map_err(|err| match err {
        TokenError::Expired => CoreError::Unauthorized("Token expired".into()),
        TokenError::Invalid => CoreError::Unauthorized("Invalid token".into()),
    })
}

/// Authenticated caller, extracted from a Bearer access token.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id(), "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: AccessClaims,
}

impl AuthUser {
    pub fn user_id(&self) -> DbId {
        self.claims.user_id
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = authenticate(&parts.headers, &state.tokens)?;
        Ok(AuthUser { claims })
    }
}
