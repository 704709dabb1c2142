//! Handlers for the `/auth` resource (login, refresh, logout, session).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::session::TokenPair;
use crate::auth::tokens::AccessClaims;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for `POST /auth/refresh` and `POST /auth/logout`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Authenticate with username + password. Returns access and refresh tokens.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    if input.username.trim().is_empty() || input.password.is_empty() {
        return Err(AppError::BadRequest(
            "username and password are required".into(),
        ));
    }

    let pair = state
        .sessions
        .login_with_password(&input.username, &input.password)
        .await?;
    Ok(Json(pair))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a refresh token for a new pair. The presented token stops
/// working immediately.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let pair = state.sessions.rotate(&input.refresh_token).await?;
    Ok(Json(pair))
}

/// POST /api/v1/auth/logout
///
/// Revoke the presented refresh token. Always 204, even if it was unknown.
pub async fn logout(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<StatusCode> {
    state.sessions.revoke(&input.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/session
///
/// Claims of the caller's access token.
pub async fn session(user: AuthUser) -> Json<AccessClaims> {
    Json(user.claims)
}
