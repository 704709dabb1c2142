pub mod admin;
pub mod auth;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /auth/login                     login (public)
/// /auth/refresh                   rotate refresh token (public)
/// /auth/logout                    revoke refresh token (public)
/// /auth/session                   current claims (requires auth)
///
/// /admin/users/{id}/sessions      revoke all sessions (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
}
