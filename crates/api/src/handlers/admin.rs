//! Admin-only session management.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use jobtrail_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::state::AppState;

/// Response for `DELETE /admin/users/{id}/sessions`.
#[derive(Debug, Serialize)]
pub struct RevokedSessions {
    pub revoked: u64,
}

/// DELETE /api/v1/admin/users/{id}/sessions
///
/// Sign a user out everywhere by deleting all of their refresh tokens.
pub async fn revoke_user_sessions(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<RevokedSessions>> {
    let revoked = state.sessions.revoke_all(user_id).await?;
    tracing::info!(admin_id = admin.user_id(), user_id, revoked, "Admin revoked sessions");
    Ok(Json(RevokedSessions { revoked }))
}
