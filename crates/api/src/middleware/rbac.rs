//! Role-based access control.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use jobtrail_core::error::CoreError;

use super::auth::AuthUser;
use crate::auth::tokens::AccessClaims;
use crate::error::AppError;
use crate::state::AppState;

/// Allow only admins. Everyone else gets `CoreError::Forbidden`.
pub fn authorize(claims: &AccessClaims) -> Result<(), CoreError> {
    if claims.is_admin() {
        Ok(())
    } else {
        Err(CoreError::Forbidden("Admin role required".into()))
    }
}

/// Requires the `admin` role. Rejects with 401 when unauthenticated and 403
/// when authenticated without the role.
///
/// ```ignore
/// async fn admin_only(RequireAdmin(user): RequireAdmin) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if let Err(err) = authorize(&user.claims) {
            tracing::warn!(
                user_id = user.user_id(),
                role = user.claims.role.name(),
                "Admin route denied"
            );
            return Err(err.into());
        }
        Ok(RequireAdmin(user))
    }
}
