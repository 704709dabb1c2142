//! Identity model (read-only view of the `users` table).

use jobtrail_core::error::CoreError;
use jobtrail_core::roles::Role;
use jobtrail_core::types::DbId;

use crate::value::Row;

/// A user as seen by the session layer.
///
/// Contains the password hash -- never serialize this to API responses.
#[derive(Clone)]
pub struct Identity {
    pub id: DbId,
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
}

impl Identity {
    pub fn from_row(row: &Row) -> Result<Self, CoreError> {
        Ok(Self {
            id: row.get_i64("id")?,
            username: row.get_str("username")?.to_string(),
            password_hash: row.get_str("password_hash")?.to_string(),
            is_admin: row.get_bool("is_admin")?,
        })
    }

    pub fn role(&self) -> Role {
        Role::from_admin_flag(self.is_admin)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}
