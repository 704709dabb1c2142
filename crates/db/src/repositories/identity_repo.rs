//! Read-only lookups against the `users` table.

use jobtrail_core::error::CoreError;
use jobtrail_core::types::DbId;

use crate::gateway::DataStore;
use crate::models::identity::Identity;

pub const FIND_BY_USERNAME: &str =
    "SELECT id, username, password_hash, is_admin FROM users WHERE username = $1";

pub const FIND_BY_ID: &str = "SELECT id, username, password_hash, is_admin FROM users WHERE id = $1";

/// Identity lookups used by login and rotation.
pub struct IdentityRepo;

impl IdentityRepo {
    /// Find a user by username (case-sensitive).
    pub async fn find_by_username(
        db: &DataStore,
        username: &str,
    ) -> Result<Option<Identity>, CoreError> {
        let rows = db.query(FIND_BY_USERNAME, &[username.into()]).await?;
        rows.first().map(Identity::from_row).transpose()
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(db: &DataStore, id: DbId) -> Result<Option<Identity>, CoreError> {
        let rows = db.query(FIND_BY_ID, &[id.into()]).await?;
        rows.first().map(Identity::from_row).transpose()
    }
}
