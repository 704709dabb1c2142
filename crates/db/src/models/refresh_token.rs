//! Refresh-token record model and DTO.

use jobtrail_core::error::CoreError;
use jobtrail_core::types::{DbId, Timestamp};

use crate::value::Row;

/// A row from the `refresh_tokens` table.
///
/// Only the SHA-256 digest of the token is ever stored; the plaintext goes
/// to the client and nowhere else.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshTokenRecord {
    pub id: DbId,
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub expires_at: Timestamp,
}

impl RefreshTokenRecord {
    pub fn from_row(row: &Row) -> Result<Self, CoreError> {
        Ok(Self {
            id: row.get_i64("id")?,
            user_id: row.get_i64("user_id")?,
            refresh_token_hash: row.get_str("refresh_token_hash")?.to_string(),
            expires_at: row.get_timestamp("expires_at")?,
        })
    }

    /// Whether the record's lifetime has elapsed at `now`.
    ///
    /// A record expiring exactly at `now` is still usable.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at < now
    }
}

/// DTO for inserting a new refresh-token record.
#[derive(Debug, Clone)]
pub struct CreateRefreshToken {
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub expires_at: Timestamp,
}
