//! Repository for the `refresh_tokens` table.

use jobtrail_core::error::CoreError;
use jobtrail_core::types::{DbId, Timestamp};

use crate::gateway::DataStore;
use crate::models::refresh_token::{CreateRefreshToken, RefreshTokenRecord};

pub const INSERT: &str = "INSERT INTO refresh_tokens (user_id, refresh_token_hash, expires_at) \
                          VALUES ($1, $2, $3) \
                          RETURNING id, user_id, refresh_token_hash, expires_at";

pub const FIND_BY_HASH: &str = "SELECT id, user_id, refresh_token_hash, expires_at \
                                FROM refresh_tokens WHERE refresh_token_hash = $1";

/// Swap the hash in place, but only while the presented hash is still
/// current and unexpired. Two racing rotations of the same token cannot
/// both match. A row already carrying the new hash also matches, so
/// re-running the statement after a lost reply returns the same row.
pub const ROTATE: &str = "UPDATE refresh_tokens SET refresh_token_hash = $1, expires_at = $2 \
                          WHERE (refresh_token_hash = $3 AND expires_at >= $4) \
                          OR refresh_token_hash = $1 \
                          RETURNING id, user_id, refresh_token_hash, expires_at";

pub const DELETE_BY_HASH: &str = "DELETE FROM refresh_tokens WHERE refresh_token_hash = $1";

pub const DELETE_FOR_USER: &str = "DELETE FROM refresh_tokens WHERE user_id = $1";

/// Provides persistence for refresh-token records.
pub struct RefreshTokenRepo;

impl RefreshTokenRepo {
    /// Insert a new record, returning the created row.
    ///
    /// A duplicate hash already owned by the same user is the row an earlier
    /// attempt committed before its reply was lost, and is returned as is.
    pub async fn create(
        db: &DataStore,
        input: &CreateRefreshToken,
    ) -> Result<RefreshTokenRecord, CoreError> {
        let inserted = db
            .query(
                INSERT,
                &[
                    input.user_id.into(),
                    input.refresh_token_hash.as_str().into(),
                    input.expires_at.into(),
                ],
            )
            .await;

        let rows = match inserted {
            Ok(rows) => rows,
            Err(CoreError::Conflict(msg)) => {
                return match Self::find_by_hash(db, &input.refresh_token_hash).await? {
                    Some(existing) if existing.user_id == input.user_id => {
                        tracing::debug!(
                            user_id = input.user_id,
                            "Refresh token already stored by an earlier attempt"
                        );
                        Ok(existing)
                    }
                    _ => Err(CoreError::Conflict(msg)),
                };
            }
            Err(err) => return Err(err),
        };

        let row = rows
            .first()
            .ok_or_else(|| CoreError::Internal("Insert returned no row".into()))?;
        RefreshTokenRecord::from_row(row)
    }

    /// Find a record by token hash, expired or not.
    pub async fn find_by_hash(
        db: &DataStore,
        hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, CoreError> {
        let rows = db.query(FIND_BY_HASH, &[hash.into()]).await?;
        rows.first().map(RefreshTokenRecord::from_row).transpose()
    }

    /// Replace `old_hash` with `new_hash` if it is still current and not
    /// expired at `now`. Returns `None` when no row matched.
    pub async fn rotate(
        db: &DataStore,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: Timestamp,
        now: Timestamp,
    ) -> Result<Option<RefreshTokenRecord>, CoreError> {
        let rows = db
            .query(
                ROTATE,
                &[
                    new_hash.into(),
                    new_expires_at.into(),
                    old_hash.into(),
                    now.into(),
                ],
            )
            .await?;
        rows.first().map(RefreshTokenRecord::from_row).transpose()
    }

    /// Delete the record with this hash. Returns `true` if a row was removed.
    pub async fn delete_by_hash(db: &DataStore, hash: &str) -> Result<bool, CoreError> {
        let rows = db.query(DELETE_BY_HASH, &[hash.into()]).await?;
        Ok(rows.row_count > 0)
    }

    /// Delete every record for a user. Returns the count of removed rows.
    pub async fn delete_for_user(db: &DataStore, user_id: DbId) -> Result<u64, CoreError> {
        let rows = db.query(DELETE_FOR_USER, &[user_id.into()]).await?;
        Ok(rows.row_count)
    }
}
