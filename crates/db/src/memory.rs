//! In-process [`QueryExecutor`] for tests.
//!
//! Understands exactly the statements issued by the repositories in this
//! crate and keeps `users` / `refresh_tokens` in memory. Each statement runs
//! under one mutex, matching the single-statement atomicity Postgres gives
//! the conditional rotation update. Transient faults can be injected to
//! exercise the gateway's retry path.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use jobtrail_core::types::{DbId, Timestamp};

use crate::gateway::{QueryError, QueryExecutor, PING};
use crate::models::identity::Identity;
use crate::models::refresh_token::RefreshTokenRecord;
use crate::repositories::{identity_repo, refresh_token_repo};
use crate::value::{Row, RowSet, SqlValue};

#[derive(Default)]
struct Tables {
    users: Vec<Identity>,
    refresh_tokens: Vec<RefreshTokenRecord>,
    next_token_id: DbId,
    pending_failures: u32,
    calls: u32,
}

/// In-memory stand-in for the Postgres executor.
#[derive(Default)]
pub struct MemoryExecutor {
    tables: Mutex<Tables>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a user row.
    pub fn insert_identity(&self, identity: Identity) {
        self.lock().users.push(identity);
    }

    /// Make the next `n` statements fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.lock().pending_failures = n;
    }

    /// Number of statements received, failed ones included.
    pub fn calls(&self) -> u32 {
        self.lock().calls
    }

    /// Snapshot of the stored refresh-token rows.
    pub fn refresh_tokens(&self) -> Vec<RefreshTokenRecord> {
        self.lock().refresh_tokens.clone()
    }

    /// Overwrite the expiry of the record with this hash.
    pub fn set_expiry(&self, refresh_token_hash: &str, expires_at: Timestamp) {
        let mut tables = self.lock();
        if let Some(record) = tables
            .refresh_tokens
            .iter_mut()
            .find(|r| r.refresh_token_hash == refresh_token_hash)
        {
            record.expires_at = expires_at;
        }
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<RowSet, QueryError> {
        let mut tables = self.lock();
        tables.calls += 1;

        if tables.pending_failures > 0 {
            tables.pending_failures -= 1;
            return Err(QueryError::Transient("injected failure".into()));
        }

        match sql {
            PING => Ok(RowSet::from_rows(vec![Row::new().with("?column?", 1_i64)])),
            refresh_token_repo::INSERT => {
                let user_id = int_param(params, 0)?;
                let hash = text_param(params, 1)?;
                let expires_at = timestamp_param(params, 2)?;

                if tables.refresh_tokens.iter().any(|r| r.refresh_token_hash == hash) {
                    return Err(QueryError::Constraint(
                        "duplicate key value violates unique constraint".into(),
                    ));
                }

                tables.next_token_id += 1;
                let record = RefreshTokenRecord {
                    id: tables.next_token_id,
                    user_id,
                    refresh_token_hash: hash.to_string(),
                    expires_at,
                };
                let row = token_row(&record);
                tables.refresh_tokens.push(record);
                Ok(RowSet::from_rows(vec![row]))
            }
            refresh_token_repo::FIND_BY_HASH => {
                let hash = text_param(params, 0)?;
                let rows = tables
                    .refresh_tokens
                    .iter()
                    .filter(|r| r.refresh_token_hash == hash)
                    .map(token_row)
                    .collect();
                Ok(RowSet::from_rows(rows))
            }
            refresh_token_repo::ROTATE => {
                let new_hash = text_param(params, 0)?;
                let new_expires_at = timestamp_param(params, 1)?;
                let old_hash = text_param(params, 2)?;
                let now = timestamp_param(params, 3)?;

                let matches = |r: &RefreshTokenRecord| {
                    (r.refresh_token_hash == old_hash && r.expires_at >= now)
                        || r.refresh_token_hash == new_hash
                };

                // Every row holding `new_hash` matches too, so uniqueness only
                // breaks when the update would touch more than one row.
                let matched = tables.refresh_tokens.iter().filter(|r| matches(r)).count();
                if matched > 1 {
                    return Err(QueryError::Constraint(
                        "duplicate key value violates unique constraint".into(),
                    ));
                }

                let rows = tables
                    .refresh_tokens
                    .iter_mut()
                    .filter(|r| matches(r))
                    .map(|record| {
                        record.refresh_token_hash = new_hash.to_string();
                        record.expires_at = new_expires_at;
                        token_row(record)
                    })
                    .collect();
                Ok(RowSet::from_rows(rows))
            }
            refresh_token_repo::DELETE_BY_HASH => {
                let hash = text_param(params, 0)?.to_string();
                Ok(delete_where(&mut tables, |r| r.refresh_token_hash == hash))
            }
            refresh_token_repo::DELETE_FOR_USER => {
                let user_id = int_param(params, 0)?;
                Ok(delete_where(&mut tables, |r| r.user_id == user_id))
            }
            identity_repo::FIND_BY_USERNAME => {
                let username = text_param(params, 0)?;
                let rows = tables
                    .users
                    .iter()
                    .filter(|u| u.username == username)
                    .map(identity_row)
                    .collect();
                Ok(RowSet::from_rows(rows))
            }
            identity_repo::FIND_BY_ID => {
                let id = int_param(params, 0)?;
                let rows = tables
                    .users
                    .iter()
                    .filter(|u| u.id == id)
                    .map(identity_row)
                    .collect();
                Ok(RowSet::from_rows(rows))
            }
            other => Err(QueryError::Malformed(format!(
                "statement not supported by the in-memory store: {other}"
            ))),
        }
    }
}

fn delete_where(tables: &mut Tables, matches: impl Fn(&RefreshTokenRecord) -> bool) -> RowSet {
    let before = tables.refresh_tokens.len();
    tables.refresh_tokens.retain(|r| !matches(r));
    RowSet::affected((before - tables.refresh_tokens.len()) as u64)
}

fn token_row(record: &RefreshTokenRecord) -> Row {
    Row::new()
        .with("id", record.id)
        .with("user_id", record.user_id)
        .with("refresh_token_hash", record.refresh_token_hash.as_str())
        .with("expires_at", record.expires_at)
}

fn identity_row(identity: &Identity) -> Row {
    Row::new()
        .with("id", identity.id)
        .with("username", identity.username.as_str())
        .with("password_hash", identity.password_hash.as_str())
        .with("is_admin", identity.is_admin)
}

fn param(params: &[SqlValue], idx: usize) -> Result<&SqlValue, QueryError> {
    params
        .get(idx)
        .ok_or_else(|| QueryError::Malformed(format!("missing parameter ${}", idx + 1)))
}

fn int_param(params: &[SqlValue], idx: usize) -> Result<i64, QueryError> {
    match param(params, idx)? {
        SqlValue::Int(v) => Ok(*v),
        other => Err(QueryError::Malformed(format!(
            "parameter ${} expected integer, found {other:?}",
            idx + 1
        ))),
    }
}

fn text_param(params: &[SqlValue], idx: usize) -> Result<&str, QueryError> {
    match param(params, idx)? {
        SqlValue::Text(v) => Ok(v),
        other => Err(QueryError::Malformed(format!(
            "parameter ${} expected text, found {other:?}",
            idx + 1
        ))),
    }
}

fn timestamp_param(params: &[SqlValue], idx: usize) -> Result<Timestamp, QueryError> {
    match param(params, idx)? {
        SqlValue::Timestamp(v) => Ok(*v),
        other => Err(QueryError::Malformed(format!(
            "parameter ${} expected timestamp, found {other:?}",
            idx + 1
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use chrono::Utc;
    use jobtrail_core::error::CoreError;
    use jobtrail_core::retry::RetryPolicy;

    use super::*;
    use crate::gateway::DataStore;
    use crate::models::refresh_token::CreateRefreshToken;
    use crate::repositories::{IdentityRepo, RefreshTokenRepo};

    fn store() -> (Arc<MemoryExecutor>, DataStore) {
        let executor = Arc::new(MemoryExecutor::new());
        let db = DataStore::new(
            executor.clone(),
            RetryPolicy::fixed(3, Duration::from_millis(1)).unwrap(),
        );
        (executor, db)
    }

    fn new_token(user_id: DbId, hash: &str) -> CreateRefreshToken {
        CreateRefreshToken {
            user_id,
            refresh_token_hash: hash.to_string(),
            expires_at: Utc::now() + chrono::Duration::days(30),
        }
    }

    #[tokio::test]
    async fn create_then_find_by_hash() {
        let (_, db) = store();
        let created = RefreshTokenRepo::create(&db, &new_token(1, "aaa")).await.unwrap();

        let found = RefreshTokenRepo::find_by_hash(&db, "aaa").await.unwrap();
        assert_eq!(found, Some(created));
        assert!(RefreshTokenRepo::find_by_hash(&db, "zzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_hash_is_conflict() {
        let (executor, db) = store();
        RefreshTokenRepo::create(&db, &new_token(1, "aaa")).await.unwrap();

        let err = RefreshTokenRepo::create(&db, &new_token(2, "aaa")).await.unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
        assert_eq!(executor.refresh_tokens().len(), 1);
    }

    #[tokio::test]
    async fn rotate_matches_only_current_unexpired_hash() {
        let (executor, db) = store();
        RefreshTokenRepo::create(&db, &new_token(1, "old")).await.unwrap();
        let now = Utc::now();
        let later = now + chrono::Duration::days(30);

        let rotated = RefreshTokenRepo::rotate(&db, "old", "new", later, now).await.unwrap();
        assert_eq!(rotated.unwrap().refresh_token_hash, "new");

        let again = RefreshTokenRepo::rotate(&db, "old", "newer", later, now).await.unwrap();
        assert!(again.is_none());

        executor.set_expiry("new", now - chrono::Duration::seconds(1));
        let expired = RefreshTokenRepo::rotate(&db, "new", "newest", later, now).await.unwrap();
        assert!(expired.is_none());
    }

    #[tokio::test]
    async fn rotate_replay_returns_the_already_rotated_row() {
        let (executor, db) = store();
        RefreshTokenRepo::create(&db, &new_token(1, "old")).await.unwrap();
        let now = Utc::now();
        let later = now + chrono::Duration::days(30);

        let first = RefreshTokenRepo::rotate(&db, "old", "new", later, now).await.unwrap();
        let replay = RefreshTokenRepo::rotate(&db, "old", "new", later, now).await.unwrap();

        assert_eq!(first, replay);
        assert_eq!(executor.refresh_tokens().len(), 1);
        assert_eq!(executor.refresh_tokens()[0].refresh_token_hash, "new");
    }

    #[tokio::test]
    async fn rotate_without_a_matching_row_is_not_a_conflict() {
        let (executor, db) = store();
        RefreshTokenRepo::create(&db, &new_token(1, "taken")).await.unwrap();
        let now = Utc::now();
        let later = now + chrono::Duration::days(30);

        // Nothing carries "gone", so the update touches no row at all.
        let rotated = RefreshTokenRepo::rotate(&db, "gone", "other", later, now).await.unwrap();
        assert!(rotated.is_none());

        RefreshTokenRepo::create(&db, &new_token(1, "live")).await.unwrap();
        let err = RefreshTokenRepo::rotate(&db, "live", "taken", later, now)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
        assert_eq!(executor.refresh_tokens().len(), 2);
    }

    #[tokio::test]
    async fn create_replay_by_same_user_returns_existing_row() {
        let (executor, db) = store();
        let input = new_token(1, "aaa");
        let created = RefreshTokenRepo::create(&db, &input).await.unwrap();

        let replay = RefreshTokenRepo::create(&db, &input).await.unwrap();

        assert_eq!(replay, created);
        assert_eq!(executor.refresh_tokens().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_went_away() {
        let (executor, db) = store();
        RefreshTokenRepo::create(&db, &new_token(1, "a")).await.unwrap();
        RefreshTokenRepo::create(&db, &new_token(1, "b")).await.unwrap();
        RefreshTokenRepo::create(&db, &new_token(2, "c")).await.unwrap();

        assert!(RefreshTokenRepo::delete_by_hash(&db, "a").await.unwrap());
        assert!(!RefreshTokenRepo::delete_by_hash(&db, "a").await.unwrap());
        assert_eq!(RefreshTokenRepo::delete_for_user(&db, 1).await.unwrap(), 1);
        assert_eq!(executor.refresh_tokens().len(), 1);
        assert_eq!(executor.refresh_tokens()[0].user_id, 2);
    }

    #[tokio::test]
    async fn injected_faults_are_retried_by_the_gateway() {
        let (executor, db) = store();
        executor.insert_identity(Identity {
            id: 9,
            username: "admin".into(),
            password_hash: "hash".into(),
            is_admin: true,
        });
        executor.fail_next(2);

        let identity = IdentityRepo::find_by_username(&db, "admin").await.unwrap().unwrap();
        assert_eq!(identity.id, 9);
        assert_eq!(executor.calls(), 3);

        executor.fail_next(3);
        let err = IdentityRepo::find_by_id(&db, 9).await.unwrap_err();
        assert_matches!(err, CoreError::Infrastructure { .. });
    }

    #[tokio::test]
    async fn ping_is_a_single_unretried_call() {
        let (executor, db) = store();
        assert!(db.ping().await);

        executor.fail_next(1);
        assert!(!db.ping().await);
        assert_eq!(executor.calls(), 2);
    }
}
