//! Refresh-token session lifecycle: login, rotation, revocation.
//!
//! Each live refresh token has exactly one `refresh_tokens` row keyed by its
//! SHA-256 hash. A row moves Active -> Rotated (hash replaced in place),
//! Active -> Revoked (row deleted) or Active -> Expired (left to fail the
//! expiry check). None of those transitions can be undone for a given token
//! value.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use jobtrail_core::error::CoreError;
use jobtrail_core::types::DbId;
use jobtrail_db::models::identity::Identity;
use jobtrail_db::models::refresh_token::CreateRefreshToken;
use jobtrail_db::repositories::{IdentityRepo, RefreshTokenRepo};
use jobtrail_db::DataStore;

use super::password::{Argon2Verifier, CredentialVerifier};
use super::tokens::{hash_refresh_token, IssuedTokens, TokenFactory, TokenSubject};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

/// Tokens handed back to a client after login or rotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

impl From<IssuedTokens> for TokenPair {
    fn from(issued: IssuedTokens) -> Self {
        Self {
            access_token: issued.access_token,
            refresh_token: issued.refresh_token,
            expires_in: issued.expires_in,
        }
    }
}

/// Issues, rotates and revokes refresh-token sessions.
#[derive(Clone)]
pub struct SessionStore {
    db: DataStore,
    tokens: Arc<TokenFactory>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl SessionStore {
    /// Session store verifying passwords with Argon2id.
    pub fn new(db: DataStore, tokens: Arc<TokenFactory>) -> Self {
        Self {
            db,
            tokens,
            verifier: Arc::new(Argon2Verifier),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn tokens(&self) -> &TokenFactory {
        &self.tokens
    }

    /// Start a session for an already-authenticated identity.
    pub async fn login(&self, identity: &Identity) -> Result<TokenPair, CoreError> {
        let subject = TokenSubject::from_identity(identity)?;
        let issued = self.tokens.issue(&subject)?;

        RefreshTokenRepo::create(
            &self.db,
            &CreateRefreshToken {
                user_id: identity.id,
                refresh_token_hash: issued.refresh_token_hash.clone(),
                expires_at: issued.refresh_expires_at,
            },
        )
        .await?;

        tracing::info!(
            user_id = subject.user_id(),
            username = subject.username(),
            role = subject.role().name(),
            "Session started"
        );
        Ok(issued.into())
    }

    /// Check a username/password pair, then [`login`](Self::login).
    ///
    /// Unknown user and wrong password fail identically.
    pub async fn login_with_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, CoreError> {
        let Some(identity) = IdentityRepo::find_by_username(&self.db, username).await? else {
            tracing::info!(username, "Login rejected: unknown user");
            return Err(CoreError::Unauthorized(INVALID_CREDENTIALS.into()));
        };

        if !self.verifier.verify(password, &identity.password_hash)? {
            tracing::info!(user_id = identity.id, "Login rejected: wrong password");
            return Err(CoreError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        self.login(&identity).await
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// The stored hash is swapped by one conditional update that also
    /// re-checks expiry, so of two concurrent rotations of the same token
    /// exactly one succeeds. Unknown, expired, already-rotated and revoked
    /// tokens all fail with the same `Unauthorized` error.
    pub async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, CoreError> {
        let now = Utc::now();
        let old_hash = hash_refresh_token(refresh_token);

        let record = RefreshTokenRepo::find_by_hash(&self.db, &old_hash)
            .await?
            .filter(|record| !record.is_expired_at(now))
            .ok_or_else(invalid_refresh_token)?;

        let identity = IdentityRepo::find_by_id(&self.db, record.user_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = record.user_id, "Refresh token owner no longer exists");
                invalid_refresh_token()
            })?;

        let issued = self
            .tokens
            .issue_at(&TokenSubject::from_identity(&identity)?, now)?;

        RefreshTokenRepo::rotate(
            &self.db,
            &old_hash,
            &issued.refresh_token_hash,
            issued.refresh_expires_at,
            now,
        )
        .await?
        .ok_or_else(|| {
            tracing::warn!(
                user_id = record.user_id,
                "Refresh token changed during rotation"
            );
            invalid_refresh_token()
        })?;

        tracing::info!(user_id = identity.id, "Session rotated");
        Ok(issued.into())
    }

    /// End the session for a refresh token. Unknown tokens are not an error.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), CoreError> {
        let removed =
            RefreshTokenRepo::delete_by_hash(&self.db, &hash_refresh_token(refresh_token)).await?;
        tracing::info!(removed, "Session revoked");
        Ok(())
    }

    /// End every session of a user. Returns how many were removed.
    pub async fn revoke_all(&self, user_id: DbId) -> Result<u64, CoreError> {
        let removed = RefreshTokenRepo::delete_for_user(&self.db, user_id).await?;
        tracing::info!(user_id, removed, "All sessions revoked");
        Ok(removed)
    }
}

fn invalid_refresh_token() -> CoreError {
    CoreError::Unauthorized(INVALID_REFRESH_TOKEN.into())
}
