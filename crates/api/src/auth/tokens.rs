//! Access-token signing/verification and refresh-token generation.
//!
//! Access tokens are HS256-signed JWTs carrying a [`Claims`] payload and are
//! verified statelessly. Refresh tokens are 256-bit random values, hex
//! encoded; only their SHA-256 hash is ever stored server-side.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobtrail_core::error::CoreError;
use jobtrail_core::hashing::{hex_encode, sha256_hex};
use jobtrail_core::roles::Role;
use jobtrail_core::types::{DbId, Timestamp};
use jobtrail_db::models::identity::Identity;

/// Default access token lifetime in seconds.
const DEFAULT_ACCESS_TTL_SECS: i64 = 300;
/// Default refresh token lifetime in days.
const DEFAULT_REFRESH_TTL_DAYS: i64 = 30;
/// Random bytes per refresh token (256 bits).
const REFRESH_TOKEN_BYTES: usize = 32;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for token issuance and verification.
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify access tokens.
    pub secret: String,
    /// Access token lifetime in seconds (default: 300).
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in days (default: 30).
    pub refresh_ttl_days: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_days", &self.refresh_ttl_days)
            .finish()
    }
}

impl JwtConfig {
    /// Load token configuration from environment variables.
    ///
    /// | Env Var                | Required | Default |
    /// |------------------------|----------|---------|
    /// | `JWT_SECRET`           | **yes**  | --      |
    /// | `JWT_ACCESS_TTL_SECS`  | no       | `300`   |
    /// | `JWT_REFRESH_TTL_DAYS` | no       | `30`    |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty, or a TTL is not a
    /// positive integer.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let access_ttl_secs: i64 = std::env::var("JWT_ACCESS_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_TTL_SECS.to_string())
            .parse()
            .expect("JWT_ACCESS_TTL_SECS must be a valid i64");
        assert!(access_ttl_secs > 0, "JWT_ACCESS_TTL_SECS must be positive");

        let refresh_ttl_days: i64 = std::env::var("JWT_REFRESH_TTL_DAYS")
            .unwrap_or_else(|_| DEFAULT_REFRESH_TTL_DAYS.to_string())
            .parse()
            .expect("JWT_REFRESH_TTL_DAYS must be a valid i64");
        assert!(refresh_ttl_days > 0, "JWT_REFRESH_TTL_DAYS must be positive");

        Self {
            secret,
            access_ttl_secs,
            refresh_ttl_days,
        }
    }

    /// Config with the default lifetimes.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_days: DEFAULT_REFRESH_TTL_DAYS,
        }
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// JWT claims embedded in every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    pub username: String,
    pub role: Role,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Unique token identifier (UUID v4).
    pub jti: String,
}

/// Verified contents of an access token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessClaims {
    pub user_id: DbId,
    pub username: String,
    pub role: Role,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub token_id: String,
}

impl AccessClaims {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl TryFrom<Claims> for AccessClaims {
    type Error = TokenError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(TokenError::Invalid)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Invalid)?;
        Ok(Self {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
            issued_at,
            expires_at,
            token_id: claims.jti,
        })
    }
}

/// Why an access token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Signature is valid but `exp` has passed.
    #[error("token expired")]
    Expired,
    /// Bad signature, malformed token, or unusable claims.
    #[error("invalid token")]
    Invalid,
}

// ---------------------------------------------------------------------------
// Subject
// ---------------------------------------------------------------------------

/// The identity a token pair is issued for. Construction validates inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSubject {
    user_id: DbId,
    username: String,
    role: Role,
}

impl TokenSubject {
    pub fn new(user_id: DbId, username: impl Into<String>, role: Role) -> Result<Self, CoreError> {
        if user_id <= 0 {
            return Err(CoreError::Validation(format!(
                "Token subject id must be positive, got {user_id}"
            )));
        }
        let username = username.into();
        if username.trim().is_empty() {
            return Err(CoreError::Validation(
                "Token subject username must not be empty".into(),
            ));
        }
        Ok(Self {
            user_id,
            username,
            role,
        })
    }

    pub fn from_identity(identity: &Identity) -> Result<Self, CoreError> {
        Self::new(identity.id, identity.username.clone(), identity.role())
    }

    /// Build a subject from an untyped `{id, username, is_admin}` object.
    ///
    /// Each field must have the expected JSON type; anything else is a
    /// `CoreError::Validation`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        let object = value
            .as_object()
            .ok_or_else(|| CoreError::Validation("Token subject must be an object".into()))?;

        let user_id = object
            .get("id")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| CoreError::Validation("Token subject id must be an integer".into()))?;
        let username = object
            .get("username")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                CoreError::Validation("Token subject username must be a string".into())
            })?;
        let is_admin = object
            .get("is_admin")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| {
                CoreError::Validation("Token subject is_admin must be a boolean".into())
            })?;

        Self::new(user_id, username, Role::from_admin_flag(is_admin))
    }

    pub fn user_id(&self) -> DbId {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Output of [`TokenFactory::issue`].
///
/// `refresh_token` goes to the client; `refresh_token_hash` is what gets
/// persisted.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub refresh_token: String,
    pub refresh_token_hash: String,
    pub refresh_expires_at: Timestamp,
}

/// Signs and verifies access tokens and mints refresh tokens.
#[derive(Clone)]
pub struct TokenFactory {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl_secs: i64,
    refresh_ttl: chrono::Duration,
}

impl TokenFactory {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl: chrono::Duration::days(config.refresh_ttl_days),
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Issue an access/refresh pair for `subject`, valid from now.
    pub fn issue(&self, subject: &TokenSubject) -> Result<IssuedTokens, CoreError> {
        self.issue_at(subject, Utc::now())
    }

    /// Issue a pair as if the current time were `now`.
    pub fn issue_at(
        &self,
        subject: &TokenSubject,
        now: Timestamp,
    ) -> Result<IssuedTokens, CoreError> {
        let iat = now.timestamp();
        let claims = Claims {
            sub: subject.user_id,
            username: subject.username.clone(),
            role: subject.role,
            iat,
            exp: iat + self.access_ttl_secs,
            jti: Uuid::new_v4().to_string(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CoreError::Internal(format!("Token signing failed: {e}")))?;

        let refresh_token = generate_refresh_token();
        let refresh_token_hash = hash_refresh_token(&refresh_token);

        Ok(IssuedTokens {
            access_token,
            expires_in: self.access_ttl_secs,
            refresh_token,
            refresh_token_hash,
            refresh_expires_at: now + self.refresh_ttl,
        })
    }

    /// Check signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        AccessClaims::try_from(data.claims)
    }
}

/// Generate a refresh token: 32 random bytes from the thread CSPRNG, hex encoded.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex_encode(bytes)
}

/// SHA-256 hex digest of a refresh token, as stored in `refresh_tokens`.
pub fn hash_refresh_token(token: &str) -> String {
    sha256_hex(token.as_bytes())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig::with_secret("test-secret-that-is-long-enough-for-hmac")
    }

    fn subject(role: Role) -> TokenSubject {
        TokenSubject::new(42, "ada", role).unwrap()
    }

    #[test]
    fn issued_access_token_verifies() {
        let factory = TokenFactory::new(&test_config());
        let issued = factory.issue(&subject(Role::Admin)).unwrap();

        let claims = factory.verify(&issued.access_token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.username, "ada");
        assert!(claims.is_admin());
        assert_eq!(
            (claims.expires_at - claims.issued_at).num_seconds(),
            DEFAULT_ACCESS_TTL_SECS
        );
        assert_eq!(issued.expires_in, 300);
    }

    #[test]
    fn refresh_token_is_64_hex_chars_and_hash_matches() {
        let factory = TokenFactory::new(&test_config());
        let issued = factory.issue(&subject(Role::Member)).unwrap();

        assert_eq!(issued.refresh_token.len(), 64);
        assert!(issued.refresh_token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(issued.refresh_token_hash, hash_refresh_token(&issued.refresh_token));
        assert_ne!(issued.refresh_token_hash, issued.refresh_token);
    }

    #[test]
    fn refresh_expiry_is_thirty_days_out() {
        let factory = TokenFactory::new(&test_config());
        let now = Utc::now();
        let issued = factory.issue_at(&subject(Role::Member), now).unwrap();

        assert_eq!((issued.refresh_expires_at - now).num_days(), 30);
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_refresh_token("abc"), hash_refresh_token("abc"));
        assert_eq!(
            hash_refresh_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn refresh_tokens_are_unique() {
        assert_ne!(generate_refresh_token(), generate_refresh_token());
    }

    #[test]
    fn expired_token_reports_expired() {
        let factory = TokenFactory::new(&test_config());
        let ten_minutes_ago = Utc::now() - chrono::Duration::minutes(10);
        let issued = factory.issue_at(&subject(Role::Member), ten_minutes_ago).unwrap();

        assert_eq!(factory.verify(&issued.access_token), Err(TokenError::Expired));
    }

    #[test]
    fn foreign_secret_reports_invalid() {
        let ours = TokenFactory::new(&test_config());
        let theirs = TokenFactory::new(&JwtConfig::with_secret("some-other-secret"));
        let issued = theirs.issue(&subject(Role::Admin)).unwrap();

        assert_eq!(ours.verify(&issued.access_token), Err(TokenError::Invalid));
    }

    #[test]
    fn garbage_reports_invalid() {
        let factory = TokenFactory::new(&test_config());
        assert_eq!(factory.verify("not-a-jwt"), Err(TokenError::Invalid));
        assert_eq!(factory.verify(""), Err(TokenError::Invalid));
    }

    #[test]
    fn subject_rejects_bad_values() {
        assert_matches!(
            TokenSubject::new(0, "ada", Role::Member),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            TokenSubject::new(1, "   ", Role::Member),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn subject_from_json_checks_types() {
        let ok = TokenSubject::from_json(&json!({"id": 7, "username": "grace", "is_admin": false}))
            .unwrap();
        assert_eq!(ok.user_id(), 7);
        assert_eq!(ok.role(), Role::Member);

        for bad in [
            json!({"id": "7", "username": "grace", "is_admin": false}),
            json!({"id": 7, "username": 12, "is_admin": false}),
            json!({"id": 7, "username": "grace", "is_admin": "yes"}),
            json!({"id": 7, "username": "grace"}),
            json!([7, "grace", false]),
        ] {
            assert_matches!(TokenSubject::from_json(&bad), Err(CoreError::Validation(_)));
        }
    }
}
