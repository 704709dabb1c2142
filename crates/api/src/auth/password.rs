//! Argon2id password hashing and the credential-verification seam.
//!
//! Hashes use the PHC string format so algorithm parameters and salt travel
//! with the hash itself.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use jobtrail_core::error::CoreError;

/// Checks a plaintext password against a stored hash.
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(false)` for a wrong password; `Err` only when the stored hash
    /// cannot be used at all.
    fn verify(&self, plaintext: &str, stored_hash: &str) -> Result<bool, CoreError>;
}

/// [`CredentialVerifier`] for Argon2id PHC hashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

impl CredentialVerifier for Argon2Verifier {
    fn verify(&self, plaintext: &str, stored_hash: &str) -> Result<bool, CoreError> {
        verify_password(plaintext, stored_hash)
            .map_err(|e| CoreError::Internal(format!("Password verification error: {e}")))
    }
}

/// Hash a plaintext password using Argon2id with a random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a PHC-formatted Argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}
