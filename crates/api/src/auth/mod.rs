//! Authentication primitives.
//!
//! - [`tokens`] -- access-token signing/verification and refresh-token helpers.
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`session`] -- refresh-token session lifecycle.

pub mod password;
pub mod session;
pub mod tokens;
