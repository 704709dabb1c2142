//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&DataStore` as the first argument, so every statement goes through the
//! retry-wrapped gateway.

pub mod identity_repo;
pub mod refresh_token_repo;

pub use identity_repo::IdentityRepo;
pub use refresh_token_repo::RefreshTokenRepo;
