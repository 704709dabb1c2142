//! Domain primitives shared by every jobtrail crate.
//!
//! This crate has no internal dependencies so the gateways, the session
//! layer and any future CLI tooling can all build on it.

pub mod environment;
pub mod error;
pub mod hashing;
pub mod retry;
pub mod roles;
pub mod types;
