//! Row models and create DTOs.
//!
//! Each model decodes itself from a gateway [`Row`](crate::value::Row).

pub mod identity;
pub mod refresh_token;
