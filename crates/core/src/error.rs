/// Domain error shared across the gateways and the session layer.
///
/// HTTP mapping lives in the api crate; this type only names the failure
/// class so every layer can propagate it with `?`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad credentials or an unusable token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Valid identity, insufficient role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// An external store kept failing after the retry budget was spent.
    ///
    /// The underlying cause is logged where it happened and never carried
    /// here, so it cannot leak to clients.
    #[error("Infrastructure unavailable: {resource}")]
    Infrastructure { resource: &'static str },

    #[error("Internal error: {0}")]
    Internal(String),
}
