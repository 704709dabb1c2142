//! Deployment environment, selected by the `APP_ENV` variable.

use crate::error::CoreError;

/// Environment the process runs in.
///
/// Retry delays and test-only operations (bulk blob deletion) key off this
/// value, so it is resolved once at startup and passed explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnvironment {
    Production,
    #[default]
    Development,
    Test,
}

impl AppEnvironment {
    /// Parse an environment name (`production`, `development`, `test`).
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(CoreError::Validation(format!(
                "Unknown environment '{other}'. Must be one of: production, development, test"
            ))),
        }
    }

    /// Read `APP_ENV`, defaulting to development when unset.
    pub fn from_env() -> Result<Self, CoreError> {
        match std::env::var("APP_ENV") {
            Ok(name) => Self::from_name(&name),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn is_test(self) -> bool {
        self == Self::Test
    }
}
