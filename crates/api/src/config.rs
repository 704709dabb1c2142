use std::time::Duration;

use jobtrail_core::environment::AppEnvironment;
use jobtrail_core::error::CoreError;
use jobtrail_core::retry::{RetryPolicy, DEFAULT_DELAY, DEFAULT_MAX_ATTEMPTS, TEST_DELAY};

use crate::auth::tokens::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Deployment environment (`APP_ENV`).
    pub environment: AppEnvironment,
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Token signing secret and lifetimes.
    pub jwt: JwtConfig,
    /// Retry budget for database and blob calls.
    pub retry: RetrySettings,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `APP_ENV`              | `development`           |
    /// | `HOST`                 | `0.0.0.0`               |
    /// | `PORT`                 | `3000`                  |
    /// | `CORS_ORIGINS`         | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                    |
    ///
    /// See [`JwtConfig::from_env`] and [`RetrySettings::from_env`] for the
    /// nested settings.
    pub fn from_env() -> Self {
        let environment =
            AppEnvironment::from_env().expect("APP_ENV must name a known environment");

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            environment,
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
            retry: RetrySettings::from_env(environment),
        }
    }
}

/// Attempt budget and fixed delay shared by both gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetrySettings {
    /// Defaults for an environment: 3 attempts, 1000 ms apart (10 ms in test).
    pub fn for_environment(environment: AppEnvironment) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: if environment.is_test() {
                TEST_DELAY
            } else {
                DEFAULT_DELAY
            },
        }
    }

    /// Environment defaults overridden by environment variables.
    ///
    /// | Env Var              | Default                     |
    /// |----------------------|-----------------------------|
    /// | `RETRY_MAX_ATTEMPTS` | `3`                         |
    /// | `RETRY_DELAY_MS`     | `1000` (`10` when `APP_ENV=test`) |
    pub fn from_env(environment: AppEnvironment) -> Self {
        let defaults = Self::for_environment(environment);

        let max_attempts = std::env::var("RETRY_MAX_ATTEMPTS")
            .map(|v| v.parse().expect("RETRY_MAX_ATTEMPTS must be a valid u32"))
            .unwrap_or(defaults.max_attempts);

        let delay = std::env::var("RETRY_DELAY_MS")
            .map(|v| {
                Duration::from_millis(v.parse().expect("RETRY_DELAY_MS must be a valid u64"))
            })
            .unwrap_or(defaults.delay);

        Self {
            max_attempts,
            delay,
        }
    }

    /// Build the policy. Fails if `max_attempts` is zero.
    pub fn policy(&self) -> Result<RetryPolicy, CoreError> {
        RetryPolicy::fixed(self.max_attempts, self.delay)
    }
}
