//! Bounded retry for calls into external stores.
//!
//! Both the relational gateway and the blob gateway funnel every call
//! through [`retry_if`], so the attempt-count guarantee lives in one place:
//! a call that fails `k` times and then succeeds was invoked `k + 1` times,
//! and a call that never succeeds was invoked exactly
//! [`RetryPolicy::max_attempts`] times.
//!
//! Attempts run one after another on the calling task. The wait between
//! attempts is a `tokio::time::sleep`, so only the caller is suspended.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::environment::AppEnvironment;
use crate::error::CoreError;

/// Default number of attempts per call (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default wait between attempts outside the test environment.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// Wait between attempts in the test environment.
pub const TEST_DELAY: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// How long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// The same delay after every failed attempt.
    Fixed(Duration),
    /// Delay grows by `multiplier` after each failure, clamped to `max`.
    Exponential {
        initial: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl Backoff {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential {
                initial,
                multiplier,
                max,
            } => {
                let mut delay = initial.min(max);
                for _ in 1..attempt {
                    delay = next_delay(delay, multiplier, max);
                }
                delay
            }
        }
    }
}

fn next_delay(current: Duration, multiplier: f64, max: Duration) -> Duration {
    let next_ms = (current.as_millis() as f64 * multiplier) as u64;
    Duration::from_millis(next_ms).min(max)
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Attempt budget plus backoff, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Build a policy. `max_attempts` counts the first try and must be >= 1.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Result<Self, CoreError> {
        if max_attempts == 0 {
            return Err(CoreError::Validation(
                "Retry policy requires at least one attempt".into(),
            ));
        }
        Ok(Self {
            max_attempts,
            backoff,
        })
    }

    /// Shorthand for a fixed-delay policy.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Result<Self, CoreError> {
        Self::new(max_attempts, Backoff::Fixed(delay))
    }

    /// The default policy for an environment: 3 attempts, 1 s apart, or
    /// 10 ms apart under test.
    pub fn for_environment(env: AppEnvironment) -> Self {
        let delay = if env.is_test() {
            TEST_DELAY
        } else {
            DEFAULT_DELAY
        };
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_environment(AppEnvironment::Production)
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Why a retried call gave up. Both variants carry the last error unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempt(s): {error}")]
    Exhausted { attempts: u32, error: E },

    /// An attempt failed with an error that retrying cannot fix.
    #[error("non-retryable failure on attempt {attempt}: {error}")]
    Permanent { attempt: u32, error: E },
}

impl<E> RetryError<E> {
    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Permanent { attempt, .. } => *attempt,
        }
    }

    pub fn error(&self) -> &E {
        match self {
            Self::Exhausted { error, .. } | Self::Permanent { error, .. } => error,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { error, .. } | Self::Permanent { error, .. } => error,
        }
    }
}

// ---------------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------------

/// Run `operation` under `policy`, retrying every failure.
///
/// `label` names the call in log output.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_if(policy, label, operation, |_| true).await
}

/// Run `operation` under `policy`, retrying only failures for which
/// `is_retryable` returns `true`.
pub async fn retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
    is_retryable: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(label, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if !is_retryable(&error) => {
                tracing::warn!(label, attempt, error = %error, "Non-retryable failure");
                return Err(RetryError::Permanent { attempt, error });
            }
            Err(error) if attempt >= max_attempts => {
                tracing::error!(
                    label,
                    attempts = attempt,
                    error = %error,
                    "Operation failed after all retries",
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    error,
                });
            }
            Err(error) => {
                let delay = policy.backoff.delay_after(attempt);
                tracing::warn!(
                    label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Attempt failed, retrying",
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
