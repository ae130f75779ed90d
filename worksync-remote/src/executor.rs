//! Retry engine wrapped around every remote call.
//!
//! ## Attempt loop
//!
//! 1. Run the operation.
//! 2. Success → return the value.
//! 3. Terminal failure (4xx, see [`RemoteFailure::terminal_status`]) →
//!    [`ExecutorError::Terminal`] immediately.
//! 4. Transient failure with budget left → sleep `delay_for(retry)`, retry.
//! 5. Budget spent → [`ExecutorError::RetryExhausted`] with the last cause.
//!
//! Sleeps are `tokio::time::sleep`, the only suspension points; the
//! executor holds no cancellation token, so callers wanting a deadline race
//! the returned future against `tokio::time::timeout`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use worksync_core::RetryConfig;

use crate::error::{ExecutorError, RemoteFailure};
use crate::store::RemoteStore;

/// Backoff schedule and retry budget.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Jitter is drawn from `[0, jitter_ratio * delay)`.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: cfg.base_delay(),
            max_delay: cfg.max_delay(),
            jitter_ratio: cfg.jitter_ratio,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (0-based): `base * 2^retry` plus
    /// `unit * jitter_ratio` of that, capped at `max_delay`. `unit` is a
    /// sample from `[0, 1)`.
    pub fn delay_for(&self, retry: u32, unit: f64) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_delay);
        let ratio = self.jitter_ratio.max(0.0) * unit.clamp(0.0, 1.0);
        // Non-finite or oversized jitter caps at max_delay.
        match Duration::try_from_secs_f64(exponential.as_secs_f64() * ratio) {
            Ok(jitter) => exponential.saturating_add(jitter).min(self.max_delay),
            Err(_) => self.max_delay,
        }
    }
}

type JitterSource = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Executes remote operations under a [`RetryPolicy`].
///
/// Cheap to clone; construct once per run and share by reference.
#[derive(Clone)]
pub struct RemoteExecutor {
    policy: RetryPolicy,
    jitter: JitterSource,
}

impl fmt::Debug for RemoteExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteExecutor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for RemoteExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RemoteExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            jitter: Arc::new(rand::random::<f64>),
        }
    }

    /// Replace the jitter sampler; tests pin it to make delays exact.
    pub fn with_jitter(mut self, sample: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        self.jitter = Arc::new(sample);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` until it succeeds, fails terminally, or the retry budget
    /// is spent. `operation` names the call in errors and logs.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ExecutorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteFailure>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let failure = match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation, attempt, "remote call recovered");
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            if let Some(status) = failure.terminal_status() {
                tracing::warn!(operation, status, error = %failure, "remote call failed terminally");
                return Err(ExecutorError::Terminal {
                    operation: operation.to_string(),
                    status,
                    source: failure,
                });
            }

            if attempt > self.policy.max_retries {
                tracing::warn!(operation, attempts = attempt, error = %failure, "retries exhausted");
                return Err(ExecutorError::RetryExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: failure,
                });
            }

            let delay = self.policy.delay_for(attempt - 1, (self.jitter)());
            tracing::warn!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                status = ?failure.status,
                error = %failure,
                "remote call failed; retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// GraphQL variant: routes `query` + `variables` through the same retry engine.
    pub async fn graphql<S>(&self, store: &S, query: &str, variables: &Value) -> Result<Value, ExecutorError>
    where
        S: RemoteStore + ?Sized,
    {
        self.execute("graphql", || store.graphql(query, variables)).await
    }
}
