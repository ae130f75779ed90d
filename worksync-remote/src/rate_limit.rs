//! Advisory rate-limit budget checks.
//!
//! These helpers only look at the budget the remote reports; they do not
//! replace the executor's retry path, which still absorbs soft rate-limit
//! rejections returned mid-flight.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;
use crate::executor::RemoteExecutor;
use crate::store::RemoteStore;

/// Remaining call budget as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub used: u32,
}

impl RateLimitInfo {
    pub fn allows(&self, required: u32) -> bool {
        self.remaining >= required
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Time left until `reset_at`, zero if it already passed.
    pub fn until_reset(&self, now: DateTime<Utc>) -> Duration {
        (self.reset_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// `true` when at least `required` calls remain.
pub async fn check_rate_limit<S>(
    executor: &RemoteExecutor,
    store: &S,
    required: u32,
) -> Result<bool, ExecutorError>
where
    S: RemoteStore + ?Sized,
{
    let info = executor.execute("rate_limit", || store.rate_limit()).await?;
    Ok(info.allows(required))
}

/// Like [`check_rate_limit`], but fails with
/// [`ExecutorError::RateLimitExceeded`] instead of returning `false`.
pub async fn ensure_rate_limit<S>(
    executor: &RemoteExecutor,
    store: &S,
    required: u32,
) -> Result<RateLimitInfo, ExecutorError>
where
    S: RemoteStore + ?Sized,
{
    let info = executor.execute("rate_limit", || store.rate_limit()).await?;
    if !info.allows(required) {
        return Err(ExecutorError::RateLimitExceeded {
            required,
            remaining: info.remaining,
            reset_at: info.reset_at,
        });
    }
    Ok(info)
}

/// Sleep until the reset time if the budget is exhausted.
///
/// Returns the budget observed before any wait.
pub async fn wait_for_rate_limit<S>(
    executor: &RemoteExecutor,
    store: &S,
) -> Result<RateLimitInfo, ExecutorError>
where
    S: RemoteStore + ?Sized,
{
    let info = executor.execute("rate_limit", || store.rate_limit()).await?;
    if info.is_exhausted() {
        let wait = info.until_reset(Utc::now());
        tracing::info!(
            reset_at = %info.reset_at,
            wait_ms = wait.as_millis() as u64,
            "rate limit exhausted; waiting for reset"
        );
        tokio::time::sleep(wait).await;
    }
    Ok(info)
}
