use chrono::{DateTime, Utc};
use thiserror::Error;

use worksync_sync::SyncError;

/// A failed remote call, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.status, .message))]
pub struct RemoteFailure {
    /// HTTP-like status; `None` for network-level failures.
    pub status: Option<u16>,
    pub message: String,
    /// Set when the remote signalled a secondary/soft rate limit.
    pub rate_limited: bool,
}

fn describe(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("status {code}: {message}"),
        None => message.to_string(),
    }
}

impl RemoteFailure {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            rate_limited: false,
        }
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            message: message.into(),
            rate_limited: false,
        }
    }

    /// A soft rate-limit rejection (e.g. 403 with a secondary-limit body).
    pub fn rate_limited(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            message: message.into(),
            rate_limited: true,
        }
    }

    /// Status of a failure that must not be retried.
    ///
    /// 4xx is terminal except 429 and anything flagged as a soft rate
    /// limit; 5xx and network failures are transient.
    pub fn terminal_status(&self) -> Option<u16> {
        match self.status {
            Some(code) if (400..500).contains(&code) && code != 429 && !self.rate_limited => {
                Some(code)
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_status().is_some()
    }
}

/// Errors surfaced by the executor and the push pipeline.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A 4xx-class failure; never retried.
    #[error("{operation} failed with status {status}: {source}")]
    Terminal {
        operation: String,
        status: u16,
        #[source]
        source: RemoteFailure,
    },

    /// Every attempt failed transiently.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: RemoteFailure,
    },

    /// Pre-flight check found too little call budget.
    #[error("rate limit too low: {remaining} calls left, {required} required (resets at {reset_at})")]
    RateLimitExceeded {
        required: u32,
        remaining: u32,
        reset_at: DateTime<Utc>,
    },

    /// Idempotency-record failure.
    #[error("state error: {0}")]
    State(#[from] SyncError),
}

impl ExecutorError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutorError::Terminal { .. })
    }

    /// `true` when a later run may succeed; callers typically queue these.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, ExecutorError::RetryExhausted { .. })
    }

    /// The underlying remote failure, if any.
    pub fn remote_failure(&self) -> Option<&RemoteFailure> {
        match self {
            ExecutorError::Terminal { source, .. } | ExecutorError::RetryExhausted { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}
