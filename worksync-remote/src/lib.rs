//! Resilient access to the remote record store.
//!
//! - [`executor`]: retry with exponential backoff and jitter around any remote call
//! - [`rate_limit`]: advisory budget checks and waiting for the reset window
//! - [`store`]: the [`RemoteStore`] capability a transport implements
//! - [`push`]: batched, idempotency-guarded application of a `DiffResult`

mod error;
pub mod executor;
pub mod push;
pub mod rate_limit;
pub mod store;

pub use error::{ExecutorError, RemoteFailure};
pub use executor::{RemoteExecutor, RetryPolicy};
pub use push::{apply_guarded, push_diff, BatchPolicy, PushAction, PushFailure, PushReport};
pub use rate_limit::{check_rate_limit, ensure_rate_limit, wait_for_rate_limit, RateLimitInfo};
pub use store::{RemoteRef, RemoteStore};
