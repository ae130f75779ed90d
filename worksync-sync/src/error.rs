//! Error types for worksync-sync.

use std::path::PathBuf;

use thiserror::Error;

use worksync_core::CoreError;

/// All errors that can arise from hashing, writing, and state persistence.
///
/// Reconciliation itself never fails: duplicate identities coalesce and
/// stale manual edits are released rather than reported.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from config or domain handling.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// A filesystem failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (hashing input, state snapshots).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
