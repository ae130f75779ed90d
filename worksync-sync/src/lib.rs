//! # worksync-sync
//!
//! Content identity, idempotent writes, and the reconciliation engine.
//!
//! Call [`merge`] (or [`Reconciler::merge`] when human edits must be
//! protected) to compute the next state to push; inspect the
//! [`DiffResult`] from [`diff`] to drive remote side effects. Use
//! [`write_idempotent`] for any generated artifact so unchanged content
//! never touches the disk.

pub mod content_hash;
pub mod differ;
pub mod error;
pub mod manual_edits;
pub mod reconcile;
pub mod snapshot;
pub mod state_tracker;
pub mod writer;

pub use content_hash::{hash_file, hash_json, hash_str, hash_value};
pub use differ::{apply_diff, are_equivalent, diff, DiffOptions, DiffResult, ModifiedItem};
pub use error::SyncError;
pub use manual_edits::{ManualEdit, ManualEditStore};
pub use reconcile::{merge, Reconciler, Reconciliation};
pub use state_tracker::{
    record_operation_completion, run_guarded, should_skip_operation, GuardedOutcome,
    OperationState, StateTracker,
};
pub use writer::{write_idempotent, WriteOptions};
