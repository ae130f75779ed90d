//! Operation state tracking with content-digest idempotency records.
//!
//! One [`OperationState`] per idempotent unit of work. A record is written
//! only after the guarded operation succeeds, so a failure is retried on the
//! next run. Records never expire; callers clear them explicitly.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content_hash::hash_value;
use crate::error::SyncError;
use crate::snapshot;

/// The last successful completion of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationState {
    pub operation_id: String,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

/// Serialized form of a [`StateTracker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StateSnapshot {
    #[serde(default)]
    pub operations: Vec<OperationState>,
}

/// In-memory map from operation id to its last recorded state.
///
/// Constructed once by the caller and passed by `&mut` through a run.
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    operations: HashMap<String, OperationState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if `id` has no record or its recorded digest differs from
    /// the digest of `content`.
    pub fn has_changed<T: Serialize + ?Sized>(
        &self,
        id: &str,
        content: &T,
    ) -> Result<bool, SyncError> {
        let Some(state) = self.operations.get(id) else {
            return Ok(true);
        };
        Ok(state.hash != hash_value(content)?)
    }

    /// Record (or overwrite) the completion of `id` with the digest of `content`.
    pub fn record_operation<T: Serialize + ?Sized>(
        &mut self,
        id: &str,
        content: &T,
        metadata: BTreeMap<String, Value>,
    ) -> Result<&OperationState, SyncError> {
        let state = OperationState {
            operation_id: id.to_string(),
            hash: hash_value(content)?,
            timestamp: Utc::now(),
            metadata,
        };
        self.operations.insert(id.to_string(), state);
        Ok(&self.operations[id])
    }

    pub fn get(&self, id: &str) -> Option<&OperationState> {
        self.operations.get(id)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn clear(&mut self, id: &str) -> Option<OperationState> {
        self.operations.remove(id)
    }

    pub fn clear_all(&mut self) {
        self.operations.clear();
    }

    /// Snapshot of every record, sorted by operation id.
    pub fn export(&self) -> StateSnapshot {
        let mut operations: Vec<_> = self.operations.values().cloned().collect();
        operations.sort_by(|a, b| a.operation_id.cmp(&b.operation_id));
        StateSnapshot { operations }
    }

    /// Replace every record with the contents of `snapshot`.
    pub fn import(&mut self, snapshot: StateSnapshot) {
        self.operations = snapshot
            .operations
            .into_iter()
            .map(|state| (state.operation_id.clone(), state))
            .collect();
    }

    /// Load `<home>/.worksync/state/operations.json`; empty if absent.
    pub fn load_at(home: &Path) -> Result<Self, SyncError> {
        let snapshot: StateSnapshot = snapshot::load_json(&snapshot::operations_path_at(home))?;
        let mut tracker = Self::new();
        tracker.import(snapshot);
        Ok(tracker)
    }

    pub fn save_at(&self, home: &Path) -> Result<(), SyncError> {
        snapshot::save_json(&snapshot::operations_path_at(home), &self.export())
    }
}

/// `true` when `id` already completed with identical `content`.
pub fn should_skip_operation<T: Serialize + ?Sized>(
    tracker: &StateTracker,
    id: &str,
    content: &T,
) -> Result<bool, SyncError> {
    Ok(!tracker.has_changed(id, content)?)
}

/// Record a successful completion. Call only after the operation succeeded.
pub fn record_operation_completion<T: Serialize + ?Sized>(
    tracker: &mut StateTracker,
    id: &str,
    content: &T,
    metadata: BTreeMap<String, Value>,
) -> Result<(), SyncError> {
    tracker.record_operation(id, content, metadata)?;
    Ok(())
}

/// Result of one operation in a guarded batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardedOutcome<E> {
    /// Content unchanged since the last recorded completion.
    Skipped,
    /// Executed successfully and recorded.
    Executed,
    /// Executed and failed; not recorded, so the next run retries it.
    Failed(E),
}

impl<E> GuardedOutcome<E> {
    pub fn is_failed(&self) -> bool {
        matches!(self, GuardedOutcome::Failed(_))
    }
}

/// Run a batch of independent operations, skipping those whose content is
/// unchanged and recording only the ones that succeed.
///
/// A failing operation does not stop the batch.
pub fn run_guarded<I, C, E, F>(
    tracker: &mut StateTracker,
    operations: I,
    mut execute: F,
) -> Result<Vec<(String, GuardedOutcome<E>)>, SyncError>
where
    I: IntoIterator<Item = (String, C)>,
    C: Serialize,
    F: FnMut(&str, &C) -> Result<(), E>,
{
    let mut outcomes = Vec::new();
    for (id, content) in operations {
        if should_skip_operation(tracker, &id, &content)? {
            tracing::debug!("skipping unchanged operation {id}");
            outcomes.push((id, GuardedOutcome::Skipped));
            continue;
        }
        match execute(&id, &content) {
            Ok(()) => {
                record_operation_completion(tracker, &id, &content, BTreeMap::new())?;
                outcomes.push((id, GuardedOutcome::Executed));
            }
            Err(err) => {
                tracing::warn!("operation {id} failed; leaving unrecorded");
                outcomes.push((id, GuardedOutcome::Failed(err)));
            }
        }
    }
    Ok(outcomes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
