//! Apply a `DiffResult` to the remote store.
//!
//! Added items are created, modified items updated, removed items closed.
//! Calls go out in batches of [`BatchPolicy::size`] with a pause between
//! batches. Each call is guarded by the [`StateTracker`]: an operation whose
//! content digest was already recorded is skipped, and only successful
//! calls are recorded, so a failed call is retried on the next run.
//!
//! Records of one item's opposing actions invalidate each other. A
//! successful create or update forgets the item's close, and a successful
//! close forgets its create and update, so an item may be closed, re-added
//! and closed again. Updates are keyed on the remote view they replace as
//! well as the view they write, so remote drift is pushed over. An item the
//! diff reports unchanged forgets its update record.
//!
//! Per-item failures never abort the push. Terminal failures are reported
//! in [`PushReport::failed`]; retry-exhausted ones in
//! [`PushReport::deferred`] for the caller to queue.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use worksync_core::{BatchConfig, WorkItem, WorkItemId};
use worksync_sync::differ::comparable_view;
use worksync_sync::{
    are_equivalent, record_operation_completion, should_skip_operation, DiffOptions, DiffResult,
    GuardedOutcome, StateTracker, SyncError,
};

use crate::error::{ExecutorError, RemoteFailure};
use crate::executor::RemoteExecutor;
use crate::rate_limit::wait_for_rate_limit;
use crate::store::RemoteStore;

/// Politeness batching for remote mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPolicy {
    pub size: usize,
    pub pause: Duration,
    /// Wait out an exhausted rate-limit budget before each batch.
    pub preflight_rate_limit: bool,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::from(&BatchConfig::default())
    }
}

impl From<&BatchConfig> for BatchPolicy {
    fn from(cfg: &BatchConfig) -> Self {
        Self {
            size: cfg.size,
            pause: cfg.pause(),
            preflight_rate_limit: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushAction {
    Create,
    Update,
    Close,
}

impl fmt::Display for PushAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushAction::Create => write!(f, "create"),
            PushAction::Update => write!(f, "update"),
            PushAction::Close => write!(f, "close"),
        }
    }
}

#[derive(Debug)]
pub struct PushFailure {
    pub id: WorkItemId,
    pub action: PushAction,
    pub error: ExecutorError,
}

/// What a push did, item by item.
#[derive(Debug, Default)]
pub struct PushReport {
    pub created: Vec<WorkItemId>,
    pub updated: Vec<WorkItemId>,
    pub closed: Vec<WorkItemId>,
    /// Already applied with identical content, or nothing to update.
    pub skipped: Vec<WorkItemId>,
    /// Terminal failures; retrying will not help without a change.
    pub failed: Vec<PushFailure>,
    /// Retry budget exhausted; worth queueing for a later run.
    pub deferred: Vec<PushFailure>,
}

impl PushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.deferred.is_empty()
    }
}

/// One remote mutation. Serializes to the content its idempotency
/// record is keyed on: action, identity, the compared fields being replaced
/// (updates only) and the compared fields being written.
#[derive(Debug, Clone, Serialize)]
struct PushOp {
    action: PushAction,
    id: WorkItemId,
    before: Value,
    view: Value,
    #[serde(skip)]
    item: WorkItem,
}

impl PushOp {
    fn new(
        action: PushAction,
        item: &WorkItem,
        before: Option<&WorkItem>,
        options: &DiffOptions,
    ) -> Self {
        let view = match action {
            PushAction::Close => Value::Null,
            PushAction::Create | PushAction::Update => comparable_view(item, options),
        };
        let before = before.map_or(Value::Null, |prior| comparable_view(prior, options));
        Self {
            action,
            id: item.id.clone(),
            before,
            view,
            item: item.clone(),
        }
    }

    fn operation_id(&self) -> String {
        operation_key(self.action, &self.id)
    }

    /// Records made stale once this operation succeeds.
    fn superseded(&self) -> Vec<String> {
        match self.action {
            PushAction::Create | PushAction::Update => {
                vec![operation_key(PushAction::Close, &self.id)]
            }
            PushAction::Close => vec![
                operation_key(PushAction::Create, &self.id),
                operation_key(PushAction::Update, &self.id),
            ],
        }
    }
}

fn operation_key(action: PushAction, id: &WorkItemId) -> String {
    format!("{action}:{id}")
}

/// Run independent remote operations through `executor`, skipping those
/// whose content is unchanged since their last recorded success.
pub async fn apply_guarded<C, T, F, Fut>(
    executor: &RemoteExecutor,
    tracker: &mut StateTracker,
    operations: Vec<(String, C)>,
    mut call: F,
) -> Result<Vec<(String, GuardedOutcome<ExecutorError>)>, SyncError>
where
    C: Serialize,
    F: FnMut(&str, &C) -> Fut,
    Fut: Future<Output = Result<T, RemoteFailure>>,
{
    let mut outcomes = Vec::with_capacity(operations.len());
    for (id, content) in operations {
        if should_skip_operation(tracker, &id, &content)? {
            tracing::debug!(operation = %id, "unchanged since last success; skipping");
            outcomes.push((id, GuardedOutcome::Skipped));
            continue;
        }
        match executor.execute(&id, || call(&id, &content)).await {
            Ok(_) => {
                record_operation_completion(tracker, &id, &content, BTreeMap::new())?;
                outcomes.push((id, GuardedOutcome::Executed));
            }
            Err(err) => outcomes.push((id, GuardedOutcome::Failed(err))),
        }
    }
    Ok(outcomes)
}

/// Push `diff` to `store` in batches. See the module docs for semantics.
pub async fn push_diff<S>(
    executor: &RemoteExecutor,
    store: &S,
    diff: &DiffResult,
    tracker: &mut StateTracker,
    options: &DiffOptions,
    batch: &BatchPolicy,
) -> Result<PushReport, ExecutorError>
where
    S: RemoteStore + ?Sized,
{
    let mut report = PushReport::default();
    // Remote already matches; any later divergence is new drift.
    for item in &diff.unchanged {
        tracker.clear(&operation_key(PushAction::Update, &item.id));
    }

    let mut ops = Vec::new();
    for item in &diff.added {
        ops.push(PushOp::new(PushAction::Create, item, None, options));
    }
    for modified in &diff.modified {
        if are_equivalent(&modified.before, &modified.after, options) {
            report.skipped.push(modified.after.id.clone());
            continue;
        }
        ops.push(PushOp::new(
            PushAction::Update,
            &modified.after,
            Some(&modified.before),
            options,
        ));
    }
    for item in &diff.removed {
        ops.push(PushOp::new(PushAction::Close, item, None, options));
    }

    for (index, chunk) in ops.chunks(batch.size.max(1)).enumerate() {
        if index > 0 && !batch.pause.is_zero() {
            tokio::time::sleep(batch.pause).await;
        }
        if batch.preflight_rate_limit {
            wait_for_rate_limit(executor, store).await?;
        }

        let guarded: Vec<(String, PushOp)> = chunk
            .iter()
            .map(|op| (op.operation_id(), op.clone()))
            .collect();
        let outcomes =
            apply_guarded(executor, tracker, guarded, |_, op| dispatch(store, op.clone())).await?;

        for (op, (_, outcome)) in chunk.iter().zip(outcomes) {
            match outcome {
                GuardedOutcome::Skipped => report.skipped.push(op.id.clone()),
                GuardedOutcome::Executed => {
                    tracing::info!(action = %op.action, id = %op.id, "pushed");
                    for stale in op.superseded() {
                        tracker.clear(&stale);
                    }
                    match op.action {
                        PushAction::Create => report.created.push(op.id.clone()),
                        PushAction::Update => report.updated.push(op.id.clone()),
                        PushAction::Close => report.closed.push(op.id.clone()),
                    }
                }
                GuardedOutcome::Failed(error) => {
                    let failure = PushFailure {
                        id: op.id.clone(),
                        action: op.action,
                        error,
                    };
                    if failure.error.is_retry_exhausted() {
                        report.deferred.push(failure);
                    } else {
                        report.failed.push(failure);
                    }
                }
            }
        }
    }

    Ok(report)
}

async fn dispatch<S>(store: &S, op: PushOp) -> Result<(), RemoteFailure>
where
    S: RemoteStore + ?Sized,
{
    match op.action {
        PushAction::Create => store.create_item(&op.item).await.map(|_| ()),
        PushAction::Update => store.update_item(&op.item).await.map(|_| ()),
        PushAction::Close => store.close_item(&op.id).await,
    }
}
