//! In-memory `RemoteStore` with scripted failures.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{json, Value};

use worksync_core::{WorkItem, WorkItemId};
use worksync_remote::{RateLimitInfo, RemoteFailure, RemoteRef, RemoteStore};

#[derive(Default)]
struct Inner {
    items: BTreeMap<WorkItemId, WorkItem>,
    closed: Vec<WorkItemId>,
    /// Failures handed out, one per call, before calls start succeeding.
    script: VecDeque<RemoteFailure>,
    /// Failures for every call touching one item.
    always_fail: BTreeMap<WorkItemId, RemoteFailure>,
    calls: Vec<String>,
    next_number: u64,
    remaining: u32,
    reset_at: Option<DateTime<Utc>>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                remaining: 5_000,
                ..Inner::default()
            }),
        }
    }

    /// Fail the next `failures.len()` calls with these failures, in order.
    pub fn fail_next(&self, failures: impl IntoIterator<Item = RemoteFailure>) {
        self.inner.lock().unwrap().script.extend(failures);
    }

    pub fn always_fail(&self, id: &str, failure: RemoteFailure) {
        self.inner
            .lock()
            .unwrap()
            .always_fail
            .insert(WorkItemId::from(id), failure);
    }

    pub fn set_rate_limit(&self, remaining: u32, reset_in: ChronoDuration) {
        let mut inner = self.inner.lock().unwrap();
        inner.remaining = remaining;
        inner.reset_at = Some(Utc::now() + reset_in);
    }

    pub fn seed(&self, items: &[WorkItem]) {
        let mut inner = self.inner.lock().unwrap();
        for item in items {
            inner.items.insert(item.id.clone(), item.clone());
        }
    }

    /// Every call made, e.g. `create:A`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn items(&self) -> Vec<WorkItem> {
        self.inner.lock().unwrap().items.values().cloned().collect()
    }

    pub fn closed(&self) -> Vec<WorkItemId> {
        self.inner.lock().unwrap().closed.clone()
    }

    fn begin(&self, call: String, id: Option<&WorkItemId>) -> Result<(), RemoteFailure> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        if let Some(failure) = id.and_then(|id| inner.always_fail.get(id)).cloned() {
            return Err(failure);
        }
        match inner.script.pop_front() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_items(&self) -> Result<Vec<WorkItem>, RemoteFailure> {
        self.begin("list".into(), None)?;
        Ok(self.items())
    }

    async fn create_item(&self, item: &WorkItem) -> Result<RemoteRef, RemoteFailure> {
        self.begin(format!("create:{}", item.id), Some(&item.id))?;
        let mut inner = self.inner.lock().unwrap();
        inner.next_number += 1;
        let number = inner.next_number;
        inner.items.insert(item.id.clone(), item.clone());
        Ok(RemoteRef {
            id: item.id.clone(),
            number,
            url: None,
        })
    }

    async fn update_item(&self, item: &WorkItem) -> Result<RemoteRef, RemoteFailure> {
        self.begin(format!("update:{}", item.id), Some(&item.id))?;
        let mut inner = self.inner.lock().unwrap();
        inner.items.insert(item.id.clone(), item.clone());
        Ok(RemoteRef {
            id: item.id.clone(),
            number: 0,
            url: None,
        })
    }

    async fn close_item(&self, id: &WorkItemId) -> Result<(), RemoteFailure> {
        self.begin(format!("close:{id}"), Some(id))?;
        let mut inner = self.inner.lock().unwrap();
        inner.items.remove(id);
        inner.closed.push(id.clone());
        Ok(())
    }

    async fn graphql(&self, query: &str, variables: &Value) -> Result<Value, RemoteFailure> {
        self.begin("graphql".into(), None)?;
        Ok(json!({ "query": query, "variables": variables }))
    }

    async fn rate_limit(&self) -> Result<RateLimitInfo, RemoteFailure> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("rate_limit".into());
        let reset_at = inner
            .reset_at
            .unwrap_or_else(|| Utc::now() + ChronoDuration::hours(1));
        let info = RateLimitInfo {
            limit: 5_000,
            remaining: inner.remaining,
            reset_at,
            used: 5_000u32.saturating_sub(inner.remaining),
        };
        // The window resets once observed exhausted.
        if inner.remaining == 0 {
            inner.remaining = 5_000;
        }
        Ok(info)
    }
}
