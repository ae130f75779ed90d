//! Manual-edit preservation.
//!
//! A [`ManualEdit`] protects one field of one item after a human changed it
//! on the remote side. Protection lasts while the remote value still hashes
//! to the digest captured with the edit; once the value moves on, the edit
//! is released and the generator's proposal goes through again.
//!
//! Edits are keyed by `(item id, field)`. The store is single-owner: methods
//! that mutate take `&mut self`, so concurrent access to the same key is
//! serialized by the borrow checker. Callers fanning out across disjoint
//! items can give each task its own store and merge the exports.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use worksync_core::{Field, WorkItem, WorkItemId};

use crate::content_hash::hash_json;
use crate::differ::{changed_fields, normalized, DiffOptions};
use crate::error::SyncError;
use crate::snapshot;

/// A human override of one field on one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualEdit {
    pub item_id: WorkItemId,
    pub field: Field,
    /// Last generated value before the human changed it.
    pub original_value: Value,
    pub manual_value: Value,
    pub timestamp: DateTime<Utc>,
    /// Digest of `manual_value`, list fields sorted when the store compares
    /// them as unordered.
    pub content_hash: String,
}

/// Serialized form of a [`ManualEditStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ManualEditSnapshot {
    #[serde(default)]
    pub edits: Vec<ManualEdit>,
}

#[derive(Debug, Clone)]
pub struct ManualEditStore {
    edits: HashMap<(WorkItemId, Field), ManualEdit>,
    unordered_arrays: bool,
}

impl Default for ManualEditStore {
    fn default() -> Self {
        Self {
            edits: HashMap::new(),
            unordered_arrays: true,
        }
    }
}

impl ManualEditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a reordered list still counts as the captured manual value.
    /// Set from [`DiffOptions::unordered_arrays`] by the reconciler.
    pub fn set_unordered_arrays(&mut self, unordered: bool) {
        self.unordered_arrays = unordered;
    }

    fn digest(&self, field: Field, value: &Value) -> String {
        hash_json(&normalized(field, value.clone(), self.unordered_arrays))
    }

    /// Store (or replace) the edit for `field` of `item_id`.
    pub fn record_edit(
        &mut self,
        item_id: &WorkItemId,
        field: Field,
        original_value: Value,
        manual_value: Value,
    ) -> &ManualEdit {
        let edit = ManualEdit {
            item_id: item_id.clone(),
            field,
            content_hash: self.digest(field, &manual_value),
            original_value,
            manual_value,
            timestamp: Utc::now(),
        };
        let key = (item_id.clone(), field);
        self.edits.insert(key.clone(), edit);
        &self.edits[&key]
    }

    /// `true` iff an edit is recorded for the field and `current_value`
    /// still hashes to the captured manual value.
    pub fn has_manual_edit(&self, item_id: &WorkItemId, field: Field, current_value: &Value) -> bool {
        self.edits
            .get(&(item_id.clone(), field))
            .is_some_and(|edit| edit.content_hash == self.digest(field, current_value))
    }

    pub fn get(&self, item_id: &WorkItemId, field: Field) -> Option<&ManualEdit> {
        self.edits.get(&(item_id.clone(), field))
    }

    /// Edits recorded for `item_id`, in field order.
    pub fn edits_for(&self, item_id: &WorkItemId) -> Vec<&ManualEdit> {
        let mut found: Vec<_> = self
            .edits
            .values()
            .filter(|edit| &edit.item_id == item_id)
            .collect();
        found.sort_by_key(|edit| edit.field);
        found
    }

    /// Start from `desired` and keep every still-protected field from
    /// `current`. Edits whose remote value has moved on are cleared.
    pub fn preserve(&mut self, current: &WorkItem, desired: WorkItem, item_id: &WorkItemId) -> WorkItem {
        let mut result = desired;
        let fields: Vec<Field> = self.edits_for(item_id).iter().map(|e| e.field).collect();
        for field in fields {
            if self.has_manual_edit(item_id, field, &field.value(current)) {
                tracing::debug!("{item_id}: keeping manual {field}");
                field.copy(current, &mut result);
            } else {
                tracing::debug!("{item_id}: manual {field} was superseded; releasing");
                self.clear_edit(item_id, field);
            }
        }
        result
    }

    /// Record an edit for every compared field where `remote` differs from
    /// the last `generated` value of the same item. Fields already protected
    /// with the same manual value are left alone.
    ///
    /// Returns the number of edits recorded.
    pub fn observe(
        &mut self,
        generated: &[WorkItem],
        remote: &[WorkItem],
        options: &DiffOptions,
    ) -> usize {
        let generated_by_id: HashMap<&WorkItemId, &WorkItem> =
            generated.iter().map(|item| (&item.id, item)).collect();
        let mut recorded = 0;
        for seen in remote {
            let Some(produced) = generated_by_id.get(&seen.id) else {
                continue;
            };
            for field in changed_fields(produced, seen, options) {
                let manual_value = field.value(seen);
                if self.has_manual_edit(&seen.id, field, &manual_value) {
                    continue;
                }
                tracing::info!("{}: recording manual edit of {field}", seen.id);
                self.record_edit(&seen.id, field, field.value(produced), manual_value);
                recorded += 1;
            }
        }
        recorded
    }

    pub fn clear_edit(&mut self, item_id: &WorkItemId, field: Field) -> Option<ManualEdit> {
        self.edits.remove(&(item_id.clone(), field))
    }

    pub fn clear_item(&mut self, item_id: &WorkItemId) {
        self.edits.retain(|(id, _), _| id != item_id);
    }

    /// Forget every edit.
    pub fn reset(&mut self) {
        self.edits.clear();
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Every edit, sorted by item id then field.
    pub fn export(&self) -> ManualEditSnapshot {
        let mut edits: Vec<_> = self.edits.values().cloned().collect();
        edits.sort_by(|a, b| (&a.item_id, a.field).cmp(&(&b.item_id, b.field)));
        ManualEditSnapshot { edits }
    }

    /// Replace every edit with the contents of `snapshot`. Digests are
    /// recomputed under the store's list ordering.
    pub fn import(&mut self, snapshot: ManualEditSnapshot) {
        self.edits = snapshot
            .edits
            .into_iter()
            .map(|mut edit| {
                edit.content_hash = self.digest(edit.field, &edit.manual_value);
                ((edit.item_id.clone(), edit.field), edit)
            })
            .collect();
    }

    /// Load `<home>/.worksync/state/manual_edits.json`; empty if absent.
    pub fn load_at(home: &Path) -> Result<Self, SyncError> {
        let snapshot: ManualEditSnapshot =
            snapshot::load_json(&snapshot::manual_edits_path_at(home))?;
        let mut store = Self::new();
        store.import(snapshot);
        Ok(store)
    }

    pub fn save_at(&self, home: &Path) -> Result<(), SyncError> {
        snapshot::save_json(&snapshot::manual_edits_path_at(home), &self.export())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn id() -> WorkItemId {
        WorkItemId::from("A")
    }

    fn titled(title: &str) -> WorkItem {
        WorkItem::new("A", title)
    }

    #[test]
    fn has_manual_edit_requires_matching_value() {
        let mut store = ManualEditStore::new();
        store.record_edit(&id(), Field::Title, json!("A"), json!("B"));

        assert!(store.has_manual_edit(&id(), Field::Title, &json!("B")));
        assert!(!store.has_manual_edit(&id(), Field::Title, &json!("D")));
        assert!(!store.has_manual_edit(&id(), Field::Description, &json!("B")));
    }

    #[test]
    fn reordered_tags_stay_protected() {
        let mut store = ManualEditStore::new();
        store.record_edit(&id(), Field::Tags, json!(["a"]), json!(["x", "y"]));
        assert!(store.has_manual_edit(&id(), Field::Tags, &json!(["y", "x"])));

        let mut current = titled("A");
        current.tags = vec!["y".into(), "x".into()];
        let mut desired = titled("A");
        desired.tags = vec!["a".into()];
        let merged = store.preserve(&current, desired, &id());
        assert_eq!(merged.tags, vec!["y".to_string(), "x".to_string()]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn ordered_store_releases_reordered_tags() {
        let mut store = ManualEditStore::new();
        store.set_unordered_arrays(false);
        store.record_edit(&id(), Field::Tags, json!(["a"]), json!(["x", "y"]));
        assert!(store.has_manual_edit(&id(), Field::Tags, &json!(["x", "y"])));
        assert!(!store.has_manual_edit(&id(), Field::Tags, &json!(["y", "x"])));
    }

    #[test]
    fn record_replaces_per_field() {
        let mut store = ManualEditStore::new();
        store.record_edit(&id(), Field::Title, json!("A"), json!("B"));
        store.record_edit(&id(), Field::Title, json!("A"), json!("B2"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id(), Field::Title).unwrap().manual_value, json!("B2"));
    }

    #[test]
    fn protects_then_releases() {
        let mut store = ManualEditStore::new();
        store.record_edit(&id(), Field::Title, json!("A"), json!("B"));

        let kept = store.preserve(&titled("B"), titled("C"), &id());
        assert_eq!(kept.title, "B");
        assert_eq!(store.len(), 1);

        let released = store.preserve(&titled("D"), titled("C"), &id());
        assert_eq!(released.title, "C");
        assert!(store.is_empty(), "superseded edit must be cleared");
    }

    #[test]
    fn preserve_leaves_unprotected_fields_to_generator() {
        let mut store = ManualEditStore::new();
        store.record_edit(&id(), Field::Title, json!("A"), json!("Human"));

        let mut current = titled("Human");
        current.description = "old body".into();
        let mut desired = titled("Generated");
        desired.description = "new body".into();

        let merged = store.preserve(&current, desired, &id());
        assert_eq!(merged.title, "Human");
        assert_eq!(merged.description, "new body");
    }

    #[test]
    fn preserve_ignores_other_items() {
        let mut store = ManualEditStore::new();
        store.record_edit(&WorkItemId::from("Z"), Field::Title, json!("x"), json!("y"));
        let merged = store.preserve(&titled("B"), titled("C"), &id());
        assert_eq!(merged.title, "C");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn observe_records_remote_divergence_once() {
        let options = DiffOptions::default();
        let generated = vec![titled("Generated")];
        let mut remote_item = titled("Human");
        remote_item.tags = vec![];
        let remote = vec![remote_item];

        let mut store = ManualEditStore::new();
        assert_eq!(store.observe(&generated, &remote, &options), 1);
        let edit = store.get(&id(), Field::Title).unwrap();
        assert_eq!(edit.original_value, json!("Generated"));
        assert_eq!(edit.manual_value, json!("Human"));

        assert_eq!(store.observe(&generated, &remote, &options), 0);
    }

    #[test]
    fn observe_skips_items_never_generated() {
        let mut store = ManualEditStore::new();
        let recorded = store.observe(&[], &[titled("Human")], &DiffOptions::default());
        assert_eq!(recorded, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_item_drops_all_fields() {
        let mut store = ManualEditStore::new();
        store.record_edit(&id(), Field::Title, json!("a"), json!("b"));
        store.record_edit(&id(), Field::Phase, json!("a"), json!("b"));
        store.record_edit(&WorkItemId::from("B"), Field::Phase, json!("a"), json!("b"));
        store.clear_item(&id());
        assert_eq!(store.len(), 1);
        store.reset();
        assert!(store.is_empty());
    }

    #[test]
    fn save_load_roundtrip_keeps_protection() {
        let home = TempDir::new().unwrap();
        let mut store = ManualEditStore::new();
        store.record_edit(&id(), Field::Title, json!("A"), json!("B"));
        store.record_edit(&id(), Field::Tags, json!(["x"]), json!(["x", "y"]));
        store.save_at(home.path()).unwrap();

        let loaded = ManualEditStore::load_at(home.path()).unwrap();
        assert_eq!(loaded.export(), store.export());
        assert!(loaded.has_manual_edit(&id(), Field::Tags, &json!(["x", "y"])));
    }
}
