//! Reconciliation entry points.
//!
//! [`merge`] is the side-effect-free composition `apply_diff ∘ diff`.
//! [`Reconciler`] carries the manual-edit store through a run so modified
//! items keep their protected human values.

use worksync_core::{DiffConfig, WorkItem};

use crate::differ::{self, DiffOptions, DiffResult};
use crate::manual_edits::ManualEditStore;

/// Next state for `base` given the generator's `incoming` collection.
pub fn merge(base: &[WorkItem], incoming: &[WorkItem], options: &DiffOptions) -> Vec<WorkItem> {
    differ::apply_diff(base, differ::diff(base, incoming, options))
}

/// The diff of one run and the state it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub diff: DiffResult,
    pub next: Vec<WorkItem>,
}

/// Reconciliation service owning the diff options and manual-edit store.
///
/// Construct one per run; call [`Reconciler::reset`] between tests.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    options: DiffOptions,
    edits: ManualEditStore,
}

impl Reconciler {
    pub fn new(options: DiffOptions) -> Self {
        Self::with_edits(options, ManualEditStore::new())
    }

    pub fn from_config(cfg: &DiffConfig) -> Self {
        Self::new(DiffOptions::from(cfg))
    }

    pub fn with_edits(options: DiffOptions, mut edits: ManualEditStore) -> Self {
        edits.set_unordered_arrays(options.unordered_arrays);
        Self { options, edits }
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    pub fn edits(&self) -> &ManualEditStore {
        &self.edits
    }

    pub fn edits_mut(&mut self) -> &mut ManualEditStore {
        &mut self.edits
    }

    pub fn into_edits(self) -> ManualEditStore {
        self.edits
    }

    /// Diff `current` against `desired`, routing every modified item through
    /// manual-edit preservation when enabled.
    pub fn diff(&mut self, current: &[WorkItem], desired: &[WorkItem]) -> DiffResult {
        if !self.options.preserve_manual_edits {
            return differ::diff(current, desired, &self.options);
        }
        let edits = &mut self.edits;
        differ::diff_with(current, desired, &self.options, |existing, proposed| {
            let id = proposed.id.clone();
            edits.preserve(existing, proposed, &id)
        })
    }

    pub fn apply_diff(&self, current: &[WorkItem], diff: DiffResult) -> Vec<WorkItem> {
        differ::apply_diff(current, diff)
    }

    /// `apply_diff(base, diff(base, incoming))`.
    pub fn merge(&mut self, base: &[WorkItem], incoming: &[WorkItem]) -> Vec<WorkItem> {
        let diff = self.diff(base, incoming);
        differ::apply_diff(base, diff)
    }

    /// Diff and next state together, for callers that drive remote side
    /// effects from the diff and persist the merged collection.
    pub fn reconcile(&mut self, base: &[WorkItem], incoming: &[WorkItem]) -> Reconciliation {
        let diff = self.diff(base, incoming);
        let next = differ::apply_diff(base, diff.clone());
        Reconciliation { diff, next }
    }

    /// Record human edits: fields where `remote` diverged from `generated`.
    pub fn observe(&mut self, generated: &[WorkItem], remote: &[WorkItem]) -> usize {
        self.edits.observe(generated, remote, &self.options)
    }

    pub fn are_equivalent(&self, a: &WorkItem, b: &WorkItem) -> bool {
        differ::are_equivalent(a, b, &self.options)
    }

    /// Drop every recorded manual edit.
    pub fn reset(&mut self) {
        self.edits.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use worksync_core::{Field, WorkItemId};

    fn item(id: &str, title: &str) -> WorkItem {
        WorkItem::new(id, title)
    }

    #[test]
    fn merge_of_identical_collections_is_identity() {
        let x = vec![item("A", "a"), item("B", "b")];
        assert_eq!(merge(&x, &x, &DiffOptions::default()), x);
    }

    #[test]
    fn reconciler_keeps_protected_title() {
        let mut reconciler = Reconciler::default();
        reconciler.edits_mut().record_edit(
            &WorkItemId::from("A"),
            Field::Title,
            json!("Generated"),
            json!("Human"),
        );

        let mut desired = item("A", "Generated v2");
        desired.description = "fresh".into();
        let result = reconciler.diff(&[item("A", "Human")], &[desired]);

        assert_eq!(result.modified.len(), 1);
        assert_eq!(result.modified[0].after.title, "Human");
        assert_eq!(result.modified[0].changes, vec![Field::Description]);
    }

    #[test]
    fn fully_protected_item_is_unchanged() {
        let mut reconciler = Reconciler::default();
        reconciler.edits_mut().record_edit(
            &WorkItemId::from("A"),
            Field::Title,
            json!("Generated"),
            json!("Human"),
        );
        let plan = reconciler.reconcile(&[item("A", "Human")], &[item("A", "Generated")]);
        assert!(!plan.diff.has_changes());
        assert_eq!(plan.next, vec![item("A", "Human")]);
    }

    #[test]
    fn reordered_manual_tags_survive_merge() {
        let mut reconciler = Reconciler::default();
        let mut generated = item("A", "a");
        generated.tags = vec!["gen".into()];
        let mut remote = item("A", "a");
        remote.tags = vec!["x".into(), "y".into()];
        assert_eq!(reconciler.observe(&[generated.clone()], &[remote.clone()]), 1);

        remote.tags.reverse();
        let next = reconciler.merge(&[remote.clone()], &[generated]);
        assert_eq!(next[0].tags, remote.tags);
        assert_eq!(reconciler.edits().len(), 1);
    }

    #[test]
    fn preservation_can_be_disabled() {
        let options = DiffOptions {
            preserve_manual_edits: false,
            ..DiffOptions::default()
        };
        let mut reconciler = Reconciler::new(options);
        reconciler.edits_mut().record_edit(
            &WorkItemId::from("A"),
            Field::Title,
            json!("Generated"),
            json!("Human"),
        );
        let next = reconciler.merge(&[item("A", "Human")], &[item("A", "Generated")]);
        assert_eq!(next[0].title, "Generated");
        assert_eq!(reconciler.edits().len(), 1, "disabled preservation must not clear");
    }

    #[test]
    fn observe_then_merge_protects_human_change() {
        let generated = vec![item("A", "Generated")];
        let remote = vec![item("A", "Human")];

        let mut reconciler = Reconciler::default();
        assert_eq!(reconciler.observe(&generated, &remote), 1);
        let next = reconciler.merge(&remote, &[item("A", "Generated again")]);
        assert_eq!(next, remote);

        reconciler.reset();
        assert!(reconciler.edits().is_empty());
    }
}
