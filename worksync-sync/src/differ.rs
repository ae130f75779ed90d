//! State differ: partitions two work-item collections by identity.
//!
//! Every identity in `current ∪ desired` lands in exactly one of
//! `added`, `modified`, `removed`, or `unchanged`. Duplicate identities
//! inside one collection coalesce silently: the last occurrence wins.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use similar::TextDiff;

use worksync_core::{DiffConfig, Field, WorkItem, WorkItemId};

use crate::content_hash::hash_value;
use crate::error::SyncError;

/// Per-field equality override. Returns `true` when the two values are equal.
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Which fields to compare and how.
#[derive(Clone)]
pub struct DiffOptions {
    /// Fields compared for equality.
    pub fields: Vec<Field>,
    /// Fields never compared, even when listed in `fields`.
    pub ignore: Vec<Field>,
    /// Compare list fields as multisets instead of sequences.
    pub unordered_arrays: bool,
    pub comparators: HashMap<Field, Comparator>,
    /// Route modified items through manual-edit preservation.
    /// Only honoured by [`crate::Reconciler`].
    pub preserve_manual_edits: bool,
}

impl DiffOptions {
    /// Override equality for one field.
    pub fn with_comparator(
        mut self,
        field: Field,
        comparator: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.comparators.insert(field, Arc::new(comparator));
        self
    }

    pub fn ignoring(mut self, field: Field) -> Self {
        if !self.ignore.contains(&field) {
            self.ignore.push(field);
        }
        self
    }

    /// Fields actually compared: `fields` minus `ignore`.
    pub fn compared_fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields
            .iter()
            .copied()
            .filter(|field| !self.ignore.contains(field))
    }
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self::from(&DiffConfig::default())
    }
}

impl From<&DiffConfig> for DiffOptions {
    fn from(cfg: &DiffConfig) -> Self {
        Self {
            fields: cfg.fields.clone(),
            ignore: cfg.ignore.clone(),
            unordered_arrays: cfg.unordered_arrays,
            comparators: HashMap::new(),
            preserve_manual_edits: cfg.preserve_manual_edits,
        }
    }
}

impl fmt::Debug for DiffOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut overridden: Vec<_> = self.comparators.keys().collect();
        overridden.sort();
        f.debug_struct("DiffOptions")
            .field("fields", &self.fields)
            .field("ignore", &self.ignore)
            .field("unordered_arrays", &self.unordered_arrays)
            .field("comparators", &overridden)
            .field("preserve_manual_edits", &self.preserve_manual_edits)
            .finish()
    }
}

/// An item present on both sides with at least one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedItem {
    pub before: WorkItem,
    pub after: WorkItem,
    pub changes: Vec<Field>,
}

/// Four disjoint partitions over `current ∪ desired` by identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DiffResult {
    pub added: Vec<WorkItem>,
    pub modified: Vec<ModifiedItem>,
    pub removed: Vec<WorkItem>,
    pub unchanged: Vec<WorkItem>,
}

impl DiffResult {
    /// `true` when applying the diff would change anything.
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty())
    }

    /// Number of distinct identities covered.
    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len() + self.unchanged.len()
    }
}

impl fmt::Display for DiffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} modified, {} removed, {} unchanged",
            self.added.len(),
            self.modified.len(),
            self.removed.len(),
            self.unchanged.len()
        )
    }
}

/// Diff `current` against `desired` without manual-edit preservation.
pub fn diff(current: &[WorkItem], desired: &[WorkItem], options: &DiffOptions) -> DiffResult {
    diff_with(current, desired, options, |_, proposed| proposed)
}

/// Diff with a hook that may rewrite the proposed `after` of a modified
/// item. The hook receives the current item and the desired one.
pub(crate) fn diff_with<F>(
    current: &[WorkItem],
    desired: &[WorkItem],
    options: &DiffOptions,
    mut adjust: F,
) -> DiffResult
where
    F: FnMut(&WorkItem, WorkItem) -> WorkItem,
{
    let current_by_id = index_by_id(current, "current");
    let desired_by_id = index_by_id(desired, "desired");
    let mut result = DiffResult::default();

    for (id, wanted) in &desired_by_id {
        let Some(existing) = current_by_id.get(id) else {
            result.added.push((*wanted).clone());
            continue;
        };

        if changed_fields(existing, wanted, options).is_empty() {
            result.unchanged.push((*wanted).clone());
            continue;
        }

        let after = adjust(*existing, (*wanted).clone());
        let changes = changed_fields(existing, &after, options);
        if changes.is_empty() {
            tracing::debug!("{id}: every proposed change is held back by manual edits");
            result.unchanged.push(after);
        } else {
            result.modified.push(ModifiedItem {
                before: (*existing).clone(),
                after,
                changes,
            });
        }
    }

    for (id, existing) in &current_by_id {
        if !desired_by_id.contains_key(id) {
            result.removed.push((*existing).clone());
        }
    }

    result
}

/// Next state after `diff`: exactly `unchanged ∪ added ∪ modified.after`.
///
/// Items that survive keep their position from `current`; added items
/// follow in desired order. Removed items are dropped, not mutated.
pub fn apply_diff(current: &[WorkItem], diff: DiffResult) -> Vec<WorkItem> {
    let mut survivors: IndexMap<WorkItemId, WorkItem> = diff
        .unchanged
        .into_iter()
        .chain(diff.modified.into_iter().map(|m| m.after))
        .map(|item| (item.id.clone(), item))
        .collect();

    let mut next = Vec::with_capacity(survivors.len() + diff.added.len());
    for id in index_by_id(current, "current").keys() {
        if let Some(item) = survivors.shift_remove(*id) {
            next.push(item);
        }
    }
    next.extend(survivors.into_values());
    next.extend(diff.added);
    next
}

/// Fields of `options` on which `before` and `after` differ.
pub fn changed_fields(before: &WorkItem, after: &WorkItem, options: &DiffOptions) -> Vec<Field> {
    options
        .compared_fields()
        .filter(|field| !field_equal(*field, before, after, options))
        .collect()
}

fn field_equal(field: Field, a: &WorkItem, b: &WorkItem, options: &DiffOptions) -> bool {
    let left = field.value(a);
    let right = field.value(b);
    if let Some(comparator) = options.comparators.get(&field) {
        return comparator(&left, &right);
    }
    if field.is_list() && options.unordered_arrays {
        return sorted(left) == sorted(right);
    }
    left == right
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Array(mut items) => {
            items.sort_by_key(|v| v.to_string());
            Value::Array(items)
        }
        other => other,
    }
}

/// `value` of `field` in the form equality and digests see: list fields
/// sorted when `unordered_arrays` is set.
pub(crate) fn normalized(field: Field, value: Value, unordered_arrays: bool) -> Value {
    if field.is_list() && unordered_arrays {
        sorted(value)
    } else {
        value
    }
}

/// The compared fields of `item`, as a JSON object keyed by field name.
/// List fields are sorted when `unordered_arrays` is set.
pub fn comparable_view(item: &WorkItem, options: &DiffOptions) -> Value {
    let mut map = Map::new();
    for field in options.compared_fields() {
        let value = normalized(field, field.value(item), options.unordered_arrays);
        map.insert(field.name().to_string(), value);
    }
    Value::Object(map)
}

/// Digest of [`comparable_view`]; equal digests mean no remote update is needed.
pub fn comparable_digest(item: &WorkItem, options: &DiffOptions) -> Result<String, SyncError> {
    hash_value(&comparable_view(item, options))
}

/// Whether `a` and `b` agree on every compared field, honouring custom
/// comparators exactly as [`diff`] does.
pub fn are_equivalent(a: &WorkItem, b: &WorkItem, options: &DiffOptions) -> bool {
    changed_fields(a, b, options).is_empty()
}

/// Human-readable description of one field change.
///
/// Text fields render as a unified line diff; other fields as `old -> new`.
pub fn describe_change(before: &WorkItem, after: &WorkItem, field: Field) -> String {
    if field.is_text() {
        let old = text_with_newline(&field.value(before));
        let new = text_with_newline(&field.value(after));
        let old_header = format!("a/{}/{}", before.id, field);
        let new_header = format!("b/{}/{}", after.id, field);
        return TextDiff::from_lines(&old, &new)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string();
    }
    format!("{field}: {} -> {}", field.value(before), field.value(after))
}

fn text_with_newline(value: &Value) -> String {
    let mut text = value.as_str().unwrap_or_default().replace("\r\n", "\n");
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn index_by_id<'a>(items: &'a [WorkItem], side: &str) -> IndexMap<&'a WorkItemId, &'a WorkItem> {
    let mut by_id = IndexMap::with_capacity(items.len());
    for item in items {
        if by_id.insert(&item.id, item).is_some() {
            tracing::debug!("duplicate id {} in {side}; last occurrence wins", item.id);
        }
    }
    by_id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
