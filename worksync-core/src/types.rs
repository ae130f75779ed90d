//! Domain types for reconciled work items.
//!
//! A [`WorkItem`] is identified by its [`WorkItemId`]; every other field is
//! mutable. Reconciliation never compares whole structs: it compares the
//! values returned by [`Field::value`] for a chosen subset of fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identifier of a work item, assigned once by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkItemId(pub String);

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for WorkItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkItemId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Priority of a work item. Variants are declared in ascending order so the
/// derived `Ord` ranks `Critical` highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// A comparable field of [`WorkItem`]. `id` is identity and never a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Description,
    Phase,
    Tags,
    Automatable,
    CapabilityHint,
    Dependencies,
    Priority,
    Estimate,
    TemplateId,
}

impl Field {
    /// Every field, in declaration order.
    pub fn all() -> &'static [Field] {
        &[
            Field::Title,
            Field::Description,
            Field::Phase,
            Field::Tags,
            Field::Automatable,
            Field::CapabilityHint,
            Field::Dependencies,
            Field::Priority,
            Field::Estimate,
            Field::TemplateId,
        ]
    }

    /// Fields that take part in equality by default. Provenance and
    /// estimate are metadata and excluded.
    pub fn checked() -> &'static [Field] {
        &[
            Field::Title,
            Field::Description,
            Field::Phase,
            Field::Tags,
            Field::Automatable,
            Field::CapabilityHint,
            Field::Dependencies,
            Field::Priority,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
            Field::Phase => "phase",
            Field::Tags => "tags",
            Field::Automatable => "automatable",
            Field::CapabilityHint => "capability_hint",
            Field::Dependencies => "dependencies",
            Field::Priority => "priority",
            Field::Estimate => "estimate",
            Field::TemplateId => "template_id",
        }
    }

    /// `true` for list-valued fields, which compare order-independently.
    pub fn is_list(self) -> bool {
        matches!(self, Field::Tags | Field::Dependencies)
    }

    /// `true` for free-text fields that get a line diff in reports.
    pub fn is_text(self) -> bool {
        matches!(self, Field::Title | Field::Description)
    }

    /// JSON view of this field on `item`.
    pub fn value(self, item: &WorkItem) -> Value {
        match self {
            Field::Title => Value::String(item.title.clone()),
            Field::Description => Value::String(item.description.clone()),
            Field::Phase => Value::String(item.phase.clone()),
            Field::Tags => string_array(item.tags.iter().map(String::as_str)),
            Field::Automatable => Value::Bool(item.automatable),
            Field::CapabilityHint => optional_string(item.capability_hint.as_deref()),
            Field::Dependencies => string_array(item.dependencies.iter().map(|d| d.0.as_str())),
            Field::Priority => Value::String(item.priority.to_string()),
            Field::Estimate => item.estimate.map(Value::from).unwrap_or(Value::Null),
            Field::TemplateId => optional_string(item.template_id.as_deref()),
        }
    }

    /// Overwrite this field on `target` with the value held by `source`.
    pub fn copy(self, source: &WorkItem, target: &mut WorkItem) {
        match self {
            Field::Title => target.title = source.title.clone(),
            Field::Description => target.description = source.description.clone(),
            Field::Phase => target.phase = source.phase.clone(),
            Field::Tags => target.tags = source.tags.clone(),
            Field::Automatable => target.automatable = source.automatable,
            Field::CapabilityHint => target.capability_hint = source.capability_hint.clone(),
            Field::Dependencies => target.dependencies = source.dependencies.clone(),
            Field::Priority => target.priority = source.priority,
            Field::Estimate => target.estimate = source.estimate,
            Field::TemplateId => target.template_id = source.template_id.clone(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Field::all()
            .iter()
            .copied()
            .find(|field| field.name() == normalized)
            .ok_or_else(|| CoreError::UnknownField(s.to_string()))
    }
}

fn string_array<'a>(values: impl Iterator<Item = &'a str>) -> Value {
    Value::Array(values.map(|v| Value::String(v.to_string())).collect())
}

fn optional_string(value: Option<&str>) -> Value {
    value
        .map(|v| Value::String(v.to_string()))
        .unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One generated unit of work mirrored to the remote record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub phase: String,
    /// Category tags; generators always supply at least one.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub automatable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_hint: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<WorkItemId>,
    #[serde(default)]
    pub priority: Priority,
    /// Effort estimate in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f64>,
    /// Which generator template produced the item. Provenance only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

impl WorkItem {
    /// A work item with only identity and title set; everything else defaults.
    pub fn new(id: impl Into<WorkItemId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            phase: String::new(),
            tags: Vec::new(),
            automatable: false,
            capability_hint: None,
            dependencies: Vec::new(),
            priority: Priority::default(),
            estimate: None,
            template_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
