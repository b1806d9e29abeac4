//! Item and event types shared by both stores.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Keys ────────────────────────────────────────────────────────────────────

/// Case-folded, trimmed item text.  The only join key between the two
/// stores; Keep exposes no stable id, so items differing only by case or
/// surrounding whitespace are the same item here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn new(text: &str) -> Self {
        Self(text.trim().to_lowercase())
    }

    /// `None` for text that is empty after trimming.
    pub fn from_text(text: &str) -> Option<Self> {
        let key = Self::new(text);
        if key.0.is_empty() { None } else { Some(key) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Row handle issued by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Remote (ICA) ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: RowId,
    pub text: String,
    /// Checked off on the ICA side.
    pub is_striked: bool,
}

impl RemoteItem {
    pub fn key(&self) -> NormalizedKey {
        NormalizedKey::new(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteList {
    pub id: String,
    #[serde(default)]
    pub rows: Vec<RemoteItem>,
}

// ── Local (Keep) ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    NeedsAction,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalItem {
    pub summary: String,
    #[serde(default)]
    pub status: ItemStatus,
}

impl LocalItem {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            status: ItemStatus::NeedsAction,
        }
    }

    pub fn completed(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            status: ItemStatus::Completed,
        }
    }

    pub fn key(&self) -> NormalizedKey {
        NormalizedKey::new(&self.summary)
    }

    pub fn is_completed(&self) -> bool {
        self.status == ItemStatus::Completed
    }
}

// ── Mutation events ─────────────────────────────────────────────────────────

/// `todo` service named by an intercepted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoService {
    AddItem,
    RemoveItem,
    UpdateItem,
    /// Any other service (`get_items`, `remove_completed_items`, ...).
    #[serde(other)]
    Other,
}

/// A field Home Assistant accepts either as a scalar or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        match self {
            Self::One(value) => std::slice::from_ref(value).iter(),
            Self::Many(values) => values.iter(),
        }
        .map(String::as_str)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.iter().any(|value| value == needle)
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
}

/// A mutation intent against the Keep list, shaped like the data of a
/// Home Assistant `call_service` event so the host can forward it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub service: TodoService,
    #[serde(default)]
    pub service_data: ServiceData,
}

impl MutationEvent {
    pub fn add(entity: &str, item: &str) -> Self {
        Self {
            service: TodoService::AddItem,
            service_data: ServiceData {
                entity_id: Some(entity.into()),
                item: Some(item.into()),
                ..ServiceData::default()
            },
        }
    }

    pub fn remove(entity: &str, item: &str) -> Self {
        Self {
            service: TodoService::RemoveItem,
            service_data: ServiceData {
                entity_id: Some(entity.into()),
                item: Some(item.into()),
                ..ServiceData::default()
            },
        }
    }

    pub fn complete(entity: &str, item: &str) -> Self {
        Self {
            service: TodoService::UpdateItem,
            service_data: ServiceData {
                entity_id: Some(entity.into()),
                item: Some(item.into()),
                status: Some(ItemStatus::Completed),
                rename: None,
            },
        }
    }
}
