//! Normalized views of both stores and the calls that mutate them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::error::SyncError;
use crate::model::{LocalItem, NormalizedKey, RemoteItem, RowId};
use crate::store::{LocalStore, RemoteStore};

/// Rows of one ICA list as read at the start of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub list_id: String,
    pub rows: Vec<RemoteItem>,
    /// Rows ICA holds, blank ones included.
    row_count: usize,
}

impl RemoteSnapshot {
    pub fn new(list_id: impl Into<String>, rows: Vec<RemoteItem>) -> Self {
        Self {
            list_id: list_id.into(),
            row_count: rows.len(),
            rows,
        }
    }

    /// Usable (non-blank) rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// What the capacity guard compares against.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows not checked off on the ICA side.
    pub fn active(&self) -> impl Iterator<Item = &RemoteItem> {
        self.rows.iter().filter(|row| !row.is_striked)
    }

    pub fn striked(&self) -> impl Iterator<Item = &RemoteItem> {
        self.rows.iter().filter(|row| row.is_striked)
    }

    /// Key → row lookup.  With duplicate texts the first row wins.
    pub fn key_index(&self) -> HashMap<NormalizedKey, RowId> {
        let mut index = HashMap::with_capacity(self.rows.len());
        for row in &self.rows {
            index.entry(row.key()).or_insert_with(|| row.id.clone());
        }
        index
    }

    pub fn keys(&self) -> HashSet<NormalizedKey> {
        self.rows.iter().map(RemoteItem::key).collect()
    }

    pub fn find(&self, key: &NormalizedKey) -> Option<&RemoteItem> {
        self.rows.iter().find(|row| &row.key() == key)
    }

    /// Drop rows that were deleted earlier in the pass.
    pub fn forget(&mut self, removed: &HashSet<RowId>) {
        let before = self.rows.len();
        self.rows.retain(|row| !removed.contains(&row.id));
        self.row_count -= before - self.rows.len();
    }
}

/// Items of the Keep list as read at the start of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSnapshot {
    pub entity: String,
    pub items: Vec<LocalItem>,
}

impl LocalSnapshot {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn active(&self) -> impl Iterator<Item = &LocalItem> {
        self.items.iter().filter(|item| !item.is_completed())
    }

    pub fn completed(&self) -> impl Iterator<Item = &LocalItem> {
        self.items.iter().filter(|item| item.is_completed())
    }

    pub fn keys(&self) -> HashSet<NormalizedKey> {
        self.items.iter().map(LocalItem::key).collect()
    }
}

/// Wraps the two stores behind normalized snapshots.
#[derive(Clone)]
pub struct ListAccessor {
    remote: Arc<dyn RemoteStore>,
    local: Arc<dyn LocalStore>,
}

impl ListAccessor {
    pub fn new(remote: Arc<dyn RemoteStore>, local: Arc<dyn LocalStore>) -> Self {
        Self { remote, local }
    }

    /// Read one ICA list.  Row texts are trimmed and blank rows dropped.
    pub async fn remote_list(&self, list_id: &str) -> Result<RemoteSnapshot, SyncError> {
        let lists = self.remote.fetch_lists().await.map_err(SyncError::Remote)?;
        let list = lists
            .into_iter()
            .find(|list| list.id == list_id)
            .ok_or_else(|| SyncError::ListNotFound(list_id.to_string()))?;

        let row_count = list.rows.len();
        let rows = list
            .rows
            .into_iter()
            .filter_map(|mut row| {
                row.text = row.text.trim().to_string();
                (!row.text.is_empty()).then_some(row)
            })
            .collect::<Vec<_>>();
        debug!(list_id, rows = rows.len(), row_count, "read ICA list");

        Ok(RemoteSnapshot {
            list_id: list_id.to_string(),
            rows,
            row_count,
        })
    }

    /// Read the Keep list, keeping at most `limit` items when given.  Blank
    /// items are dropped; summaries are kept verbatim since Keep removes by
    /// exact text.
    pub async fn local_items(
        &self,
        entity: &str,
        limit: Option<usize>,
    ) -> Result<LocalSnapshot, SyncError> {
        let mut items = self
            .local
            .get_items(entity)
            .await
            .map_err(SyncError::Local)?
            .into_iter()
            .filter(|item| !item.summary.trim().is_empty())
            .collect::<Vec<_>>();
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        debug!(entity, items = items.len(), "read Keep list");

        Ok(LocalSnapshot {
            entity: entity.to_string(),
            items,
        })
    }

    pub async fn add_remote(&self, list_id: &str, text: &str) -> Result<bool> {
        self.remote.add_to_list(list_id, text).await
    }

    pub async fn remove_remote(&self, row_id: &RowId) -> Result<bool> {
        self.remote.remove_item(row_id).await
    }

    pub async fn add_local(&self, entity: &str, text: &str) -> Result<()> {
        self.local.add_item(entity, text).await
    }

    pub async fn remove_local(&self, entity: &str, text: &str) -> Result<()> {
        self.local.remove_item(entity, text).await
    }
}
