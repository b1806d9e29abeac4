use anyhow::Result;
use async_trait::async_trait;

use crate::model::{LocalItem, RemoteList, RowId};

/// The ICA shopping-list service.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every list visible to the session, with its rows.
    async fn fetch_lists(&self) -> Result<Vec<RemoteList>>;

    /// `Ok(false)` when the service refused the row.
    async fn add_to_list(&self, list_id: &str, text: &str) -> Result<bool>;

    /// Removing an id that no longer exists yields `Ok(false)`, not an error.
    async fn remove_item(&self, row_id: &RowId) -> Result<bool>;
}

/// The Keep list, reached through the host's generic todo services.
/// Items are addressed by their text.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get_items(&self, entity: &str) -> Result<Vec<LocalItem>>;
    async fn add_item(&self, entity: &str, text: &str) -> Result<()>;
    async fn remove_item(&self, entity: &str, text: &str) -> Result<()>;
}

/// Refreshes whatever displays the ICA list (the Home Assistant sensor).
#[async_trait]
pub trait SensorNotifier: Send + Sync {
    async fn refresh_sensor(&self, list_id: &str) -> Result<()>;
}
