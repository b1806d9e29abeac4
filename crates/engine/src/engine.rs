//! The reconciliation engine.
//!
//! One [`SyncEngine`] owns the ledger and the debounce slot for a single
//! ICA list / Keep entity pair.  Every method takes `&mut self`; the owner
//! serializes calls (the daemon keeps the engine behind one mutex), so at
//! most one pass runs at a time and the ledger is never mutated
//! concurrently.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::classifier::{Classification, classify};
use crate::debounce::{DebounceTick, Debouncer};
use crate::error::SyncError;
use crate::ledger::AntiEchoLedger;
use crate::model::{MutationEvent, NormalizedKey, RowId};
use crate::plan;
use crate::snapshot::ListAccessor;
use crate::store::{LocalStore, RemoteStore, SensorNotifier};
use crate::summary::{PassKind, PassSummary, Step};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub list_id: String,
    /// `None` runs in remote-only mode.
    pub local_entity: Option<String>,
    pub remove_striked: bool,
    pub max_remote_items: usize,
    pub max_local_items: usize,
    pub debounce: Duration,
}

impl EngineConfig {
    pub fn new(list_id: impl Into<String>, local_entity: Option<String>) -> Self {
        Self {
            list_id: list_id.into(),
            local_entity,
            remove_striked: true,
            max_remote_items: 250,
            max_local_items: 100,
            debounce: Duration::from_secs(1),
        }
    }
}

/// Read-only view for status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub list_id: String,
    pub local_entity: Option<String>,
    pub remote_only: bool,
    pub recent_adds: usize,
    pub recent_removes: usize,
    pub debounce_pending: bool,
    pub passes_run: u64,
    pub last_pass: Option<PassSummary>,
    pub last_error: Option<String>,
}

pub struct SyncEngine {
    config: EngineConfig,
    /// List used by direct adds without an explicit list id.
    current_list_id: String,
    lists: ListAccessor,
    notifier: Arc<dyn SensorNotifier>,
    ledger: AntiEchoLedger,
    debouncer: Debouncer,
    passes_run: u64,
    last_pass: Option<PassSummary>,
    last_error: Option<String>,
}

impl SyncEngine {
    /// Debounce ticks are delivered on `fire_tx`; feed them back through
    /// [`SyncEngine::on_debounce_tick`].
    pub fn new(
        config: EngineConfig,
        remote: Arc<dyn RemoteStore>,
        local: Arc<dyn LocalStore>,
        notifier: Arc<dyn SensorNotifier>,
        fire_tx: mpsc::UnboundedSender<DebounceTick>,
    ) -> Self {
        if config.local_entity.is_none() {
            warn!("no Keep entity configured; Keep sync disabled, ICA sensor and direct adds still work");
        }
        Self {
            current_list_id: config.list_id.clone(),
            debouncer: Debouncer::new(config.debounce, fire_tx),
            config,
            lists: ListAccessor::new(remote, local),
            notifier,
            ledger: AntiEchoLedger::new(),
            passes_run: 0,
            last_pass: None,
            last_error: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &AntiEchoLedger {
        &self.ledger
    }

    pub fn debounce_pending(&self) -> bool {
        self.debouncer.is_armed()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            list_id: self.current_list_id.clone(),
            local_entity: self.config.local_entity.clone(),
            remote_only: self.config.local_entity.is_none(),
            recent_adds: self.ledger.adds_len(),
            recent_removes: self.ledger.removes_len(),
            debounce_pending: self.debouncer.is_armed(),
            passes_run: self.passes_run,
            last_pass: self.last_pass.clone(),
            last_error: self.last_error.clone(),
        }
    }

    // ── Event classification ────────────────────────────────────────────────

    /// Handle one intercepted Keep mutation: update the ledger, run the
    /// completion fast path, and re-arm the debounce.  Returns `None` for
    /// ignored events.
    pub async fn on_mutation_event(&mut self, event: &MutationEvent) -> Option<Classification> {
        let Some(classification) = classify(event, self.config.local_entity.as_deref()) else {
            debug!(service = ?event.service, "ignoring todo event");
            return None;
        };

        match &classification {
            Classification::Added(keys) => {
                for key in keys {
                    debug!(item = %key, "noted add_item in Keep");
                    self.ledger.record_add(key.clone());
                }
            }
            Classification::Removed(keys) => {
                for key in keys {
                    debug!(item = %key, "noted remove_item in Keep");
                    self.ledger.record_remove(key.clone());
                }
            }
            Classification::Completed(key) => {
                debug!(item = %key, "noted completion in Keep");
                self.ledger.record_remove(key.clone());
                if let Err(err) = self.remove_now(key).await {
                    error!(item = %key, %err, "direct ICA removal failed");
                }
            }
            Classification::Touched(_) => {}
        }

        self.debouncer.arm();
        Some(classification)
    }

    /// Run the debounced Keep → ICA sync if `tick` is still the pending one.
    pub async fn on_debounce_tick(
        &mut self,
        tick: DebounceTick,
    ) -> Option<Result<PassSummary, SyncError>> {
        if !self.debouncer.claim(tick) {
            debug!("stale debounce tick dropped");
            return None;
        }
        Some(self.debounced_sync().await)
    }

    /// Disarm any pending debounced sync.
    pub fn cancel_pending(&mut self) -> bool {
        self.debouncer.cancel()
    }

    // ── Keep → ICA ──────────────────────────────────────────────────────────

    pub async fn debounced_sync(&mut self) -> Result<PassSummary, SyncError> {
        debug!("debounced Keep -> ICA sync");
        let result = self.run_debounced_sync().await;
        self.finish_pass("Keep -> ICA sync", result)
    }

    async fn run_debounced_sync(&mut self) -> Result<PassSummary, SyncError> {
        let mut summary = PassSummary::new(PassKind::Debounced);
        let Some(entity) = self.config.local_entity.clone() else {
            debug!("remote-only mode; nothing to push");
            return Ok(summary);
        };
        let list_id = self.current_list_id.clone();

        let local = self
            .lists
            .local_items(&entity, Some(self.config.max_local_items))
            .await?;
        let remote = self.lists.remote_list(&list_id).await?;
        let to_add =
            plan::remote_additions(&local, &remote, &self.ledger, self.config.max_remote_items)?;

        for text in &to_add {
            match self.lists.add_remote(&list_id, text).await {
                Ok(true) => {
                    info!(item = %text, "added to ICA");
                    summary.remote_added += 1;
                }
                Ok(false) => {
                    warn!(item = %text, "ICA refused row");
                    summary.fail(Step::AddRow, text, "rejected");
                }
                Err(err) => {
                    warn!(item = %text, error = %format!("{err:#}"), "adding to ICA failed");
                    summary.fail(Step::AddRow, text, format!("{err:#}"));
                }
            }
        }

        if summary.remote_added > 0 {
            self.notify(&list_id, &mut summary).await;
        }
        Ok(summary)
    }

    // ── Full pass ───────────────────────────────────────────────────────────

    /// Bidirectional refresh.  Clears the ledger when the pass completes.
    pub async fn refresh(&mut self) -> Result<PassSummary, SyncError> {
        debug!("ICA refresh triggered");
        let result = self.run_full_pass().await;
        self.finish_pass("refresh", result)
    }

    async fn run_full_pass(&mut self) -> Result<PassSummary, SyncError> {
        let mut summary = PassSummary::new(PassKind::Full);
        let list_id = self.current_list_id.clone();
        let mut remote = self.lists.remote_list(&list_id).await?;

        // Striked rows go first so nothing below reconsiders them.
        let mut removed_rows: HashSet<RowId> = HashSet::new();
        if self.config.remove_striked {
            let striked = remote.striked().cloned().collect::<Vec<_>>();
            for row in &striked {
                match self.lists.remove_remote(&row.id).await {
                    Ok(gone) => {
                        if gone {
                            info!(item = %row.text, "cleared striked row from ICA");
                            summary.remote_striked_removed += 1;
                        }
                        removed_rows.insert(row.id.clone());
                    }
                    Err(err) => {
                        warn!(item = %row.text, error = %format!("{err:#}"), "removing striked row failed");
                        summary.fail(Step::RemoveStrikedRow, &row.text, format!("{err:#}"));
                    }
                }
            }
            remote.forget(&removed_rows);
            removed_rows.clear();
        }

        if remote.row_count() >= self.config.max_remote_items {
            return Err(SyncError::RemoteFull {
                rows: remote.row_count(),
                max: self.config.max_remote_items,
            });
        }

        let Some(entity) = self.config.local_entity.clone() else {
            self.notify(&list_id, &mut summary).await;
            self.ledger.clear();
            return Ok(summary);
        };

        let local = self.lists.local_items(&entity, None).await?;
        let index = remote.key_index();

        // Keys that must not be re-added to Keep during this pass.
        let mut suppressed: HashSet<NormalizedKey> = self.ledger.recent_removes().cloned().collect();
        let mut removed_locally: HashSet<NormalizedKey> = HashSet::new();

        if self.config.remove_striked {
            for item in local.completed() {
                let key = item.key();
                suppressed.insert(key.clone());
                match self.lists.remove_local(&entity, &item.summary).await {
                    Ok(()) => {
                        info!(item = %item.summary, "removed completed item from Keep");
                        summary.local_removed += 1;
                        removed_locally.insert(key.clone());
                    }
                    Err(err) => {
                        warn!(item = %item.summary, error = %format!("{err:#}"), "removing completed Keep item failed");
                        summary.fail(Step::RemoveCompletedLocal, &item.summary, format!("{err:#}"));
                    }
                }

                let Some(row_id) = index.get(&key) else { continue };
                if removed_rows.contains(row_id) {
                    continue;
                }
                match self.lists.remove_remote(row_id).await {
                    Ok(gone) => {
                        if gone {
                            info!(item = %item.summary, "removed from ICA (completed in Keep)");
                            summary.remote_removed += 1;
                        }
                        removed_rows.insert(row_id.clone());
                    }
                    Err(err) => {
                        warn!(item = %item.summary, error = %format!("{err:#}"), "removing completed row from ICA failed");
                        summary.fail(Step::RemoveCompletedRow, &item.summary, format!("{err:#}"));
                    }
                }
            }
        }

        // Keep as it stands after the completed cleanup.
        let survivors = local
            .items
            .iter()
            .filter(|item| !(item.is_completed() && removed_locally.contains(&item.key())))
            .collect::<Vec<_>>();
        let local_count = survivors.len();
        let local_keys: HashSet<NormalizedKey> = survivors.iter().map(|item| item.key()).collect();

        // ICA → Keep.
        let remote_active = remote
            .active()
            .filter(|row| !removed_rows.contains(&row.id))
            .collect::<Vec<_>>();
        let capacity = self.config.max_local_items.saturating_sub(local_count);
        let mut to_add_local = plan::local_additions(
            remote_active.iter().copied(),
            &local_keys,
            &suppressed,
            usize::MAX,
        );
        if to_add_local.len() > capacity {
            warn!(
                max = self.config.max_local_items,
                skipped = to_add_local.len() - capacity,
                "Keep list is full; not adding every ICA item"
            );
            to_add_local.truncate(capacity);
        }
        for text in &to_add_local {
            match self.lists.add_local(&entity, text).await {
                Ok(()) => {
                    info!(item = %text, "added to Keep");
                    summary.local_added += 1;
                }
                Err(err) => {
                    warn!(item = %text, error = %format!("{err:#}"), "adding to Keep failed");
                    summary.fail(Step::AddLocal, text, format!("{err:#}"));
                }
            }
        }

        let remote_keys: HashSet<NormalizedKey> =
            remote_active.iter().map(|row| row.key()).collect();

        // Keep mirrors ICA's active rows.
        for text in plan::local_removals(survivors.iter().copied(), &remote_keys) {
            match self.lists.remove_local(&entity, &text).await {
                Ok(()) => {
                    info!(item = %text, "removed from Keep");
                    summary.local_removed += 1;
                }
                Err(err) => {
                    warn!(item = %text, error = %format!("{err:#}"), "removing from Keep failed");
                    summary.fail(Step::RemoveLocal, &text, format!("{err:#}"));
                }
            }
        }

        // Keep removals reach ICA.
        for (key, row_id) in plan::remote_removals(&index, &self.ledger, &removed_rows) {
            match self.lists.remove_remote(&row_id).await {
                Ok(gone) => {
                    if gone {
                        info!(item = %key, "removed from ICA (removed in Keep)");
                        summary.remote_removed += 1;
                    }
                    removed_rows.insert(row_id);
                }
                Err(err) => {
                    warn!(item = %key, error = %format!("{err:#}"), "removing from ICA failed");
                    summary.fail(Step::RemoveRow, key.as_str(), format!("{err:#}"));
                }
            }
        }

        self.notify(&list_id, &mut summary).await;
        self.ledger.clear();
        Ok(summary)
    }

    // ── Direct entry points ─────────────────────────────────────────────────

    /// Add one item straight to an ICA list, defaulting to the last-used list.
    pub async fn add_item(&mut self, list_id: Option<&str>, text: &str) -> Result<(), SyncError> {
        let result = self.run_add_item(list_id, text).await;
        if let Err(err) = &result {
            error!(%err, "add_item failed");
        }
        result
    }

    async fn run_add_item(&mut self, list_id: Option<&str>, text: &str) -> Result<(), SyncError> {
        let list_id = list_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(self.current_list_id.as_str())
            .to_string();
        let text = text.trim();

        if list_id.is_empty() {
            return Err(SyncError::InvalidArgument("no list id given and none configured"));
        }
        if text.is_empty() {
            return Err(SyncError::InvalidArgument("text is empty"));
        }

        debug!(list_id = %list_id, text, "add_item");
        let added = self
            .lists
            .add_remote(&list_id, text)
            .await
            .map_err(SyncError::Remote)?;
        if !added {
            return Err(SyncError::RemoteRejected(text.to_string()));
        }

        info!(item = %text, list_id = %list_id, "added to ICA list");
        let mut summary = PassSummary::new(PassKind::FastPath);
        summary.remote_added = 1;
        self.notify(&list_id, &mut summary).await;
        Ok(())
    }

    /// Remove the ICA row matching `key`, if any.  Returns whether a row was
    /// removed.
    pub async fn remove_now(&mut self, key: &NormalizedKey) -> Result<bool, SyncError> {
        let list_id = self.current_list_id.clone();
        let remote = self.lists.remote_list(&list_id).await?;
        let Some(row) = remote.find(key) else {
            debug!(item = %key, "no ICA row to remove");
            return Ok(false);
        };

        let removed = self
            .lists
            .remove_remote(&row.id)
            .await
            .map_err(SyncError::Remote)?;
        if removed {
            info!(item = %key, "removed from ICA (completed in Keep)");
            let mut summary = PassSummary::new(PassKind::FastPath);
            summary.remote_removed = 1;
            self.notify(&list_id, &mut summary).await;
        }
        Ok(removed)
    }

    // ── Configuration ───────────────────────────────────────────────────────

    /// Swap in a new configuration.  The ledger survives; a pending debounce
    /// does not.
    pub fn reload(&mut self, config: EngineConfig) {
        if config.list_id != self.current_list_id {
            warn!(
                from = %self.current_list_id,
                to = %config.list_id,
                "ICA list changed; Keep items may be pushed to the new list"
            );
        }
        if config.local_entity != self.config.local_entity {
            info!(entity = ?config.local_entity, "Keep entity changed");
        }
        self.debouncer.cancel();
        self.debouncer.set_delay(config.debounce);
        self.current_list_id = config.list_id.clone();
        self.config = config;
    }

    // ── Helpers ─────────────────────────────────────────────────────────────

    async fn notify(&self, list_id: &str, summary: &mut PassSummary) {
        match self.notifier.refresh_sensor(list_id).await {
            Ok(()) => summary.sensor_notified = true,
            Err(err) => {
                warn!(list_id, error = %format!("{err:#}"), "sensor refresh failed");
                summary.fail(Step::NotifySensor, list_id, format!("{err:#}"));
            }
        }
    }

    fn finish_pass(
        &mut self,
        label: &str,
        result: Result<PassSummary, SyncError>,
    ) -> Result<PassSummary, SyncError> {
        self.passes_run += 1;
        match &result {
            Ok(summary) => {
                info!(
                    pass = label,
                    changes = summary.changes(),
                    failures = summary.failures.len(),
                    "pass complete"
                );
                self.last_pass = Some(summary.clone());
                self.last_error = None;
            }
            Err(err @ SyncError::RemoteFull { .. }) => {
                error!(pass = label, %err, "no items added");
                self.last_error = Some(err.to_string());
            }
            Err(err) if err.is_permanent() => {
                warn!(pass = label, %err, "pass aborted");
                self.last_error = Some(err.to_string());
            }
            Err(err) => {
                error!(pass = label, %err, "pass failed");
                self.last_error = Some(err.to_string());
            }
        }
        result
    }
}
