//! Classification of intercepted Keep mutations.

use crate::model::{ItemStatus, MutationEvent, NormalizedKey, TodoService};

/// What an event means for the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Added(Vec<NormalizedKey>),
    Removed(Vec<NormalizedKey>),
    /// Marked completed in Keep; removed from ICA right away.
    Completed(NormalizedKey),
    /// Any other update of a tracked item.  Touches no ledger set but still
    /// schedules a sync.
    Touched(Vec<NormalizedKey>),
}

/// Classify `event` against the tracked Keep entity.
///
/// Returns `None` for events that must be ignored entirely: no tracked
/// entity, a different entity, a service other than add/remove/update, or
/// no usable item text.
pub fn classify(event: &MutationEvent, local_entity: Option<&str>) -> Option<Classification> {
    let entity = local_entity?;
    let data = &event.service_data;
    if !data.entity_id.as_ref()?.contains(entity) {
        return None;
    }

    let keys: Vec<NormalizedKey> = data
        .item
        .iter()
        .flat_map(|items| items.iter())
        .filter_map(NormalizedKey::from_text)
        .collect();

    match event.service {
        TodoService::AddItem if !keys.is_empty() => Some(Classification::Added(keys)),
        TodoService::RemoveItem if !keys.is_empty() => Some(Classification::Removed(keys)),
        TodoService::UpdateItem => {
            if data.status == Some(ItemStatus::Completed) {
                // A rename in the same call names the item as it ends up.
                let renamed = data.rename.as_deref().and_then(NormalizedKey::from_text);
                if let Some(key) = renamed.or_else(|| keys.first().cloned()) {
                    return Some(Classification::Completed(key));
                }
            }
            if keys.is_empty() {
                None
            } else {
                Some(Classification::Touched(keys))
            }
        }
        _ => None,
    }
}
