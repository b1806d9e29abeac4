//! Set-difference planning.  No I/O; every decision is made on normalized
//! keys from snapshots and the ledger passed in.

use std::collections::{HashMap, HashSet};

use crate::error::SyncError;
use crate::ledger::AntiEchoLedger;
use crate::model::{LocalItem, NormalizedKey, RemoteItem, RowId};
use crate::snapshot::{LocalSnapshot, RemoteSnapshot};

/// Keep → ICA: open Keep items missing from the ICA list.
///
/// Completed items and items the user just removed are never pushed.
/// Fails with [`SyncError::RemoteFull`] when the list is already at
/// `max_remote` rows (blank ones included); otherwise the result is capped
/// to the remaining space.
pub fn remote_additions(
    local: &LocalSnapshot,
    remote: &RemoteSnapshot,
    ledger: &AntiEchoLedger,
    max_remote: usize,
) -> Result<Vec<String>, SyncError> {
    if remote.row_count() >= max_remote {
        return Err(SyncError::RemoteFull {
            rows: remote.row_count(),
            max: max_remote,
        });
    }
    let space = max_remote - remote.row_count();

    let mut seen = remote.keys();
    let mut to_add = Vec::new();
    for item in local.active() {
        let key = item.key();
        if ledger.is_recently_removed(&key) || !seen.insert(key) {
            continue;
        }
        to_add.push(item.summary.trim().to_string());
    }
    to_add.truncate(space);
    Ok(to_add)
}

/// ICA → Keep: active ICA texts missing from Keep.
///
/// `suppressed` holds keys that must not come back this pass (recent Keep
/// removals, completed items just cleaned up).
pub fn local_additions<'a>(
    remote_active: impl IntoIterator<Item = &'a RemoteItem>,
    local_keys: &HashSet<NormalizedKey>,
    suppressed: &HashSet<NormalizedKey>,
    capacity: usize,
) -> Vec<String> {
    let mut seen = HashSet::new();
    remote_active
        .into_iter()
        .filter(|row| {
            let key = row.key();
            !local_keys.contains(&key) && !suppressed.contains(&key) && seen.insert(key)
        })
        .map(|row| row.text.clone())
        .take(capacity)
        .collect()
}

/// Keep items (original summaries) with no active ICA counterpart.
pub fn local_removals<'a>(
    local: impl IntoIterator<Item = &'a LocalItem>,
    remote_keys: &HashSet<NormalizedKey>,
) -> Vec<String> {
    local
        .into_iter()
        .filter(|item| !remote_keys.contains(&item.key()))
        .map(|item| item.summary.clone())
        .collect()
}

/// ICA rows for keys removed from Keep since the last pass, skipping rows
/// already deleted in this pass.
pub fn remote_removals(
    index: &HashMap<NormalizedKey, RowId>,
    ledger: &AntiEchoLedger,
    already_removed: &HashSet<RowId>,
) -> Vec<(NormalizedKey, RowId)> {
    let mut removals = ledger
        .recent_removes()
        .filter_map(|key| {
            let row_id = index.get(key)?;
            (!already_removed.contains(row_id)).then(|| (key.clone(), row_id.clone()))
        })
        .collect::<Vec<_>>();
    removals.sort();
    removals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(texts: &[(&str, bool)]) -> RemoteSnapshot {
        RemoteSnapshot::new(
            "weekly",
            texts
                .iter()
                .enumerate()
                .map(|(i, (text, striked))| RemoteItem {
                    id: RowId::new(format!("r{i}")),
                    text: text.to_string(),
                    is_striked: *striked,
                })
                .collect(),
        )
    }

    fn local(items: &[LocalItem]) -> LocalSnapshot {
        LocalSnapshot {
            entity: "todo.shopping".into(),
            items: items.to_vec(),
        }
    }

    fn key(text: &str) -> NormalizedKey {
        NormalizedKey::new(text)
    }

    // ── remote_additions ───────────────────────────────────────────────────

    #[test]
    fn remote_additions_skip_present_completed_and_removed() {
        let remote = remote(&[("Milk", false)]);
        let local = local(&[
            LocalItem::new("milk"),
            LocalItem::new("Bread"),
            LocalItem::completed("Eggs"),
            LocalItem::new("Butter"),
            LocalItem::new("bread "),
        ]);
        let mut ledger = AntiEchoLedger::new();
        ledger.record_remove(key("butter"));

        let to_add = remote_additions(&local, &remote, &ledger, 250).unwrap();
        assert_eq!(to_add, vec!["Bread".to_string()]);
    }

    #[test]
    fn remote_additions_push_trimmed_text() {
        let remote = remote(&[]);
        let local = local(&[LocalItem::new("  Coffee ")]);

        let to_add = remote_additions(&local, &remote, &AntiEchoLedger::new(), 250).unwrap();
        assert_eq!(to_add, vec!["Coffee".to_string()]);
    }

    #[test]
    fn remote_additions_capped_to_space() {
        let remote = remote(&[("a", false), ("b", false)]);
        let local = local(&[LocalItem::new("c"), LocalItem::new("d"), LocalItem::new("e")]);

        let to_add = remote_additions(&local, &remote, &AntiEchoLedger::new(), 4).unwrap();
        assert_eq!(to_add, vec!["c".to_string(), "d".to_string()]);
    }

    #[test]
    fn remote_additions_refuse_full_list() {
        let remote = remote(&[("a", false), ("b", false)]);
        let local = local(&[LocalItem::new("c")]);

        let err = remote_additions(&local, &remote, &AntiEchoLedger::new(), 2).unwrap_err();
        assert!(matches!(err, SyncError::RemoteFull { rows: 2, max: 2 }));
    }

    // ── local_additions ────────────────────────────────────────────────────

    #[test]
    fn local_additions_respect_suppression_and_capacity() {
        let remote = remote(&[("Milk", false), ("Eggs", false), ("Ham", false), ("Jam", false)]);
        let local_keys = HashSet::from([key("milk")]);
        let suppressed = HashSet::from([key("eggs")]);

        let to_add = local_additions(remote.active(), &local_keys, &suppressed, 1);
        assert_eq!(to_add, vec!["Ham".to_string()]);
    }

    #[test]
    fn local_additions_ignore_striked_rows() {
        let remote = remote(&[("Milk", true), ("Eggs", false)]);
        let to_add = local_additions(remote.active(), &HashSet::new(), &HashSet::new(), 10);
        assert_eq!(to_add, vec!["Eggs".to_string()]);
    }

    // ── local_removals ─────────────────────────────────────────────────────

    #[test]
    fn local_removals_keep_original_summary() {
        let items = [LocalItem::new("Milk"), LocalItem::new("  Old Stuff")];
        let remote_keys = HashSet::from([key("milk")]);
        assert_eq!(local_removals(&items, &remote_keys), vec!["  Old Stuff".to_string()]);
    }

    // ── remote_removals ────────────────────────────────────────────────────

    #[test]
    fn remote_removals_match_ledger_and_skip_already_removed() {
        let remote = remote(&[("Milk", false), ("Eggs", false), ("Ham", false)]);
        let mut ledger = AntiEchoLedger::new();
        ledger.record_remove(key("milk"));
        ledger.record_remove(key("eggs"));
        ledger.record_remove(key("caviar"));
        let already = HashSet::from([RowId::new("r1")]);

        let removals = remote_removals(&remote.key_index(), &ledger, &already);
        assert_eq!(removals, vec![(key("milk"), RowId::new("r0"))]);
    }
}
