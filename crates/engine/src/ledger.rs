//! Anti-echo bookkeeping.
//!
//! Keys the user just added to or removed from Keep.  A full pass consults
//! the ledger so a Keep removal is not undone by the ICA → Keep direction,
//! then clears it.

use std::collections::HashSet;

use crate::model::NormalizedKey;

#[derive(Debug, Clone, Default)]
pub struct AntiEchoLedger {
    recent_adds: HashSet<NormalizedKey>,
    recent_removes: HashSet<NormalizedKey>,
}

impl AntiEchoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest observation for a key wins, so an add withdraws an earlier
    /// remove of the same key and vice versa.
    pub fn record_add(&mut self, key: NormalizedKey) {
        self.recent_removes.remove(&key);
        self.recent_adds.insert(key);
    }

    pub fn record_remove(&mut self, key: NormalizedKey) {
        self.recent_adds.remove(&key);
        self.recent_removes.insert(key);
    }

    pub fn is_recently_added(&self, key: &NormalizedKey) -> bool {
        self.recent_adds.contains(key)
    }

    pub fn is_recently_removed(&self, key: &NormalizedKey) -> bool {
        self.recent_removes.contains(key)
    }

    pub fn recent_adds(&self) -> impl Iterator<Item = &NormalizedKey> {
        self.recent_adds.iter()
    }

    pub fn recent_removes(&self) -> impl Iterator<Item = &NormalizedKey> {
        self.recent_removes.iter()
    }

    pub fn adds_len(&self) -> usize {
        self.recent_adds.len()
    }

    pub fn removes_len(&self) -> usize {
        self.recent_removes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent_adds.is_empty() && self.recent_removes.is_empty()
    }

    pub fn clear(&mut self) {
        self.recent_adds.clear();
        self.recent_removes.clear();
    }
}
