use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Keep → ICA after the debounce window.
    Debounced,
    /// Bidirectional refresh.
    Full,
    /// Single-item removal for a Keep completion.
    FastPath,
}

/// The mutation a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    RemoveStrikedRow,
    RemoveCompletedLocal,
    RemoveCompletedRow,
    AddLocal,
    RemoveLocal,
    RemoveRow,
    AddRow,
    NotifySensor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: Step,
    pub item: String,
    pub reason: String,
}

/// What one pass applied, and which individual mutations failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub kind: PassKind,
    pub started_at: DateTime<Utc>,
    pub remote_striked_removed: usize,
    pub remote_added: usize,
    pub remote_removed: usize,
    pub local_added: usize,
    pub local_removed: usize,
    pub sensor_notified: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<StepFailure>,
}

impl PassSummary {
    pub fn new(kind: PassKind) -> Self {
        Self {
            kind,
            started_at: Utc::now(),
            remote_striked_removed: 0,
            remote_added: 0,
            remote_removed: 0,
            local_added: 0,
            local_removed: 0,
            sensor_notified: false,
            failures: Vec::new(),
        }
    }

    /// Total mutations applied to either store.
    pub fn changes(&self) -> usize {
        self.remote_striked_removed
            + self.remote_added
            + self.remote_removed
            + self.local_added
            + self.local_removed
    }

    pub fn is_noop(&self) -> bool {
        self.changes() == 0
    }

    pub(crate) fn fail(&mut self, step: Step, item: &str, reason: impl ToString) {
        self.failures.push(StepFailure {
            step,
            item: item.to_string(),
            reason: reason.to_string(),
        });
    }
}
