use thiserror::Error;

/// Failures that abort an engine operation.
///
/// Per-item add/remove failures inside a pass are not errors: they are
/// recorded in the pass summary and retried by the next trigger.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("ICA list is full ({rows} of {max} rows)")]
    RemoteFull { rows: usize, max: usize },

    #[error("ICA list {0} not found")]
    ListNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("ICA refused to add '{0}'")]
    RemoteRejected(String),

    #[error("ICA request failed: {0:#}")]
    Remote(anyhow::Error),

    #[error("Keep request failed: {0:#}")]
    Local(anyhow::Error),
}

impl SyncError {
    /// Configuration problems that retrying will not fix.  Passes that end
    /// in one are logged as warnings rather than errors.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::ListNotFound(_) | Self::InvalidArgument(_))
    }
}
