//! Reconciliation core for keeping an ICA shopping list and a Keep todo list
//! converged.
//!
//! The pieces, leaf first:
//! - [`snapshot`]: normalized read/write access to both stores
//! - [`ledger`]: recent adds/removes used to suppress echoes
//! - [`debounce`]: single-slot delayed trigger
//! - [`classifier`]: turns intercepted Keep mutations into ledger updates
//! - [`plan`]: pure set-difference planning
//! - [`engine`]: the passes that apply those plans

pub mod classifier;
pub mod debounce;
pub mod engine;
mod error;
pub mod ledger;
pub mod model;
pub mod plan;
pub mod snapshot;
mod store;
mod summary;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use classifier::{Classification, classify};
pub use debounce::{DebounceTick, Debouncer};
pub use engine::{EngineConfig, EngineStatus, SyncEngine};
pub use error::SyncError;
pub use ledger::AntiEchoLedger;
pub use model::{
    ItemStatus, LocalItem, MutationEvent, NormalizedKey, OneOrMany, RemoteItem, RemoteList, RowId,
    ServiceData, TodoService,
};
pub use store::{LocalStore, RemoteStore, SensorNotifier};
pub use summary::{PassKind, PassSummary, Step, StepFailure};
