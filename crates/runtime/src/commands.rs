use serde::{Deserialize, Serialize};

use keepsync_engine::{EngineStatus, MutationEvent, PassSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientCommand {
    /// An intercepted Keep mutation, forwarded by the host.
    Event(MutationEvent),
    /// Run the bidirectional pass now.
    Refresh,
    AddItem { list_id: Option<String>, text: String },
    GetStatus,
    ReloadConfig,
    Ping,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerEvent {
    Pass(PassSummary),
    Status(EngineStatus),
    Ack(String),
    Error(String),
}
