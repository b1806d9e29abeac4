mod client;
mod commands;
mod server;

pub use client::DaemonClient;
pub use commands::{ClientCommand, ServerEvent};
pub use server::{Collaborators, engine_config, run_daemon, run_daemon_with};
