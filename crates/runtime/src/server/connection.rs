//! Unix domain socket connection handling and command dispatch.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use keepsync_config::AppConfig;
use keepsync_engine::{Classification, NormalizedKey};

use crate::{ClientCommand, ServerEvent};

use super::{DaemonState, engine_config};

pub(super) async fn handle_connection(
    stream: UnixStream,
    state: Arc<Mutex<DaemonState>>,
    shutdown_tx: watch::Sender<bool>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(());
    }

    let command: ClientCommand = match serde_json::from_str(line.trim()) {
        Ok(command) => command,
        Err(err) => {
            warn!(%err, "undecodable client command");
            return send_event(&mut write_half, ServerEvent::Error(format!("bad command: {err}")))
                .await;
        }
    };
    debug!(?command, "client command");

    let reply = match command {
        ClientCommand::Event(event) => {
            let mut state = state.lock().await;
            match state.engine.on_mutation_event(&event).await {
                Some(classification) => ServerEvent::Ack(describe(&classification)),
                None => ServerEvent::Ack("ignored".to_string()),
            }
        }
        ClientCommand::Refresh => {
            let mut state = state.lock().await;
            match state.engine.refresh().await {
                Ok(summary) => ServerEvent::Pass(summary),
                Err(err) => ServerEvent::Error(err.to_string()),
            }
        }
        ClientCommand::AddItem { list_id, text } => {
            let mut state = state.lock().await;
            match state.engine.add_item(list_id.as_deref(), &text).await {
                Ok(()) => ServerEvent::Ack(format!("added '{}'", text.trim())),
                Err(err) => ServerEvent::Error(err.to_string()),
            }
        }
        ClientCommand::GetStatus => {
            let state = state.lock().await;
            ServerEvent::Status(state.engine.status())
        }
        ClientCommand::ReloadConfig => {
            let mut state = state.lock().await;
            let loaded = AppConfig::load_from(&state.config_path)
                .and_then(|config| config.validate().map(|()| config));
            match loaded {
                Ok(updated) => {
                    state.engine.reload(engine_config(&updated));
                    info!(path = %state.config_path.display(), "config reloaded");
                    ServerEvent::Ack("config reloaded".to_string())
                }
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "config reload rejected; keeping current config");
                    ServerEvent::Error(format!("config rejected: {err:#}"))
                }
            }
        }
        ClientCommand::Ping => ServerEvent::Ack("pong".to_string()),
        ClientCommand::Shutdown => {
            let _ = shutdown_tx.send(true);
            ServerEvent::Ack("shutdown requested".to_string())
        }
    };

    send_event(&mut write_half, reply).await
}

fn describe(classification: &Classification) -> String {
    match classification {
        Classification::Added(keys) => format!("added: {}", join(keys)),
        Classification::Removed(keys) => format!("removed: {}", join(keys)),
        Classification::Completed(key) => format!("completed: {key}"),
        Classification::Touched(keys) => format!("updated: {}", join(keys)),
    }
}

fn join(keys: &[NormalizedKey]) -> String {
    keys.iter().map(NormalizedKey::as_str).collect::<Vec<_>>().join(", ")
}

async fn send_event(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    event: ServerEvent,
) -> Result<()> {
    let encoded = serde_json::to_string(&event)?;
    writer.write_all(encoded.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
