use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::warn;

use keepsync_engine::{EngineStatus, MutationEvent, PassSummary};

use crate::{ClientCommand, ServerEvent};

#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub async fn connect_with_backoff(&self, max_attempts: usize) -> Result<()> {
        let mut delay = Duration::from_millis(100);
        for attempt in 0..max_attempts.max(1) {
            match UnixStream::connect(&self.socket_path).await {
                Ok(_) => return Ok(()),
                Err(err) => {
                    if attempt + 1 == max_attempts.max(1) {
                        return Err(err.into());
                    }
                    warn!(attempt, ?err, "daemon connect failed; retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(2));
                }
            }
        }
        Ok(())
    }

    pub async fn ping(&self) -> Result<String> {
        self.expect_ack(ClientCommand::Ping).await
    }

    /// Forward one Keep mutation.  The reply says how it was classified.
    pub async fn send_event(&self, event: MutationEvent) -> Result<String> {
        self.expect_ack(ClientCommand::Event(event)).await
    }

    pub async fn refresh(&self) -> Result<PassSummary> {
        match self.request(ClientCommand::Refresh).await? {
            ServerEvent::Pass(summary) => Ok(summary),
            ServerEvent::Error(err) => bail!("refresh failed: {err}"),
            other => bail!("unexpected daemon reply: {other:?}"),
        }
    }

    pub async fn add_item(&self, list_id: Option<String>, text: &str) -> Result<String> {
        self.expect_ack(ClientCommand::AddItem {
            list_id,
            text: text.to_string(),
        })
        .await
    }

    pub async fn get_status(&self) -> Result<EngineStatus> {
        match self.request(ClientCommand::GetStatus).await? {
            ServerEvent::Status(status) => Ok(status),
            ServerEvent::Error(err) => bail!("{err}"),
            other => bail!("unexpected daemon reply: {other:?}"),
        }
    }

    pub async fn reload_config(&self) -> Result<String> {
        self.expect_ack(ClientCommand::ReloadConfig).await
    }

    pub async fn graceful_shutdown(&self) -> Result<()> {
        self.expect_ack(ClientCommand::Shutdown).await?;
        Ok(())
    }

    async fn expect_ack(&self, command: ClientCommand) -> Result<String> {
        match self.request(command).await? {
            ServerEvent::Ack(msg) => Ok(msg),
            ServerEvent::Error(err) => bail!("{err}"),
            other => bail!("unexpected daemon reply: {other:?}"),
        }
    }

    /// One command per connection, one reply line back.
    async fn request(&self, command: ClientCommand) -> Result<ServerEvent> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (read_half, mut write_half) = stream.into_split();

        let request = serde_json::to_string(&command)?;
        write_half.write_all(request.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
        write_half.flush().await?;

        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            bail!("daemon closed the connection without replying; check daemon logs");
        }
        Ok(serde_json::from_str(line.trim())?)
    }
}
