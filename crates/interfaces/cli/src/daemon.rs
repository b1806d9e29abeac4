use std::path::Path;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use keepsync_config::{AppConfig, TelemetryConfig};
use keepsync_runtime::{DaemonClient, run_daemon};

/// Install the global subscriber.  `RUST_LOG` wins over
/// `telemetry.log_level`.  The daemon also writes a daily-rolling file when
/// `telemetry.log_dir` is set; keep the returned guard alive until exit.
pub(crate) fn init_logging(telemetry: &TelemetryConfig, daemon: bool) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&telemetry.log_level))?;
    let log_dir = telemetry.log_dir.trim();

    if !daemon || log_dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, "keepsync.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

pub(crate) async fn run_foreground(
    config: AppConfig,
    config_path: &Path,
    socket_path: &Path,
) -> Result<()> {
    if is_socket_live(socket_path) {
        bail!("a daemon is already listening on {}", socket_path.display());
    }
    info!(
        config = %config_path.display(),
        socket = %socket_path.display(),
        list_id = %config.ica.list_id,
        "starting keepsync daemon"
    );
    let result = run_daemon(config, config_path, socket_path).await;
    match &result {
        Ok(()) => info!("keepsync daemon exited"),
        Err(err) => tracing::error!(error = %format!("{err:#}"), "keepsync daemon failed"),
    }
    result
}

pub(crate) async fn daemon_stop(client: &DaemonClient) -> Result<()> {
    if !is_socket_live(client.socket_path()) {
        println!("daemon is not running");
        return Ok(());
    }

    client.graceful_shutdown().await?;
    info!(socket = %client.socket_path().display(), "shutdown requested");
    for _ in 0..40 {
        if !client.socket_path().exists() {
            println!("daemon stopped");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    warn!(socket = %client.socket_path().display(), "socket still present after shutdown request");
    println!("daemon stop requested; socket still present at {}", client.socket_path().display());
    Ok(())
}

pub(crate) fn is_socket_live(path: &Path) -> bool {
    std::os::unix::net::UnixStream::connect(path).is_ok()
}
