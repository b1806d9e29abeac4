//! Sync daemon: owns the engine and serves commands over a Unix socket.

mod connection;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::UnixListener;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{error, info, warn};

use keepsync_config::AppConfig;
use keepsync_engine::{EngineConfig, LocalStore, RemoteStore, SensorNotifier, SyncEngine};
use keepsync_hass::HassClient;
use keepsync_ica::IcaClient;

/// The stores the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub remote: Arc<dyn RemoteStore>,
    pub local: Arc<dyn LocalStore>,
    pub notifier: Arc<dyn SensorNotifier>,
}

impl Collaborators {
    /// HTTP adapters for ICA and Home Assistant built from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.ica.request_timeout_secs);
        let ica = IcaClient::new(&config.ica.base_url, &config.ica.session_id, timeout)?;

        if config.hass.token.trim().is_empty() {
            warn!("hass.token is empty; Home Assistant calls will be rejected");
        }
        let hass = Arc::new(
            HassClient::new(&config.hass.base_url, &config.hass.token, timeout)?
                .with_sensor_template(&config.hass.sensor_entity),
        );

        Ok(Self {
            remote: Arc::new(ica),
            local: hass.clone(),
            notifier: hass,
        })
    }
}

struct DaemonState {
    engine: SyncEngine,
    /// Re-read on `ReloadConfig`.
    config_path: PathBuf,
}

pub fn engine_config(config: &AppConfig) -> EngineConfig {
    EngineConfig {
        list_id: config.ica.list_id.clone(),
        local_entity: config.keep.entity().map(str::to_string),
        remove_striked: config.sync.remove_striked,
        max_remote_items: config.ica.max_items,
        max_local_items: config.keep.max_items,
        debounce: Duration::from_secs(config.sync.debounce_seconds),
    }
}

/// Run the daemon against the live ICA and Home Assistant APIs.
pub async fn run_daemon(
    config: AppConfig,
    config_path: impl AsRef<Path>,
    socket_path: impl AsRef<Path>,
) -> Result<()> {
    config.validate()?;
    let collaborators = Collaborators::from_config(&config)?;
    run_daemon_with(config, config_path, socket_path, collaborators).await
}

/// Run the daemon with explicit collaborators until a `Shutdown` command or
/// Ctrl-C.
pub async fn run_daemon_with(
    config: AppConfig,
    config_path: impl AsRef<Path>,
    socket_path: impl AsRef<Path>,
    collaborators: Collaborators,
) -> Result<()> {
    config.validate()?;
    let socket_path = socket_path.as_ref().to_path_buf();
    if socket_path.exists() {
        let _ = std::fs::remove_file(&socket_path);
    }

    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
    let engine = SyncEngine::new(
        engine_config(&config),
        collaborators.remote,
        collaborators.local,
        collaborators.notifier,
        tick_tx,
    );
    info!(
        list_id = %config.ica.list_id,
        entity = config.keep.entity().unwrap_or("<none>"),
        "sync engine ready"
    );

    let state = Arc::new(Mutex::new(DaemonState {
        engine,
        config_path: config_path.as_ref().to_path_buf(),
    }));

    let listener = UnixListener::bind(&socket_path)?;
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    info!(path = %socket_path.display(), "daemon listening");

    // Debounce firings run the Keep -> ICA sync under the same lock as
    // every command.
    {
        let tick_state = state.clone();
        let mut tick_shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    tick = tick_rx.recv() => {
                        let Some(tick) = tick else { break };
                        let mut s = tick_state.lock().await;
                        // The engine logs the pass outcome.
                        let _ = s.engine.on_debounce_tick(tick).await;
                    }
                    changed = tick_shutdown_rx.changed() => {
                        if changed.is_ok() && *tick_shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
    }

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_ok() && *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received");
                let _ = shutdown_tx.send(true);
                break;
            }
            accept = listener.accept() => {
                let (stream, _) = accept?;
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = connection::handle_connection(stream, state, shutdown_tx).await {
                        error!(?err, "daemon connection handler failed");
                    }
                });
            }
        }
    }

    info!("daemon shutting down");
    if state.lock().await.engine.cancel_pending() {
        info!("pending Keep -> ICA sync dropped");
    }
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}
