//! Drives a daemon over its Unix socket with in-memory stores.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use keepsync_config::AppConfig;
use keepsync_engine::MutationEvent;
use keepsync_engine::testing::{MemoryLocal, MemoryRemote, RecordingNotifier};
use keepsync_runtime::{Collaborators, DaemonClient, run_daemon_with};
use tempfile::TempDir;
use tokio::task::JoinHandle;

const KEEP: &str = "todo.shopping";

struct Running {
    client: DaemonClient,
    remote: Arc<MemoryRemote>,
    local: Arc<MemoryLocal>,
    notifier: Arc<RecordingNotifier>,
    daemon: JoinHandle<anyhow::Result<()>>,
    config_path: std::path::PathBuf,
    _dir: TempDir,
}

fn config(list_id: &str, debounce_seconds: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.ica.session_id = "token".to_string();
    config.ica.list_id = list_id.to_string();
    config.keep.entity_id = KEEP.to_string();
    config.sync.debounce_seconds = debounce_seconds;
    config
}

async fn start(remote: MemoryRemote, local: MemoryLocal, debounce_seconds: u64) -> Running {
    let dir = TempDir::new().unwrap();
    let socket = dir.path().join("keepsync.sock");
    let config_path = dir.path().join("keepsync.toml");
    let config = config("weekly", debounce_seconds);
    config.save_to(&config_path).unwrap();

    let remote = Arc::new(remote);
    let local = Arc::new(local);
    let notifier = Arc::new(RecordingNotifier::default());
    let collaborators = Collaborators {
        remote: remote.clone(),
        local: local.clone(),
        notifier: notifier.clone(),
    };

    let daemon = tokio::spawn({
        let socket = socket.clone();
        let config_path = config_path.clone();
        async move { run_daemon_with(config, config_path, socket, collaborators).await }
    });

    let client = DaemonClient::new(&socket);
    wait_for_socket(&socket).await;
    client.connect_with_backoff(10).await.unwrap();

    Running {
        client,
        remote,
        local,
        notifier,
        daemon,
        config_path,
        _dir: dir,
    }
}

async fn wait_for_socket(path: &Path) {
    for _ in 0..50 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("daemon socket never appeared at {}", path.display());
}

async fn stop(running: Running) {
    running.client.graceful_shutdown().await.unwrap();
    running.daemon.await.unwrap().unwrap();
}

#[tokio::test]
async fn ping_and_status() {
    let running = start(
        MemoryRemote::with_list("weekly", &["milk"]),
        MemoryLocal::default(),
        1,
    )
    .await;

    assert_eq!(running.client.ping().await.unwrap(), "pong");
    let status = running.client.get_status().await.unwrap();
    assert_eq!(status.list_id, "weekly");
    assert_eq!(status.local_entity.as_deref(), Some(KEEP));
    assert!(!status.remote_only);
    assert_eq!(status.passes_run, 0);

    stop(running).await;
}

#[tokio::test]
async fn refresh_over_socket_converges() {
    let running = start(
        MemoryRemote::with_list("weekly", &["milk", "eggs"]),
        MemoryLocal::with_items(&["milk"]),
        1,
    )
    .await;

    let summary = running.client.refresh().await.unwrap();

    assert_eq!(summary.local_added, 1);
    assert_eq!(running.local.summaries(), vec!["milk", "eggs"]);
    assert_eq!(running.notifier.count(), 1);
    stop(running).await;
}

#[tokio::test]
async fn forwarded_add_event_reaches_ica_after_debounce() {
    let running = start(
        MemoryRemote::with_list("weekly", &[]),
        MemoryLocal::with_items(&["bread"]),
        0,
    )
    .await;

    let ack = running
        .client
        .send_event(MutationEvent::add(KEEP, "Bread"))
        .await
        .unwrap();
    assert_eq!(ack, "added: bread");

    let mut synced = false;
    for _ in 0..100 {
        if running.remote.texts("weekly") == vec!["bread"] {
            synced = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(synced, "debounced sync never pushed the Keep add");

    let status = running.client.get_status().await.unwrap();
    assert_eq!(status.passes_run, 1);
    assert!(!status.debounce_pending);
    stop(running).await;
}

#[tokio::test]
async fn foreign_entity_event_is_ignored() {
    let running = start(MemoryRemote::with_list("weekly", &[]), MemoryLocal::default(), 1).await;

    let ack = running
        .client
        .send_event(MutationEvent::add("todo.chores", "mop"))
        .await
        .unwrap();
    assert_eq!(ack, "ignored");
    assert!(!running.client.get_status().await.unwrap().debounce_pending);
    stop(running).await;
}

#[tokio::test]
async fn add_item_errors_are_reported() {
    let running = start(MemoryRemote::with_list("weekly", &[]), MemoryLocal::default(), 1).await;

    running.client.add_item(None, "Coffee").await.unwrap();
    assert_eq!(running.remote.texts("weekly"), vec!["Coffee"]);

    let err = running.client.add_item(None, "   ").await.unwrap_err();
    assert!(err.to_string().contains("invalid argument"));
    stop(running).await;
}

#[tokio::test]
async fn reload_picks_up_new_list_and_rejects_invalid_files() {
    let remote = MemoryRemote::with_list("weekly", &[]);
    remote.add_list("holiday", &[]);
    let running = start(remote, MemoryLocal::default(), 1).await;

    config("holiday", 1).save_to(&running.config_path).unwrap();
    running.client.reload_config().await.unwrap();
    assert_eq!(running.client.get_status().await.unwrap().list_id, "holiday");

    std::fs::write(&running.config_path, "[ica]\nsession_id = \"token\"\nlist_id = \"\"\n").unwrap();
    assert!(running.client.reload_config().await.is_err());
    assert_eq!(running.client.get_status().await.unwrap().list_id, "holiday");
    stop(running).await;
}
