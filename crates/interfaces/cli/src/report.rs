//! Human-readable output for daemon replies.

use std::path::Path;

use keepsync_config::AppConfig;
use keepsync_engine::{EngineStatus, PassSummary};

pub(crate) fn print_summary(summary: &PassSummary) {
    if summary.is_noop() {
        println!("in sync, nothing changed");
    } else {
        println!("── pass {:?} ──────────────────────────────", summary.kind);
        println!("  ICA striked removed : {}", summary.remote_striked_removed);
        println!("  ICA added           : {}", summary.remote_added);
        println!("  ICA removed         : {}", summary.remote_removed);
        println!("  Keep added          : {}", summary.local_added);
        println!("  Keep removed        : {}", summary.local_removed);
    }
    if !summary.sensor_notified {
        println!("  sensor not refreshed");
    }
    for failure in &summary.failures {
        println!("  failed {:?} '{}': {}", failure.step, failure.item, failure.reason);
    }
}

pub(crate) fn print_status(status: &EngineStatus) {
    println!("keepsync status");
    println!("- list: {}", status.list_id);
    match &status.local_entity {
        Some(entity) => println!("- keep entity: {entity}"),
        None => println!("- keep entity: none (remote-only)"),
    }
    println!(
        "- ledger: {} recent adds, {} recent removes",
        status.recent_adds, status.recent_removes
    );
    println!("- debounced sync pending: {}", status.debounce_pending);
    println!("- passes run: {}", status.passes_run);
    if let Some(pass) = &status.last_pass {
        println!(
            "- last pass: {:?} at {} ({} changes, {} failures)",
            pass.kind,
            pass.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            pass.changes(),
            pass.failures.len()
        );
    }
    if let Some(err) = &status.last_error {
        println!("- last error: {err}");
    }
}

pub(crate) fn print_config(config: &AppConfig, path: &Path) {
    println!("configuration ok ({})", path.display());
    println!("- ica list: {}", config.ica.list_id);
    println!("- ica capacity: {}", config.ica.max_items);
    match config.keep.entity() {
        Some(entity) => println!("- keep entity: {entity} (capacity {})", config.keep.max_items),
        None => println!("- keep entity: none (remote-only mode)"),
    }
    println!("- remove striked: {}", config.sync.remove_striked);
    println!("- debounce: {}s", config.sync.debounce_seconds);
    match config.sensor_entity_for(&config.ica.list_id) {
        Some(sensor) => println!("- sensor: {sensor}"),
        None => println!("- sensor: disabled"),
    }
    println!("- socket: {}", config.daemon.socket_path);
}
