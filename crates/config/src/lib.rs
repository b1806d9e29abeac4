use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/keepsync.toml";

// ── ICA (remote list) ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IcaConfig {
    /// Pre-established session token.  Overridden by `ICA_SESSION_ID`.
    pub session_id: String,
    /// The shopping list kept in sync with Keep.
    pub list_id: String,
    pub base_url: String,
    /// Hard capacity of the remote list.  Adds stop once the list holds this
    /// many rows.
    pub max_items: usize,
    /// Per-request timeout applied by the HTTP adapters.
    pub request_timeout_secs: u64,
}

impl Default for IcaConfig {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            list_id: String::new(),
            base_url: "https://apimgw-pub.ica.se/sverige/digx/shopping-list/v1/api".to_string(),
            max_items: 250,
            request_timeout_secs: 15,
        }
    }
}

// ── Keep (local todo list) ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepConfig {
    /// Home Assistant `todo.*` entity mirrored against the ICA list.  Empty
    /// means remote-only mode: the sensor and direct adds keep working but no
    /// Keep sync happens.
    pub entity_id: String,
    pub max_items: usize,
}

impl Default for KeepConfig {
    fn default() -> Self {
        Self {
            entity_id: String::new(),
            max_items: 100,
        }
    }
}

impl KeepConfig {
    pub fn entity(&self) -> Option<&str> {
        let trimmed = self.entity_id.trim();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delete striked ICA rows and completed Keep items during a refresh.
    pub remove_striked: bool,
    /// Quiet period after the last Keep mutation before Keep → ICA runs.
    pub debounce_seconds: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remove_striked: true,
            debounce_seconds: 1,
        }
    }
}

// ── Home Assistant ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HassConfig {
    /// Overridden by `HASS_BASE_URL`.
    pub base_url: String,
    /// Long-lived access token.  Overridden by `HASS_TOKEN`.
    pub token: String,
    /// Sensor refreshed after a sync batch.  `{list_id}` is replaced with the
    /// ICA list id.  Empty disables sensor refreshes.
    pub sensor_entity: String,
}

impl Default for HassConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8123".to_string(),
            token: String::new(),
            sensor_entity: "sensor.ica_shopping_{list_id}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Directory for daily-rolling daemon logs.  Empty logs to stderr only.
    pub log_dir: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: "/tmp/keepsync.sock".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub ica: IcaConfig,
    pub keep: KeepConfig,
    pub sync: SyncConfig,
    pub hass: HassConfig,
    pub telemetry: TelemetryConfig,
    pub daemon: DaemonConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        // Secrets and host location may come from the environment instead of
        // the file; env takes precedence.
        if let Ok(value) = env::var("ICA_SESSION_ID") {
            if !value.trim().is_empty() {
                config.ica.session_id = value;
            }
        }
        if let Ok(value) = env::var("HASS_TOKEN") {
            if !value.trim().is_empty() {
                config.hass.token = value;
            }
        }
        if let Ok(value) = env::var("HASS_BASE_URL") {
            if !value.trim().is_empty() {
                config.hass.base_url = value;
            }
        }

        config.normalize();
        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    /// Trim user-entered identifiers in place.
    pub fn normalize(&mut self) {
        self.ica.session_id = self.ica.session_id.trim().to_string();
        self.ica.list_id = self.ica.list_id.trim().to_string();
        self.keep.entity_id = self.keep.entity_id.trim().to_string();
    }

    /// Reject configurations the sync engine cannot run with.
    ///
    /// A missing Keep entity is valid (remote-only mode) and is not reported.
    pub fn validate(&self) -> Result<()> {
        if self.ica.session_id.trim().is_empty() {
            bail!("ica.session_id is required (or set ICA_SESSION_ID)");
        }
        if self.ica.list_id.trim().is_empty() {
            bail!("ica.list_id is required");
        }
        if self.ica.max_items == 0 {
            bail!("ica.max_items must be greater than zero");
        }
        if self.keep.max_items == 0 {
            bail!("keep.max_items must be greater than zero");
        }
        Ok(())
    }

    /// Sensor entity for `list_id`, or `None` when sensor refreshes are off.
    pub fn sensor_entity_for(&self, list_id: &str) -> Option<String> {
        let template = self.hass.sensor_entity.trim();
        if template.is_empty() {
            return None;
        }
        Some(template.replace("{list_id}", list_id))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
