//! Persistent client settings at `<config_dir>/voschat/config.json`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ENV_BASE_URL: &str = "VOSCHAT_BASE_URL";
pub const ENV_WS_URL: &str = "VOSCHAT_WS_URL";
pub const ENV_USER: &str = "VOSCHAT_USER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Default sender for commands that post messages.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8080/ws".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_reconnect_initial_ms() -> u64 {
    500
}

fn default_reconnect_max_ms() -> u64 {
    30000
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: default_base_url(),
            ws_url: default_ws_url(),
            user: None,
            request_timeout_ms: default_request_timeout_ms(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }
}

/// Default location of the settings file.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("voschat").join("config.json"))
}

impl Settings {
    /// Load from `path` (or the default location), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => config_path(),
        };
        let mut settings = match path {
            Some(p) => Self::load_from(&p)?,
            None => {
                warn!("Could not determine config dir, using default settings");
                Settings::default()
            }
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Read a settings file. Missing, empty or corrupt files yield defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!("No settings at {:?}, using defaults", path);
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            warn!("Settings file {:?} is empty, using defaults", path);
            return Ok(Settings::default());
        }

        match serde_json::from_str(&content) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!(
                    "Failed to parse settings at {:?} ({}), using defaults",
                    path, e
                );
                Ok(Settings::default())
            }
        }
    }

    /// Override fields from `VOSCHAT_*` variables as resolved by `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(base_url) = set(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(ws_url) = set(ENV_WS_URL) {
            self.ws_url = ws_url;
        }
        if let Some(user) = set(ENV_USER) {
            self.user = Some(user);
        }
    }

    /// Write pretty JSON to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path =
            config_path().ok_or_else(|| anyhow::anyhow!("Could not determine config dir"))?;
        self.save_to(&path)?;
        Ok(path)
    }
}
