//! Configuration Vault – reads/writes `~/.binos/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Persisted node configuration stored in `~/.binos/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP/WebSocket port for the status surface.
    #[serde(default = "default_status_port")]
    pub status_port: u16,

    /// Base URL of the fleet backend (fill reports).
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Base URL of the image-classification service.
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Control-loop tick interval in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_interval_ms: u64,
}

fn default_status_port() -> u16 {
    8080
}
fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_service_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_tick_ms() -> u64 {
    50
}

impl Default for Config {
    fn default() -> Self {
        Self {
            status_port: default_status_port(),
            backend_url: default_backend_url(),
            service_url: default_service_url(),
            tick_interval_ms: default_tick_ms(),
        }
    }
}

/// Return the path to `~/.binos/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".binos").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `BINOS_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `BINOS_BACKEND_URL` | `backend_url` |
/// | `BINOS_SERVICE_URL` | `service_url` |
/// | `BINOS_STATUS_PORT` | `status_port` |
/// | `BINOS_TICK_MS` | `tick_interval_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("BINOS_BACKEND_URL") {
        cfg.backend_url = v;
    }
    if let Ok(v) = std::env::var("BINOS_SERVICE_URL") {
        cfg.service_url = v;
    }
    if let Ok(v) = std::env::var("BINOS_STATUS_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.status_port = port;
    }
    if let Ok(v) = std::env::var("BINOS_TICK_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.tick_interval_ms = ms;
    }
}

/// Save the config to disk, creating `~/.binos/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Restrict the config directory to the owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
