//! Persistence for user preferences
//!
//! **Config** (`config.json`) lives in the platform config directory,
//! e.g. `~/.config/herald/` on Linux or `~/Library/Application Support/herald/`
//! on macOS. Missing or unreadable files fall back to defaults.

use crate::http::DEFAULT_PORT;
use crate::store::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name the browser uses to find the native messaging host.
pub const DEFAULT_HOST_NAME: &str = "com.herald.monitor";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// User preferences (persisted to config.json).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Relay socket path; `None` uses the temp-dir default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
    /// Port of the HTTP polling server (bound on 127.0.0.1).
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Notifications kept by the polling server.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Native messaging host name written into the manifest.
    #[serde(default = "default_host_name")]
    pub host_name: String,
}

fn default_http_port() -> u16 {
    DEFAULT_PORT
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_host_name() -> String {
    DEFAULT_HOST_NAME.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: None,
            http_port: default_http_port(),
            capacity: default_capacity(),
            host_name: default_host_name(),
        }
    }
}

// ---------------------------------------------------------------------------
// Directory helpers
// ---------------------------------------------------------------------------

/// Herald config directory (e.g. `~/.config/herald/`).
fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("herald"))
}

/// Location of `config.json`, if the platform has a config directory.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.json"))
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load config from disk, returning defaults if the file is missing or invalid.
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    load_config_from(&path)
}

/// Save config to disk, returning the path written.
pub fn save_config(config: &Config) -> Result<PathBuf, std::io::Error> {
    let path = config_path().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "config dir not found")
    })?;
    save_config_to(config, &path)?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Path-parameterised helpers (used by public API and tests)
// ---------------------------------------------------------------------------

fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}

fn save_config_to(config: &Config, path: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;
    atomic_write(path, json.as_bytes())
}

/// Write bytes to a file atomically: write to a temp file in the same
/// directory, then rename over the target. Prevents partial JSON on crash.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> Result<(), std::io::Error> {
    use std::io::Write;

    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent")
    })?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
