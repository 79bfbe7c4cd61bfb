//! Native messaging host manifest
//!
//! The browser only launches hosts it finds a manifest for. The manifest
//! names the host, points at this executable and lists the extensions
//! allowed to connect.

use crate::config::atomic_write;
use crate::error::ManifestError;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Browsers whose manifest directory we know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Browser {
    Chrome,
    Chromium,
}

impl Browser {
    /// Profile directory below the platform config dir.
    fn profile_dir(self) -> &'static str {
        match self {
            Self::Chrome if cfg!(target_os = "macos") => "Google/Chrome",
            Self::Chrome => "google-chrome",
            Self::Chromium if cfg!(target_os = "macos") => "Chromium",
            Self::Chromium => "chromium",
        }
    }

    /// Per-user `NativeMessagingHosts` directory.
    pub fn hosts_dir(self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(self.profile_dir()).join("NativeMessagingHosts"))
    }

    /// `dir` if given, otherwise [`Self::hosts_dir`].
    pub fn resolve_hosts_dir(self, dir: Option<PathBuf>) -> Result<PathBuf, ManifestError> {
        dir.or_else(|| self.hosts_dir())
            .ok_or(ManifestError::NoConfigDir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostManifest {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: String,
    pub allowed_origins: Vec<String>,
}

impl HostManifest {
    pub fn new(
        host_name: &str,
        executable: &Path,
        extension_id: &str,
    ) -> Result<Self, ManifestError> {
        if !is_valid_host_name(host_name) {
            return Err(ManifestError::InvalidHostName(host_name.to_string()));
        }
        if !is_valid_extension_id(extension_id) {
            return Err(ManifestError::InvalidExtensionId(extension_id.to_string()));
        }

        Ok(Self {
            name: host_name.to_string(),
            description: "Herald notification relay".to_string(),
            path: executable.to_path_buf(),
            kind: "stdio".to_string(),
            allowed_origins: vec![format!("chrome-extension://{extension_id}/")],
        })
    }

    /// File name the browser looks up, `<name>.json`.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.name)
    }

    /// Write the manifest into `dir`, returning the file path.
    pub fn install(&self, dir: &Path) -> Result<PathBuf, ManifestError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(&path, json.as_bytes())?;
        Ok(path)
    }
}

/// Dot-separated segments of lowercase alphanumerics and underscores.
fn is_valid_host_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        })
}

/// Chrome extension ids are 32 characters from `a` to `p`.
fn is_valid_extension_id(id: &str) -> bool {
    id.len() == 32 && id.chars().all(|c| ('a'..='p').contains(&c))
}
