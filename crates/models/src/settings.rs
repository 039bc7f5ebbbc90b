use crate::Version;
use crate::timestamp;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::UtcDateTime;

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where mods are installed. Unset until the user picks a location.
    pub library_path: Option<PathBuf>,
    pub max_downloads: u32,
    /// Bytes per second; `None` is unlimited.
    pub bandwidth_limit: Option<u64>,
    pub update_check: bool,
}
impl Default for Settings {
    fn default() -> Self {
        Self { library_path: None, max_downloads: 3, bandwidth_limit: None, update_check: true }
    }
}

/// Per-mod overrides chosen by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserModSettings {
    /// Pin a specific version instead of following the latest one.
    pub version: Option<Version>,
    pub cmdline: Option<String>,
    /// Record key of the engine build to launch with, if not the default.
    pub custom_build: Option<String>,
    pub enabled_packages: Vec<String>,
}

/// Flags reported by an installed engine build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineFlags {
    pub flags: Vec<String>,
    #[serde(with = "timestamp::required")]
    pub captured_at: UtcDateTime,
}

/// A cached HTTP response, keyed by URL in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    pub body: Vec<u8>,
    #[serde(with = "timestamp::required")]
    pub fetched_at: UtcDateTime,
}
