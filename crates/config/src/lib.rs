//! Configuration for modcat.
//!
//! Values are layered with [`figment`]: built-in defaults, then the optional
//! `modcat.toml` inside the settings directory, then `MODCAT_` prefixed
//! environment variables (nested keys are separated by `__`, for example
//! `MODCAT_STORAGE__LOCK_TIMEOUT_MS=2000`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

/// Name of the optional configuration file inside the settings directory.
pub const CONFIG_FILE: &str = "modcat.toml";
const ENV_PREFIX: &str = "MODCAT_";

/// Tuning for the embedded catalog store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Upper bound for acquiring the store file lock, the writer lock and
    /// pooled connections.
    pub lock_timeout_ms: u64,
    /// SQLite busy handler window.
    pub busy_timeout_ms: u64,
    pub max_connections: u32,
    /// Maximum number of submissions coalesced into one batch commit.
    pub max_batch_size: usize,
    /// How long the batch worker waits for more submissions before committing.
    pub max_batch_delay_ms: u64,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 1000,
            busy_timeout_ms: 1500,
            max_connections: 5,
            max_batch_size: 1000,
            max_batch_delay_ms: 10,
        }
    }
}
impl StorageConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn max_batch_delay(&self) -> Duration {
        Duration::from_millis(self.max_batch_delay_ms)
    }

    /// Reject values the store cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout_ms == 0 {
            exn::bail!(ErrorKind::Invalid("storage.lock_timeout_ms"));
        }
        if self.max_connections == 0 {
            exn::bail!(ErrorKind::Invalid("storage.max_connections"));
        }
        if self.max_batch_size == 0 {
            exn::bail!(ErrorKind::Invalid("storage.max_batch_size"));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `state.db` and `modcat.toml`.
    pub settings_dir: PathBuf,
    #[serde(default)]
    pub storage: StorageConfig,
}
impl Config {
    /// Default configuration rooted at the given settings directory.
    pub fn new(settings_dir: impl Into<PathBuf>) -> Self {
        Self { settings_dir: settings_dir.into(), storage: StorageConfig::default() }
    }

    /// The per-user settings directory for this platform.
    pub fn default_settings_dir() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("org", "modcat", "modcat").ok_or_raise(|| ErrorKind::SettingsDir)?;
        Ok(dirs.config_dir().to_path_buf())
    }

    /// Load configuration from the platform settings directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_settings_dir()?)
    }

    /// Load configuration rooted at an explicit settings directory.
    #[instrument(skip_all, fields(settings_dir = %settings_dir.as_ref().display()))]
    pub fn load_from(settings_dir: impl AsRef<Path>) -> Result<Self> {
        let config: Self = Self::figment(settings_dir.as_ref()).extract().or_raise(|| ErrorKind::Load)?;
        config.storage.validate()?;
        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }

    fn figment(settings_dir: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::new(settings_dir)))
            .merge(Toml::file(settings_dir.join(CONFIG_FILE)))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
