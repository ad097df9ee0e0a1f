//! Client configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux/macOS: `~/.config/rommend/config.toml`
//! - Windows: `%APPDATA%/rommend/config.toml`
//!
//! The password is never written here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rommend_folders::{DEFAULT_DOWNLOAD_DIR, default_download_root, expand_home};
use rommend_protocol::constants::{DEFAULT_CACHE_DIR, PLATFORM_FOLDERS_FILE};
use rommend_transfer::{DEFAULT_CHUNK_SIZE, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Catalog host, empty until the first successful login.
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub username: String,

    /// Root that per-platform folders are created under.
    #[serde(default = "default_download_directory")]
    pub download_directory: String,

    #[serde(default = "default_cache_directory")]
    pub cache_directory: String,

    /// Platform folder override file.
    #[serde(default = "default_platform_folders")]
    pub platform_folders: String,

    #[serde(default)]
    pub transfer: TransferSettings,
}

/// Tuning for the transfer engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Bytes read per chunk; values below 64 KiB are raised.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff step in seconds; retry `n` waits `n * step`.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,

    /// Abort a read that produces nothing for this long.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_secs: Option<u64>,
}

fn default_download_directory() -> String {
    format!("~/{DEFAULT_DOWNLOAD_DIR}")
}

fn default_cache_directory() -> String {
    DEFAULT_CACHE_DIR.into()
}

fn default_platform_folders() -> String {
    PLATFORM_FOLDERS_FILE.into()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_retries() -> u32 {
    RetryPolicy::default().max_retries
}

fn default_retry_backoff() -> u64 {
    RetryPolicy::default().backoff_step.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            download_directory: default_download_directory(),
            cache_directory: default_cache_directory(),
            platform_folders: default_platform_folders(),
            transfer: TransferSettings::default(),
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_retries: default_max_retries(),
            retry_backoff_secs: default_retry_backoff(),
            read_timeout_secs: None,
        }
    }
}

impl TransferSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_step: Duration::from_secs(self.retry_backoff_secs),
        }
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Loads configuration from `path`, or creates a default there if not found.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the current configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// True once a login has succeeded and been saved.
    pub fn has_session(&self) -> bool {
        !self.host.is_empty() && !self.username.is_empty()
    }

    pub fn clear_session(&mut self) {
        self.host.clear();
        self.username.clear();
    }

    /// Download root; a blank setting falls back to `~/ROMs`.
    pub fn download_root(&self) -> PathBuf {
        if self.download_directory.trim().is_empty() {
            default_download_root()
        } else {
            expand_home(&self.download_directory)
        }
    }

    pub fn cache_root(&self) -> PathBuf {
        expand_home(&self.cache_directory)
    }

    pub fn platform_folders_path(&self) -> PathBuf {
        expand_home(&self.platform_folders)
    }
}

/// Returns the platform-specific configuration file path.
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("rommend").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        expand_home("~/.config/rommend/config.toml")
    }
}
