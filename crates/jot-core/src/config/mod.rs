//! Sync configuration.
//!
//! Settings come from an optional JSON file and from `JOT_*` environment
//! variables; environment values win over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(15);
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// On-disk configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub remote_token: Option<String>,
    #[serde(default)]
    pub offline: Option<bool>,
}

/// Resolved settings for the sync engine and remote adapter
#[derive(Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Period of the background sync timer
    pub sync_interval: Duration,
    /// Upper bound for a single remote call
    pub operation_timeout: Duration,
    /// Base URL of the remote document API; `None` means local-only
    pub remote_url: Option<String>,
    pub remote_token: Option<String>,
    /// Initial reachability assumed before any signal arrives
    pub start_online: bool,
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("sync_interval", &self.sync_interval)
            .field("operation_timeout", &self.operation_timeout)
            .field("remote_url", &self.remote_url)
            .field("remote_token", &self.remote_token.as_ref().map(|_| "[REDACTED]"))
            .field("start_online", &self.start_online)
            .finish()
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            remote_url: None,
            remote_token: None,
            start_online: true,
        }
    }
}

/// Default location of the configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("jot").join(CONFIG_FILE_NAME))
}

impl SyncSettings {
    /// Load from `path` (or the default path) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        let file = match path {
            Some(path) => ConfigFile::load_from_path(&path)?,
            None => ConfigFile::default(),
        };
        Self::from_file(file)
            .with_env(|key| std::env::var(key).ok())?
            .validated()
    }

    /// Settings described by a config file alone
    pub fn from_file(file: ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            sync_interval: file
                .sync_interval_secs
                .map_or(defaults.sync_interval, Duration::from_secs),
            operation_timeout: file
                .operation_timeout_secs
                .map_or(defaults.operation_timeout, Duration::from_secs),
            remote_url: normalize_text_option(file.remote_url),
            remote_token: normalize_text_option(file.remote_token),
            start_online: !file.offline.unwrap_or(false),
        }
    }

    /// Overlay `JOT_*` variables read through `lookup`
    pub fn with_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(secs) = parse_secs(&lookup, "JOT_SYNC_INTERVAL_SECS")? {
            self.sync_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_secs(&lookup, "JOT_OPERATION_TIMEOUT_SECS")? {
            self.operation_timeout = Duration::from_secs(secs);
        }
        if let Some(url) = normalize_text_option(lookup("JOT_REMOTE_URL")) {
            self.remote_url = Some(url);
        }
        if let Some(token) = normalize_text_option(lookup("JOT_REMOTE_TOKEN")) {
            self.remote_token = Some(token);
        }
        if let Some(offline) = normalize_text_option(lookup("JOT_OFFLINE")) {
            self.start_online = !is_truthy(&offline);
        }
        Ok(self)
    }

    /// Reject zero durations and non-HTTP remote URLs
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.sync_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "sync interval must be greater than zero".to_string(),
            ));
        }
        if self.operation_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "operation timeout must be greater than zero".to_string(),
            ));
        }
        if let Some(url) = &self.remote_url {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(
                    "remote URL must include http:// or https://".to_string(),
                ));
            }
            self.remote_url = Some(url.trim_end_matches('/').to_string());
        }
        Ok(self)
    }

    /// Whether a remote store is configured at all
    pub const fn has_remote(&self) -> bool {
        self.remote_url.is_some()
    }
}

impl ConfigFile {
    /// Read a config file; a missing file yields defaults
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<u64>, ConfigError> {
    normalize_text_option(lookup(key))
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid(format!("{key} must be a whole number of seconds")))
        })
        .transpose()
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
