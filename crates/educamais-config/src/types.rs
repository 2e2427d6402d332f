//! Configuration types.
//!
//! ```toml
//! [api]
//! base_url = "https://api.educamais.app"
//! timeout_secs = 30
//!
//! [cache]
//! stale_time_secs = 300
//! retry = 2
//! retry_delay_ms = 100
//! max_entries = 1000
//!
//! [storage]
//! backend = "file"
//! data_dir = "~/.local/share/educamais"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3333";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default freshness window for cached query results.
pub const DEFAULT_STALE_TIME_SECS: u64 = 5 * 60;

/// Default number of retries after a failed fetch.
pub const DEFAULT_RETRY: u32 = 2;

/// Default base delay between fetch retries.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;

/// Default bound on the number of cached query entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Root configuration.
///
/// Every section is optional so that layers can be merged: a section present
/// in a later layer replaces the same section from an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducaConfig {
    /// Server connection settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,

    /// Query cache settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSettings>,

    /// Local session storage settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,
}

impl EducaConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: EducaConfig) {
        if other.api.is_some() {
            self.api = other.api;
        }
        if other.cache.is_some() {
            self.cache = other.cache;
        }
        if other.storage.is_some() {
            self.storage = other.storage;
        }
    }

    /// Effective API settings.
    pub fn api(&self) -> ApiConfig {
        self.api.clone().unwrap_or_default()
    }

    /// Effective cache settings.
    pub fn cache(&self) -> CacheSettings {
        self.cache.clone().unwrap_or_default()
    }

    /// Effective storage settings.
    pub fn storage(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }

    fn validate(&self) -> Result<()> {
        if let Some(api) = &self.api {
            if api.base_url.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "api.base_url".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            if api.timeout_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "api.timeout_secs".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Server connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server origin; `/api` is appended by the client.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Query cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// How long a successful result stays fresh.
    pub stale_time_secs: u64,
    /// Retries after the first failed attempt.
    pub retry: u32,
    /// Base delay between retries (doubled per attempt).
    pub retry_delay_ms: u64,
    /// Maximum number of cached entries before LRU eviction.
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            stale_time_secs: DEFAULT_STALE_TIME_SECS,
            retry: DEFAULT_RETRY,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheSettings {
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Where the session is kept on this device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Age-encrypted files under the data directory.
    #[default]
    File,
    /// OS keychain (requires the `keyring` feature of `educamais-store`).
    Keyring,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::File => f.write_str("file"),
            StorageBackend::Keyring => f.write_str("keyring"),
        }
    }
}

/// Local session storage settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Overrides the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}
