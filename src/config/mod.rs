//! Configuration management for slotcast
//!
//! This module handles loading and validating configuration from environment variables
//! and TOML files. Every section has defaults, so a file only needs the keys it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::cache::CacheConfig;
use crate::scheduler::RetryPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schedule source configuration
    pub source: SourceConfig,

    /// Slot scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Retry policy configuration
    pub retry: RetryConfig,

    /// Image cache configuration
    pub cache: ImageCacheConfig,

    /// Persistent storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Schedule source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Prefix of the schedule API
    pub base_url: String,

    /// Screen whose schedule is played
    pub screen_id: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://localhost:8080/api"),
            screen_id: String::from("default"),
            request_timeout_secs: 30,
        }
    }
}

/// Slot scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upcoming slots whose images are kept prefetched
    pub lookahead_slots: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_slots: crate::scheduler::DEFAULT_LOOKAHEAD_SLOTS,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Wait after fetching an already-expired schedule
    pub expired_cooldown_secs: u64,

    /// Wait after a failed fetch with no usable fallback
    pub failure_cooldown_secs: u64,

    /// Attempts before giving up (none = retry forever)
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            expired_cooldown_secs: 180,
            failure_cooldown_secs: 30,
            max_attempts: None,
        }
    }
}

/// Image cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCacheConfig {
    /// Maximum number of decoded images held
    pub capacity: usize,

    /// How long a display request waits for a pending decode, in milliseconds
    pub wait_timeout_ms: u64,

    /// Image downloads allowed at once
    pub max_concurrent_decodes: usize,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            wait_timeout_ms: 1000,
            max_concurrent_decodes: 4,
        }
    }
}

/// Persistent storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted schedule
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let base_url =
            std::env::var("SLOTCAST_BASE_URL").unwrap_or(defaults.source.base_url);

        let screen_id =
            std::env::var("SLOTCAST_SCREEN_ID").unwrap_or(defaults.source.screen_id);

        let request_timeout_secs = env_parse::<u64>("SLOTCAST_REQUEST_TIMEOUT")
            .unwrap_or(defaults.source.request_timeout_secs);

        let lookahead_slots = env_parse::<usize>("SLOTCAST_LOOKAHEAD_SLOTS")
            .unwrap_or(defaults.scheduler.lookahead_slots);

        let expired_cooldown_secs = env_parse::<u64>("SLOTCAST_EXPIRED_COOLDOWN")
            .unwrap_or(defaults.retry.expired_cooldown_secs);

        let failure_cooldown_secs = env_parse::<u64>("SLOTCAST_FAILURE_COOLDOWN")
            .unwrap_or(defaults.retry.failure_cooldown_secs);

        let max_attempts = env_parse::<u32>("SLOTCAST_MAX_ATTEMPTS");

        let capacity = env_parse::<usize>("SLOTCAST_CACHE_CAPACITY")
            .unwrap_or(defaults.cache.capacity);

        let wait_timeout_ms = env_parse::<u64>("SLOTCAST_CACHE_WAIT_MS")
            .unwrap_or(defaults.cache.wait_timeout_ms);

        let max_concurrent_decodes = env_parse::<usize>("SLOTCAST_MAX_CONCURRENT_DECODES")
            .unwrap_or(defaults.cache.max_concurrent_decodes);

        let data_dir = std::env::var("SLOTCAST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.data_dir);

        let log_level =
            std::env::var("SLOTCAST_LOG_LEVEL").unwrap_or(defaults.logging.level);

        let log_format =
            std::env::var("SLOTCAST_LOG_FORMAT").unwrap_or(defaults.logging.format);

        Ok(Self {
            source: SourceConfig {
                base_url,
                screen_id,
                request_timeout_secs,
            },
            scheduler: SchedulerConfig { lookahead_slots },
            retry: RetryConfig {
                expired_cooldown_secs,
                failure_cooldown_secs,
                max_attempts,
            },
            cache: ImageCacheConfig {
                capacity,
                wait_timeout_ms,
                max_concurrent_decodes,
            },
            storage: StorageConfig { data_dir },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.source.screen_id.trim().is_empty() {
            anyhow::bail!("screen_id must not be empty");
        }

        Url::parse(&self.source.base_url)
            .with_context(|| format!("Invalid base_url: {}", self.source.base_url))?;

        if self.source.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.scheduler.lookahead_slots == 0 {
            anyhow::bail!("lookahead_slots must be greater than 0");
        }

        if self.retry.expired_cooldown_secs == 0 || self.retry.failure_cooldown_secs == 0 {
            anyhow::bail!("retry cooldowns must be positive");
        }

        if self.retry.max_attempts == Some(0) {
            anyhow::bail!("max_attempts must be greater than 0 when set");
        }

        if self.cache.capacity == 0 {
            anyhow::bail!("cache capacity must be greater than 0");
        }

        if self.cache.wait_timeout_ms == 0 {
            anyhow::bail!("wait_timeout_ms must be greater than 0");
        }

        if self.cache.max_concurrent_decodes == 0 {
            anyhow::bail!("max_concurrent_decodes must be greater than 0");
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.request_timeout_secs)
    }

    /// Get cache wait timeout as Duration
    #[must_use]
    pub fn cache_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.cache.wait_timeout_ms)
    }

    /// Retry policy for the retry controller
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            expired_cooldown: Duration::from_secs(self.retry.expired_cooldown_secs),
            failure_cooldown: Duration::from_secs(self.retry.failure_cooldown_secs),
            max_attempts: self.retry.max_attempts,
        }
    }

    /// Settings for the image cache
    #[must_use]
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.cache.capacity,
            wait_timeout: self.cache_wait_timeout(),
            max_concurrent_decodes: self.cache.max_concurrent_decodes,
        }
    }
}
