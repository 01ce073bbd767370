use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TaskdeckError};

/// Top-level configuration for the taskdeck service.
///
/// Loaded from `~/.taskdeck/config.toml` by default. Every section is
/// optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskdeckConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TaskdeckConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TaskdeckConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration if the file exists. A missing file is `Ok(None)`;
    /// an unreadable or invalid one is an error.
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.rate_limit.public.validate("rate_limit.public")?;
        self.rate_limit.api.validate("rate_limit.api")?;
        if self.rate_limit.sweep_interval_secs == 0 {
            return Err(TaskdeckError::Config(
                "rate_limit.sweep_interval_secs must be greater than 0".into(),
            ));
        }
        if self.listing.default_limit == 0 || self.listing.max_limit == 0 {
            return Err(TaskdeckError::Config(
                "listing limits must be greater than 0".into(),
            ));
        }
        if self.listing.default_limit > self.listing.max_limit {
            return Err(TaskdeckError::Config(format!(
                "listing.default_limit ({}) exceeds listing.max_limit ({})",
                self.listing.default_limit, self.listing.max_limit
            )));
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS.
    pub cors_origin: String,
    /// Key clients by the first `X-Forwarded-For` entry instead of the peer
    /// address. Only enable behind a trusted reverse proxy.
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            cors_origin: "http://localhost:3001".to_string(),
            trust_forwarded_for: false,
        }
    }
}

/// Record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "~/.taskdeck/taskdeck.db".to_string(),
        }
    }
}

/// Fixed-window limits for one route class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub window_ms: u64,
    pub max_requests: u64,
    /// Human-readable message returned with a 429.
    pub message: String,
}

impl WindowConfig {
    fn validate(&self, section: &str) -> Result<()> {
        if self.window_ms == 0 {
            return Err(TaskdeckError::Config(format!(
                "{section}.window_ms must be greater than 0"
            )));
        }
        if self.max_requests == 0 {
            return Err(TaskdeckError::Config(format!(
                "{section}.max_requests must be greater than 0"
            )));
        }
        Ok(())
    }
}

/// Admission control settings.
///
/// The two route classes have different defaults, so each window is read
/// field by field and merged over its own class defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawRateLimitConfig")]
pub struct RateLimitConfig {
    /// Health and welcome endpoints.
    pub public: WindowConfig,
    /// Record endpoints under `/api`.
    pub api: WindowConfig,
    /// How often expired counters are evicted.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            public: WindowConfig {
                window_ms: 60_000,
                max_requests: 100,
                message: "Too many requests, at most 100 per minute are allowed".to_string(),
            },
            api: WindowConfig {
                window_ms: 60_000,
                max_requests: 30,
                message: "Too many API requests, at most 30 per minute are allowed".to_string(),
            },
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawWindowConfig {
    window_ms: Option<u64>,
    max_requests: Option<u64>,
    message: Option<String>,
}

impl RawWindowConfig {
    fn merge_over(self, base: WindowConfig) -> WindowConfig {
        WindowConfig {
            window_ms: self.window_ms.unwrap_or(base.window_ms),
            max_requests: self.max_requests.unwrap_or(base.max_requests),
            message: self.message.unwrap_or(base.message),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRateLimitConfig {
    public: RawWindowConfig,
    api: RawWindowConfig,
    sweep_interval_secs: Option<u64>,
}

impl From<RawRateLimitConfig> for RateLimitConfig {
    fn from(raw: RawRateLimitConfig) -> Self {
        let defaults = RateLimitConfig::default();
        Self {
            public: raw.public.merge_over(defaults.public),
            api: raw.api.merge_over(defaults.api),
            sweep_interval_secs: raw
                .sweep_interval_secs
                .unwrap_or(defaults.sweep_interval_secs),
        }
    }
}

/// Listing endpoint defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            max_limit: 100,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
