//! Configuration loading.
//!
//! Sources, lowest precedence first:
//! - Bundled defaults (include_str! from reliquary.toml)
//! - ~/.config/reliquary/reliquary.toml
//! - ./reliquary.toml

use config::{Config, File, FileFormat};
use derive_getters::Getters;
use reliquary_error::{ConfigError, ReliquaryError, ReliquaryResult};
use reliquary_pipeline::DEFAULT_RETAINED_HISTORIES;
use reliquary_rate_limit::SourceLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const DEFAULT_CONFIG: &str = include_str!("../../../reliquary.toml");

/// Default limited-channel budget, in bytes.
pub const DEFAULT_LIMITED_BUDGET: u64 = 8_000_000;

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the content store
    path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reliquary-data/content"),
        }
    }
}

/// `[ledger]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-lines ledger file
    path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reliquary-data/ledger.jsonl"),
        }
    }
}

/// `[delivery]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Size budget of the limited channel, in bytes
    limited_budget_bytes: u64,
    /// Webhook the limited channel posts to
    webhook_url: Option<String>,
    /// Directory backing the unlimited channel
    cold_store_path: PathBuf,
    /// URL prefix under which `cold_store_path` is served
    public_base_url: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            limited_budget_bytes: DEFAULT_LIMITED_BUDGET,
            webhook_url: None,
            cold_store_path: PathBuf::from("reliquary-data/public"),
            public_base_url: "http://localhost:8080/media".to_string(),
        }
    }
}

/// `[fetch]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct FetchConfig {
    /// User-Agent sent with every download
    user_agent: String,
    /// Whole-request timeout, in seconds
    timeout_secs: u64,
    /// Requests per minute toward sources
    rpm: Option<u32>,
    /// Downloads in flight at once
    max_concurrent: Option<u32>,
}

impl FetchConfig {
    /// Limits for the fetch limiter.
    pub fn limits(&self) -> SourceLimits {
        SourceLimits {
            rpm: self.rpm,
            max_concurrent: self.max_concurrent,
        }
    }

    /// Download timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("reliquary/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 60,
            rpm: None,
            max_concurrent: None,
        }
    }
}

/// `[transform]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct TransformConfig {
    /// ffmpeg binary, absolute or looked up on `PATH`
    ffmpeg_path: PathBuf,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

/// `[coalesce]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct CoalesceConfig {
    /// Per-caller wait bound, in seconds
    wait_timeout_secs: Option<u64>,
}

impl CoalesceConfig {
    /// Per-caller wait bound.
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }
}

/// `[lifecycle]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Finished request histories kept in memory
    retained_histories: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            retained_histories: DEFAULT_RETAINED_HISTORIES,
        }
    }
}

/// Complete configuration.
///
/// # Example
///
/// ```toml
/// [storage]
/// path = "/var/lib/reliquary/content"
///
/// [delivery]
/// limited_budget_bytes = 8_000_000
/// webhook_url = "https://discord.com/api/webhooks/1/token"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct ReliquaryConfig {
    /// Content store
    storage: StorageConfig,
    /// Request ledger
    ledger: LedgerConfig,
    /// Delivery channels
    delivery: DeliveryConfig,
    /// Source downloads
    fetch: FetchConfig,
    /// Trimming
    transform: TransformConfig,
    /// Single-flight waits
    coalesce: CoalesceConfig,
    /// Request history retention
    lifecycle: LifecycleConfig,
}

impl ReliquaryConfig {
    /// The bundled defaults alone.
    ///
    /// # Errors
    ///
    /// Fails only if the bundled file does not parse.
    pub fn bundled() -> ReliquaryResult<Self> {
        Self::build(Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml)))
    }

    /// Load a single configuration file.
    ///
    /// Sections and keys the file omits take their built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> ReliquaryResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration from file");
        Config::builder()
            .add_source(File::from(path))
            .build()
            .map_err(|e| {
                ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.display(),
                    e
                ))
            })?
            .try_deserialize()
            .map_err(|e| {
                ReliquaryError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Load with precedence: current dir > user config dir > bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns error if any present file fails to parse.
    pub fn load() -> ReliquaryResult<Self> {
        debug!("Loading configuration with precedence: current dir > config dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("reliquary").join("reliquary.toml");
            builder = builder.add_source(File::from(user_config).required(false));
        }

        builder = builder.add_source(File::with_name("reliquary").required(false));

        Self::build(builder)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> ReliquaryResult<Self> {
        builder
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| {
                ReliquaryError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Check values the loader cannot.
    ///
    /// # Errors
    ///
    /// Rejects a zero budget or timeout, and empty paths or URLs.
    pub fn validate(&self) -> ReliquaryResult<()> {
        if self.delivery.limited_budget_bytes == 0 {
            return Err(ConfigError::new("delivery.limited_budget_bytes must be non-zero").into());
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::new("fetch.timeout_secs must be non-zero").into());
        }
        if self.coalesce.wait_timeout_secs == Some(0) {
            return Err(ConfigError::new("coalesce.wait_timeout_secs must be non-zero").into());
        }

        let paths = [
            ("storage.path", &self.storage.path),
            ("ledger.path", &self.ledger.path),
            ("delivery.cold_store_path", &self.delivery.cold_store_path),
            ("transform.ffmpeg_path", &self.transform.ffmpeg_path),
        ];
        for (name, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::new(format!("{} must not be empty", name)).into());
            }
        }

        if self.delivery.public_base_url.trim().is_empty() {
            return Err(ConfigError::new("delivery.public_base_url must not be empty").into());
        }
        if self
            .delivery
            .webhook_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            return Err(ConfigError::new("delivery.webhook_url must not be empty when set").into());
        }
        Ok(())
    }
}
