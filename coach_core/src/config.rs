//! Configuration file support for Coach.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/coach/config.toml`.
//! Timing sections hold plain seconds/milliseconds and convert into the
//! runtime structs (`LockConfig`, `CacheConfig`, `BackoffPolicy`) the
//! services consume.

use crate::cache::CacheConfig;
use crate::lock::LockConfig;
use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub coordination: CoordinationConfig,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Generation-lock coordination configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinationConfig {
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_likely_active_window_secs")]
    pub likely_active_window_secs: u64,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    #[serde(default = "default_retry_jitter_ratio")]
    pub retry_jitter_ratio: f64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: default_lock_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            likely_active_window_secs: default_likely_active_window_secs(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_multiplier: default_retry_multiplier(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            retry_jitter_ratio: default_retry_jitter_ratio(),
        }
    }
}

impl CoordinationConfig {
    pub fn lock_config(&self) -> LockConfig {
        LockConfig {
            timeout: Duration::from_secs(self.lock_timeout_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            likely_active_window: Duration::from_secs(self.likely_active_window_secs),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            multiplier: self.retry_multiplier,
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            jitter_ratio: self.retry_jitter_ratio,
        }
    }
}

/// Illustration cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_entry_ttl_secs")]
    pub entry_ttl_secs: u64,

    #[serde(default = "default_pending_ttl_secs")]
    pub pending_ttl_secs: u64,

    #[serde(default = "default_cache_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            entry_ttl_secs: default_entry_ttl_secs(),
            pending_ttl_secs: default_pending_ttl_secs(),
            sweep_interval_secs: default_cache_sweep_interval_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheSettings {
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            entry_ttl: Duration::from_secs(self.entry_ttl_secs),
            pending_ttl: Duration::from_secs(self.pending_ttl_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            max_entries: self.max_entries,
        }
    }
}

/// Generation service timeouts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_prescription_timeout_secs")]
    pub prescription_timeout_secs: u64,

    #[serde(default = "default_illustration_timeout_secs")]
    pub illustration_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            prescription_timeout_secs: default_prescription_timeout_secs(),
            illustration_timeout_secs: default_illustration_timeout_secs(),
        }
    }
}

/// Exponential backoff with jitter for lock-acquisition retries
#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(default_retry_base_delay_ms()),
            multiplier: default_retry_multiplier(),
            max_delay: Duration::from_millis(default_retry_max_delay_ms()),
            jitter_ratio: default_retry_jitter_ratio(),
        }
    }
}

impl BackoffPolicy {
    /// Deterministic delay for the given zero-based attempt, capped at
    /// `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }

    /// `delay_for` plus up to `jitter_ratio` of random extra, so
    /// concurrent retriers don't wake in lockstep
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for(attempt);
        if self.jitter_ratio <= 0.0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0.0..=self.jitter_ratio);
        base.mul_f64(1.0 + jitter)
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME")
            .expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("coach")
}

fn default_lock_timeout_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_likely_active_window_secs() -> u64 {
    140
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_multiplier() -> f64 {
    1.5
}

fn default_retry_max_delay_ms() -> u64 {
    8_000
}

fn default_retry_jitter_ratio() -> f64 {
    0.3
}

fn default_entry_ttl_secs() -> u64 {
    3_600
}

fn default_pending_ttl_secs() -> u64 {
    140
}

fn default_cache_sweep_interval_secs() -> u64 {
    30
}

fn default_max_entries() -> usize {
    200
}

fn default_prescription_timeout_secs() -> u64 {
    300
}

fn default_illustration_timeout_secs() -> u64 {
    135
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME")
                .expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("coach").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
