use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SwapvecError};

/// Top-level configuration for the SwapVec pipeline.
///
/// Built once at start-up from an optional TOML file, then overlaid with the
/// process environment (`MAX_WORKERS`, `BATCH_SIZE`, `VECTOR_CACHE_SIZE`, ...)
/// and passed by value into the store and processor constructors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwapvecConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub providers: ProviderConfig,
}

impl SwapvecConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SwapvecConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
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

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from an environment lookup.
    ///
    /// Unset variables leave the current value in place; set but unparsable
    /// values are a configuration error.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MAX_WORKERS") {
            self.processing.max_workers = parse_env("MAX_WORKERS", &v)?;
        }
        if let Some(v) = lookup("BATCH_SIZE") {
            self.processing.batch_size = parse_env("BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("VECTOR_CACHE_SIZE") {
            self.processing.vector_cache_size = parse_env("VECTOR_CACHE_SIZE", &v)?;
        }
        if let Some(v) = lookup("BATCH_DEADLINE_MS") {
            self.processing.deadline_ms = parse_env("BATCH_DEADLINE_MS", &v)?;
        }
        if let Some(v) = lookup("MEMORY_LIMIT") {
            self.processing.memory_limit = v.trim().to_string();
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.general.log_level = v.trim().to_lowercase();
        }
        if let Some(v) = lookup("QUICKNODE_STATUS") {
            self.providers.quicknode_status = parse_env("QUICKNODE_STATUS", &v)?;
        }
        if let Some(v) = lookup("HELIUS_STATUS") {
            self.providers.helius_status = parse_env("HELIUS_STATUS", &v)?;
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let p = &self.processing;
        if p.max_workers == 0 {
            return Err(SwapvecError::Config(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if p.batch_size == 0 {
            return Err(SwapvecError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if p.vector_cache_size == 0 {
            return Err(SwapvecError::Config(
                "vector_cache_size must be at least 1".to_string(),
            ));
        }
        p.memory_limit_bytes()?;
        Ok(())
    }

    /// Log upstream providers that are not fully active.
    pub fn log_provider_status(&self) {
        if self.providers.quicknode_status == ProviderStatus::ReadOnly {
            info!("QuickNode component is in READ_ONLY mode");
        }
        if self.providers.helius_status == ProviderStatus::ReadOnly {
            info!("Helius component is in READ_ONLY mode");
        }
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| SwapvecError::Config(format!("{key}={value:?}: {e}")))
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Batch processing and vector store sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Size of the vectorization worker pool.
    pub max_workers: usize,
    /// Number of swaps submitted per `process_swaps` call.
    pub batch_size: usize,
    /// Maximum number of vectors the store will hold.
    pub vector_cache_size: usize,
    /// Advisory memory ceiling, e.g. "2GB". Not enforced by the pipeline.
    pub memory_limit: String,
    /// Per-batch deadline in milliseconds. 0 disables it.
    pub deadline_ms: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            batch_size: 50,
            vector_cache_size: 1000,
            memory_limit: "2GB".to_string(),
            deadline_ms: 0,
        }
    }
}

impl ProcessingConfig {
    /// Parse `memory_limit` into bytes. Accepts B, KB, MB, GB, TB suffixes
    /// (binary multiples, case-insensitive) or a bare byte count.
    pub fn memory_limit_bytes(&self) -> Result<u64> {
        parse_byte_size(&self.memory_limit)
    }

    /// Deadline as a duration, if one is configured.
    pub fn deadline(&self) -> Option<std::time::Duration> {
        (self.deadline_ms > 0).then(|| std::time::Duration::from_millis(self.deadline_ms))
    }
}

fn parse_byte_size(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    let upper = trimmed.to_ascii_uppercase();
    let split = upper
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(upper.len());
    let (digits, unit) = upper.split_at(split);

    let bad = || SwapvecError::Config(format!("invalid memory limit {raw:?}"));

    let value: u64 = digits.parse().map_err(|_| bad())?;
    let multiplier: u64 = match unit.trim() {
        "" | "B" => 1,
        "KB" | "K" => 1 << 10,
        "MB" | "M" => 1 << 20,
        "GB" | "G" => 1 << 30,
        "TB" | "T" => 1 << 40,
        _ => return Err(bad()),
    };
    value.checked_mul(multiplier).ok_or_else(bad)
}

/// Operating mode reported for an upstream data provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    #[default]
    Active,
    ReadOnly,
}

impl FromStr for ProviderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(ProviderStatus::Active),
            "READ_ONLY" | "READONLY" => Ok(ProviderStatus::ReadOnly),
            other => Err(format!("unknown provider status {other:?}")),
        }
    }
}

/// Upstream provider status flags. The pipeline does not act on these; the
/// caller uses them to decide whether to submit batches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub quicknode_status: ProviderStatus,
    pub helius_status: ProviderStatus,
}
