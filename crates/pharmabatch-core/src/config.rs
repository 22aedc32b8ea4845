//! Pipeline configuration.
//!
//! Every tunable of the loader and the rule battery lives here. Values can be
//! taken from the defaults or loaded from TOML:
//!
//! ```toml
//! [loader]
//! chunk_size = 200
//! load_timeout_ms = 5000
//!
//! [rules]
//! near_expiry_days = 30
//! medium_expiry_days = 90
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum keys per fetch accepted by the backing store.
pub const MAX_CHUNK_SIZE: usize = 500;

pub const DEFAULT_CHUNK_SIZE: usize = MAX_CHUNK_SIZE;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub loader: LoaderConfig,
    pub rules: RuleConfig,
}

/// Batch loader tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Keys per fetch
    pub chunk_size: usize,
    /// Budget for the whole load phase of one batch, in milliseconds
    pub load_timeout_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            load_timeout_ms: 30_000,
        }
    }
}

impl LoaderConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

/// Rule battery thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Expiry within this many days raises a warning
    pub near_expiry_days: i64,
    /// Expiry within this many days raises a softer warning
    pub medium_expiry_days: i64,
    /// Ordered/received variance above this percentage raises a warning
    pub variance_warning_pct: f64,
    /// Variance above this percentage (and up to the warning level) raises a suggestion
    pub variance_suggestion_pct: f64,
    /// Normalized Levenshtein similarity at which two lot numbers look like duplicates
    pub duplicate_similarity: f64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            near_expiry_days: 30,
            medium_expiry_days: 90,
            variance_warning_pct: 10.0,
            variance_suggestion_pct: 5.0,
            duplicate_similarity: 0.9,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: PipelineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.loader.chunk_size == 0 || self.loader.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "loader.chunk_size must be in 1..={}, got {}",
                MAX_CHUNK_SIZE, self.loader.chunk_size
            )));
        }
        let rules = &self.rules;
        if rules.near_expiry_days < 0 || rules.near_expiry_days > rules.medium_expiry_days {
            return Err(ConfigError::Invalid(format!(
                "expiry windows must satisfy 0 <= near ({}) <= medium ({})",
                rules.near_expiry_days, rules.medium_expiry_days
            )));
        }
        if rules.variance_suggestion_pct < 0.0
            || rules.variance_suggestion_pct > rules.variance_warning_pct
        {
            return Err(ConfigError::Invalid(format!(
                "variance thresholds must satisfy 0 <= suggestion ({}) <= warning ({})",
                rules.variance_suggestion_pct, rules.variance_warning_pct
            )));
        }
        if !(rules.duplicate_similarity > 0.0 && rules.duplicate_similarity <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "rules.duplicate_similarity must be in (0, 1], got {}",
                rules.duplicate_similarity
            )));
        }
        Ok(())
    }
}
