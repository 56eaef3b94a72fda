//! Store configuration via `shardvault.toml`
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Edit the file and reopen the store to apply changes.

use serde::{Deserialize, Serialize};
use shardvault_core::{DistanceMetric, VaultError, VaultResult};
use shardvault_index::DEFAULT_LANGUAGE;
use shardvault_shard::{AutoRebalanceConfig, ManagerOptions, DEFAULT_CACHE_CAPACITY, DEFAULT_REPLICAS};
use std::path::{Path, PathBuf};

/// Config file name placed next to the vault
pub const CONFIG_FILE_NAME: &str = "shardvault.toml";

/// Similarity threshold applied when a search does not set one
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.6;

/// `[rebalance]` section: auto-rebalance thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RebalanceConfig {
    /// Average shard size (MiB) above which the shard count doubles
    pub upper_mb: f64,
    /// Average shard size (MiB) below which the shard count halves
    pub lower_mb: f64,
    /// Lower bound when halving
    pub min_shards: usize,
    /// Upper bound when doubling
    pub max_shards: usize,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        let defaults = AutoRebalanceConfig::default();
        RebalanceConfig {
            upper_mb: defaults.upper_mb,
            lower_mb: defaults.lower_mb,
            min_shards: defaults.min_shards,
            max_shards: defaults.max_shards,
        }
    }
}

/// Store configuration loaded from `shardvault.toml`
///
/// # Example
///
/// ```toml
/// dir = ".shardvault"
/// cache_capacity = 3
/// similarity_threshold = 0.6
///
/// [rebalance]
/// upper_mb = 500
/// max_shards = 32
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the shard files, relative to the vault root
    pub dir: PathBuf,
    /// Maximum number of shards resident in memory
    pub cache_capacity: usize,
    /// Virtual nodes per shard on the hash ring
    pub replicas: usize,
    /// Similarity metric
    pub metric: DistanceMetric,
    /// Tokenizer language for new shards
    pub language: String,
    /// Default minimum similarity for search hits
    pub similarity_threshold: f32,
    /// Run auto-rebalance after every batch of added documents
    pub auto_rebalance: bool,
    /// Auto-rebalance thresholds
    pub rebalance: RebalanceConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            dir: PathBuf::from(".shardvault"),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            replicas: DEFAULT_REPLICAS,
            metric: DistanceMetric::Cosine,
            language: DEFAULT_LANGUAGE.to_string(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            auto_rebalance: true,
            rebalance: RebalanceConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# shardvault store configuration

# Directory holding the shard files (vectorstore-1, vectorstore-2, ...)
dir = ".shardvault"

# Shards kept in memory at once; evicted shards are written back to disk
cache_capacity = 3

# Virtual nodes per shard on the hash ring
replicas = 100

# Similarity metric: "cosine", "euclidean" or "dot_product"
metric = "cosine"

# Tokenizer language for new shards
language = "english"

# Minimum similarity for a search hit when a query does not set one
similarity_threshold = 0.6

# Grow or shrink the shard count after every batch of added documents
auto_rebalance = true

[rebalance]
# Double the shard count when the average shard file exceeds this (MiB)
upper_mb = 500.0
# Halve the shard count when the average shard file is below this (MiB)
lower_mb = 100.0
min_shards = 2
max_shards = 32
"#
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> VaultResult<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| VaultError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> VaultResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VaultError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            VaultError::Config(msg) => {
                VaultError::Config(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> VaultResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                VaultError::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> VaultResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VaultError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            VaultError::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Reject settings the store cannot run with
    pub fn validate(&self) -> VaultResult<()> {
        if self.cache_capacity == 0 {
            return Err(VaultError::Config("cache_capacity must be at least 1".into()));
        }
        if self.replicas == 0 {
            return Err(VaultError::Config("replicas must be at least 1".into()));
        }
        let r = &self.rebalance;
        if r.min_shards == 0 || r.min_shards > r.max_shards {
            return Err(VaultError::Config(format!(
                "rebalance bounds invalid: min_shards={} max_shards={}",
                r.min_shards, r.max_shards
            )));
        }
        if r.lower_mb >= r.upper_mb {
            return Err(VaultError::Config(format!(
                "rebalance thresholds invalid: lower_mb={} must be below upper_mb={}",
                r.lower_mb, r.upper_mb
            )));
        }
        Ok(())
    }

    /// Shard-level subset of this configuration
    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            cache_capacity: self.cache_capacity,
            replicas: self.replicas,
            auto_rebalance: AutoRebalanceConfig {
                upper_mb: self.rebalance.upper_mb,
                lower_mb: self.rebalance.lower_mb,
                min_shards: self.rebalance.min_shards,
                max_shards: self.rebalance.max_shards,
            },
        }
    }
}
