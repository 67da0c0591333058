//! Configuration management for the quarry index layer.
//!
//! This module handles loading configuration from TOML files and
//! environment variables, with sensible defaults for all settings.

use crate::core::error::{QuarryError, Result};
use crate::core::types::StorageType;
use crate::core::xdg::XdgDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub shard: ShardConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub wal: WalConfig,
    #[serde(default)]
    pub gc: GcConfig,
}

/// Shard rollover configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShardConfig {
    /// Active shard is sealed once its accumulated document bytes reach this
    #[serde(default = "default_shard_max_size")]
    pub max_size: u64,

    /// Memory budget handed to each shard writer
    #[serde(default = "default_writer_heap_bytes")]
    pub writer_heap_bytes: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for local shard data, WAL files and metadata
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Storage type used when a caller does not name one
    #[serde(default)]
    pub default_type: StorageType,

    #[serde(default)]
    pub s3: BucketConfig,

    #[serde(default)]
    pub minio: BucketConfig,
}

/// Object store bucket settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BucketConfig {
    #[serde(default)]
    pub bucket: String,
}

/// Write-ahead log configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalConfig {
    /// fsync after every append
    #[serde(default = "default_sync_on_write")]
    pub sync_on_write: bool,
}

/// Idle index eviction
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GcConfig {
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

// Default value functions
fn default_shard_max_size() -> u64 {
    1024 * 1024 * 1024
}

fn default_writer_heap_bytes() -> usize {
    50_000_000
}

fn default_data_path() -> PathBuf {
    PathBuf::from("./data")
}

fn default_sync_on_write() -> bool {
    true
}

fn default_idle_timeout() -> u64 {
    600
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            max_size: default_shard_max_size(),
            writer_heap_bytes: default_writer_heap_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            default_type: StorageType::default(),
            s3: BucketConfig::default(),
            minio: BucketConfig::default(),
        }
    }
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            sync_on_write: default_sync_on_write(),
        }
    }
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl StorageConfig {
    /// Directory holding one WAL per index
    pub fn wal_dir(&self) -> PathBuf {
        self.data_path.join("_wal")
    }

    /// Directory holding persisted index definitions
    pub fn metadata_dir(&self) -> PathBuf {
        self.data_path.join("_metadata")
    }

    /// WAL directory of index `name`
    pub fn index_wal_dir(&self, name: &str) -> PathBuf {
        self.wal_dir().join(index_dir_name(name))
    }

    /// Local shard directory of index `name`
    pub fn index_data_dir(&self, name: &str) -> PathBuf {
        self.data_path.join(index_dir_name(name))
    }
}

/// Directory name for index `name`
///
/// Names made only of dots are valid index names but would resolve to
/// the current or parent directory, so their dots are percent-encoded.
/// `%` is not allowed in index names, so encoded names cannot collide.
pub fn index_dir_name(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c == '.') {
        name.replace('.', "%2E")
    } else {
        name.to_string()
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| QuarryError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Create a configuration rooted at `data_path`, everything else default
    pub fn with_data_path(data_path: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.storage.data_path = data_path.into();
        config
    }

    /// Load config with priority: env vars > TOML > defaults
    ///
    /// This method uses XDG Base Directory specification for file locations.
    pub fn load() -> Result<Self> {
        let xdg = XdgDirs::new();
        Self::load_with_xdg(&xdg)
    }

    /// Load config with explicit XDG directories
    ///
    /// Priority order:
    /// 1. QUARRY_CONFIG env var
    /// 2. XDG config file (~/.config/quarry/config.toml)
    /// 3. Defaults
    pub fn load_with_xdg(xdg: &XdgDirs) -> Result<Self> {
        let mut config = if let Ok(config_path) = env::var("QUARRY_CONFIG") {
            Self::from_file(config_path)?
        } else {
            let xdg_config = xdg.config_file();
            if xdg_config.exists() {
                Self::from_file(xdg_config)?
            } else {
                Self::default()
            }
        };

        // Use the XDG data directory unless a path was set explicitly
        if env::var("QUARRY_DATA_DIR").is_err() && config.storage.data_path == default_data_path()
        {
            config.storage.data_path = xdg.data_dir.clone();
        }

        config.merge_env();
        config.validate()?;

        Ok(config)
    }

    /// Merge configuration with environment variables
    pub fn merge_env(&mut self) {
        if let Ok(max_size) = env::var("QUARRY_SHARD_MAX_SIZE") {
            if let Ok(size) = max_size.parse() {
                self.shard.max_size = size;
            }
        }

        if let Ok(data_dir) = env::var("QUARRY_DATA_DIR") {
            self.storage.data_path = PathBuf::from(data_dir);
        }
        if let Ok(storage_type) = env::var("QUARRY_STORAGE_TYPE") {
            if let Ok(t) = storage_type.parse() {
                self.storage.default_type = t;
            }
        }
        if let Ok(bucket) = env::var("QUARRY_S3_BUCKET") {
            self.storage.s3.bucket = bucket;
        }
        if let Ok(bucket) = env::var("QUARRY_MINIO_BUCKET") {
            self.storage.minio.bucket = bucket;
        }

        if let Ok(sync) = env::var("QUARRY_WAL_SYNC") {
            if let Ok(s) = sync.parse() {
                self.wal.sync_on_write = s;
            }
        }

        if let Ok(timeout) = env::var("QUARRY_GC_IDLE_TIMEOUT_SEC") {
            if let Ok(t) = timeout.parse() {
                self.gc.idle_timeout_secs = t;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.shard.max_size == 0 {
            return Err(QuarryError::ConfigError(
                "Max shard size must be non-zero".to_string(),
            ));
        }

        if self.shard.writer_heap_bytes == 0 {
            return Err(QuarryError::ConfigError(
                "Writer heap size must be non-zero".to_string(),
            ));
        }

        match self.storage.default_type {
            StorageType::S3 if self.storage.s3.bucket.is_empty() => {
                return Err(QuarryError::ConfigError(
                    "Default storage type is s3 but no s3 bucket is configured".to_string(),
                ));
            }
            StorageType::MinIO if self.storage.minio.bucket.is_empty() => {
                return Err(QuarryError::ConfigError(
                    "Default storage type is minio but no minio bucket is configured"
                        .to_string(),
                ));
            }
            _ => {}
        }

        if self.gc.idle_timeout_secs == 0 {
            return Err(QuarryError::ConfigError(
                "GC idle timeout must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Log configuration
    pub fn log_config(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Max shard size: {} bytes", self.shard.max_size);
        tracing::info!("  Writer heap: {} bytes", self.shard.writer_heap_bytes);
        tracing::info!("  Data path: {:?}", self.storage.data_path);
        tracing::info!("  Default storage type: {}", self.storage.default_type);
        tracing::info!("  S3 bucket: {:?}", self.storage.s3.bucket);
        tracing::info!("  MinIO bucket: {:?}", self.storage.minio.bucket);
        tracing::info!("  WAL sync on write: {}", self.wal.sync_on_write);
        tracing::info!("  GC idle timeout: {}s", self.gc.idle_timeout_secs);
    }
}
