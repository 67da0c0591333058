//! Storage configuration resolution.
//!
//! Turns a storage type and a shard location into the parameters a
//! search engine needs to open a writer. This is the only place that
//! branches on [`StorageType`].

use crate::core::config::{index_dir_name, Config};
use crate::core::error::{QuarryError, Result};
use crate::core::types::{AnalyzerSpec, StorageType, TimeRange};
use std::path::PathBuf;

/// Where a shard's segments live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Disk { path: PathBuf },
    S3 { bucket: String, prefix: String },
    MinIO { bucket: String, prefix: String },
}

impl Backend {
    pub fn storage_type(&self) -> StorageType {
        match self {
            Backend::Disk { .. } => StorageType::Disk,
            Backend::S3 { .. } => StorageType::S3,
            Backend::MinIO { .. } => StorageType::MinIO,
        }
    }
}

/// Resolved parameters for opening a shard writer
#[derive(Debug, Clone, PartialEq)]
pub struct OpenConfig {
    pub backend: Backend,

    /// Replaces the engine's default search analyzer when set
    pub default_search_analyzer: Option<AnalyzerSpec>,

    pub writer_heap_bytes: usize,
}

/// Storage location of one shard of an index
pub fn shard_location(index: &str, shard_id: u64) -> String {
    format!("{}/{shard_id:06x}", index_dir_name(index))
}

/// Maps storage types to backend open parameters
#[derive(Debug, Clone)]
pub struct StorageConfigResolver {
    data_path: PathBuf,
    s3_bucket: String,
    minio_bucket: String,
    writer_heap_bytes: usize,
}

impl StorageConfigResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            data_path: config.storage.data_path.clone(),
            s3_bucket: config.storage.s3.bucket.clone(),
            minio_bucket: config.storage.minio.bucket.clone(),
            writer_heap_bytes: config.shard.writer_heap_bytes,
        }
    }

    /// Resolve open parameters for `name` on `storage_type`
    ///
    /// Object-store locations get a `{start}_{end}` suffix when a time
    /// range is given; disk locations ignore it. Shard writers opened by
    /// an index never pass a range: the suffix addresses time-partitioned
    /// segment sets that readers outside the index layer open.
    pub fn resolve(
        &self,
        storage_type: StorageType,
        name: &str,
        analyzer: Option<&AnalyzerSpec>,
        time_range: Option<TimeRange>,
    ) -> Result<OpenConfig> {
        let backend = match storage_type {
            StorageType::Disk => Backend::Disk {
                path: self.data_path.join(name),
            },
            StorageType::S3 => Backend::S3 {
                bucket: require_bucket(&self.s3_bucket, storage_type)?,
                prefix: object_prefix(name, time_range),
            },
            StorageType::MinIO => Backend::MinIO {
                bucket: require_bucket(&self.minio_bucket, storage_type)?,
                prefix: object_prefix(name, time_range),
            },
        };

        Ok(OpenConfig {
            backend,
            default_search_analyzer: analyzer.cloned(),
            writer_heap_bytes: self.writer_heap_bytes,
        })
    }
}

fn require_bucket(bucket: &str, storage_type: StorageType) -> Result<String> {
    if bucket.is_empty() {
        return Err(QuarryError::ConfigError(format!(
            "no bucket configured for {storage_type} storage"
        )));
    }
    Ok(bucket.to_string())
}

fn object_prefix(name: &str, time_range: Option<TimeRange>) -> String {
    match time_range {
        Some(range) => format!("{name}/{}_{}", range.start, range.end),
        None => name.to_string(),
    }
}
