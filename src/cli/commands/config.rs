//! Config command - show current configuration

use crate::cli::output::print_json;
use crate::cli::OutputFormat;
use crate::core::services::Services;
use clap::Args;
use serde::Serialize;

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show all configuration including defaults
    #[arg(long, short = 'a')]
    pub all: bool,
}

/// Configuration response
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub data_dir: String,
    pub shard: ShardInfo,
    pub storage: StorageInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wal_sync_on_write: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gc_idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ShardInfo {
    pub max_size: u64,
    pub writer_heap_bytes: usize,
}

#[derive(Debug, Serialize)]
pub struct StorageInfo {
    pub default_type: String,
    pub s3_bucket: String,
    pub minio_bucket: String,
}

/// Execute the config command
pub fn execute(
    args: ConfigArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = &services.config;

    let response = ConfigResponse {
        data_dir: config.storage.data_path.to_string_lossy().into_owned(),
        shard: ShardInfo {
            max_size: config.shard.max_size,
            writer_heap_bytes: config.shard.writer_heap_bytes,
        },
        storage: StorageInfo {
            default_type: config.storage.default_type.to_string(),
            s3_bucket: config.storage.s3.bucket.clone(),
            minio_bucket: config.storage.minio.bucket.clone(),
        },
        wal_sync_on_write: args.all.then_some(config.wal.sync_on_write),
        gc_idle_timeout_secs: args.all.then_some(config.gc.idle_timeout_secs),
    };

    match format {
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir: {}", response.data_dir);
            println!("  shard:");
            println!("    max_size: {}", response.shard.max_size);
            println!(
                "    writer_heap_bytes: {}",
                response.shard.writer_heap_bytes
            );
            println!("  storage:");
            println!("    default_type: {}", response.storage.default_type);
            println!("    s3_bucket: {:?}", response.storage.s3_bucket);
            println!("    minio_bucket: {:?}", response.storage.minio_bucket);
            if let Some(sync) = response.wal_sync_on_write {
                println!("  wal:");
                println!("    sync_on_write: {sync}");
            }
            if let Some(timeout) = response.gc_idle_timeout_secs {
                println!("  gc:");
                println!("    idle_timeout_secs: {timeout}");
            }
        }
        OutputFormat::Json => print_json(&response)?,
    }

    Ok(())
}
