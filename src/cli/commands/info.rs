//! Info command - show version and store information

use crate::cli::output::print_json;
use crate::cli::OutputFormat;
use crate::core::services::Services;
use clap::Args;
use serde::Serialize;

/// Arguments for the info command
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Show detailed information
    #[arg(long, short = 'd')]
    pub detailed: bool,
}

/// Server information response
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    /// Version recorded when the metadata store was first opened
    pub store_version: Option<String>,
    pub data_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_wal: Option<u64>,
}

/// Execute the info command
pub fn execute(
    args: InfoArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let (indexes, pending_wal) = if args.detailed {
        let stats = services.registry.list_stat();
        let pending = stats.iter().map(|s| s.wal_size).sum();
        (Some(stats.len()), Some(pending))
    } else {
        (None, None)
    };

    let info = InfoResponse {
        name: "quarry".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store_version: services.registry.version()?,
        data_dir: services.config.storage.data_path.to_string_lossy().into_owned(),
        indexes,
        pending_wal,
    };

    match format {
        OutputFormat::Human => {
            println!("quarry {}", info.version);
            println!(
                "Store: {}",
                info.store_version.as_deref().unwrap_or("uninitialized")
            );
            println!("Data: {}", info.data_dir);
            if let Some(count) = info.indexes {
                println!("Indexes: {count}");
            }
            if let Some(pending) = info.pending_wal {
                println!("Pending WAL entries: {pending}");
            }
        }
        OutputFormat::Json => print_json(&info)?,
    }

    Ok(())
}
