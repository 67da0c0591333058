//! Index commands - create, list, inspect and delete indexes
//!
//! - `create-index`
//! - `list-indexes`
//! - `get-index-info`
//! - `delete-index`

use crate::cli::output::{colors, format_bytes, format_relative_time, print_json};
use crate::cli::OutputFormat;
use crate::core::services::Services;
use crate::core::types::{IndexShard, IndexStat, StorageType};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};

/// Arguments for create-index
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Index name ([A-Za-z0-9_.-], must not start with _)
    pub name: String,

    /// Storage backend (defaults to the configured storage type)
    #[arg(long, short = 's', value_parser = ["disk", "s3", "minio"])]
    pub storage: Option<String>,
}

/// Arguments for list-indexes
#[derive(Args, Debug)]
pub struct ListArgs {}

/// Arguments for get-index-info
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Index name
    pub name: String,
}

/// Arguments for delete-index
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Index name
    pub name: String,

    /// Skip confirmation prompt
    #[arg(long, short = 'f')]
    pub force: bool,
}

/// Index list response
#[derive(Debug, Serialize)]
pub struct IndexListResponse {
    pub count: usize,
    pub indexes: Vec<IndexStat>,
}

/// Detailed index info
#[derive(Debug, Serialize)]
pub struct IndexInfoResponse {
    #[serde(flatten)]
    pub stat: IndexStat,
    pub shards: Vec<IndexShard>,
    pub fields: usize,
}

/// Execute create-index command
pub fn execute_create(
    args: CreateArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = args.storage.unwrap_or_default();
    let (index, existed) = services.registry.get_or_create(&args.name, &storage)?;

    match format {
        OutputFormat::Human => {
            let verb = if existed {
                colors::dim("Exists")
            } else {
                colors::success("Created")
            };
            println!(
                "{} index '{}' on {} storage",
                verb,
                colors::index_name(index.name()),
                index.storage_type()
            );
        }
        OutputFormat::Json => {
            print_json(&serde_json::json!({
                "index": index.name(),
                "storage_type": index.storage_type(),
                "created": !existed
            }))?;
        }
    }

    Ok(())
}

/// Execute list-indexes command
pub fn execute_list(
    _args: ListArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let indexes = services.registry.list_stat();
    let response = IndexListResponse {
        count: indexes.len(),
        indexes,
    };

    match format {
        OutputFormat::Human => {
            if response.indexes.is_empty() {
                println!(
                    "No indexes found. Run '{}' to create one.",
                    colors::label("quarry create-index <name>")
                );
            } else {
                println!(
                    "{} ({}):",
                    colors::label("Indexes"),
                    colors::number(&response.count.to_string())
                );
                for stat in &response.indexes {
                    println!(
                        "  {:<24} {:<6} {:>4} shards  {:>8} docs  {:>10}  {:>5} pending  {}",
                        colors::index_name(&stat.name),
                        stat.storage_type.as_str(),
                        colors::number(&stat.shard_num.to_string()),
                        colors::number(&stat.doc_num.to_string()),
                        colors::number(&format_bytes(stat.storage_size)),
                        colors::number(&stat.wal_size.to_string()),
                        colors::dim(&format_relative_time(&stat.update_at))
                    );
                }
            }
        }
        OutputFormat::Json => print_json(&response)?,
    }

    Ok(())
}

/// Execute get-index-info command
pub fn execute_info(
    args: InfoArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let index = services.registry.get(&args.name).ok_or_else(|| {
        format!(
            "Index '{}' not found. Run 'quarry list-indexes' to see available indexes.",
            args.name
        )
    })?;
    index.refresh_wal_size()?;

    let response = IndexInfoResponse {
        stat: index.stat(),
        shards: index.shards(),
        fields: index.mappings().map(|m| m.len()).unwrap_or(0),
    };

    match format {
        OutputFormat::Human => {
            let stat = &response.stat;
            println!(
                "{}: {}",
                colors::label("Index"),
                colors::index_name(&stat.name)
            );
            println!("  {}: {}", colors::label("Storage"), stat.storage_type);
            if stat.storage_type == StorageType::Disk {
                let path = services.config.storage.index_data_dir(&stat.name);
                println!(
                    "  {}: {}",
                    colors::label("Path"),
                    colors::file_path(&path.display().to_string())
                );
            }
            println!(
                "  {}: {}",
                colors::label("Documents"),
                colors::number(&stat.doc_num.to_string())
            );
            println!(
                "  {}: {}",
                colors::label("Size"),
                colors::number(&format_bytes(stat.storage_size))
            );
            println!(
                "  {}: {}",
                colors::label("Pending WAL"),
                colors::number(&stat.wal_size.to_string())
            );
            println!(
                "  {}: {}",
                colors::label("Mapped fields"),
                colors::number(&response.fields.to_string())
            );
            println!(
                "  {}: {}",
                colors::label("Created"),
                colors::dim(&stat.create_at.to_rfc3339())
            );
            println!(
                "  {} ({}):",
                colors::label("Shards"),
                colors::number(&stat.shard_num.to_string())
            );
            let active_id = response.shards.last().map(|s| s.id);
            for shard in &response.shards {
                let marker = if Some(shard.id) == active_id {
                    colors::active("active")
                } else {
                    colors::dim("sealed")
                };
                println!(
                    "    {:06x}  {:>8} docs  {:>10}  {}",
                    shard.id,
                    colors::number(&shard.doc_num.to_string()),
                    colors::number(&format_bytes(shard.storage_size)),
                    marker
                );
            }
        }
        OutputFormat::Json => print_json(&response)?,
    }

    Ok(())
}

/// Execute delete-index command
pub fn execute_delete(
    args: DeleteArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    if services.registry.get(&args.name).is_none() {
        return Err(format!(
            "Index '{}' not found. Run 'quarry list-indexes' to see available indexes.",
            args.name
        )
        .into());
    }

    // Confirmation prompt unless --force
    if !args.force {
        print!("Delete index '{}'? [y/N] ", colors::index_name(&args.name));
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", colors::dim("Cancelled."));
            return Ok(());
        }
    }

    services.registry.delete_index(&args.name)?;

    match format {
        OutputFormat::Human => {
            println!(
                "{} index '{}'",
                colors::success("Deleted"),
                colors::index_name(&args.name)
            );
        }
        OutputFormat::Json => {
            print_json(&serde_json::json!({
                "deleted": true,
                "index": args.name
            }))?;
        }
    }

    Ok(())
}
