//! Check-shards command - apply pending writes and roll over full shards

use crate::cli::output::{colors, format_bytes, print_json};
use crate::cli::OutputFormat;
use crate::core::services::Services;
use clap::Args;

/// Arguments for check-shards
#[derive(Args, Debug)]
pub struct ShardsArgs {
    /// Index name; all indexes when omitted
    pub index: Option<String>,
}

/// Execute check-shards command
pub fn execute(
    args: ShardsArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let indexes = match &args.index {
        Some(name) => vec![services.registry.get(name).ok_or_else(|| {
            format!("Index '{name}' not found. Run 'quarry list-indexes' to see available indexes.")
        })?],
        None => {
            let mut all = services.registry.list();
            all.sort_by(|a, b| a.name().cmp(b.name()));
            all
        }
    };

    let mut results = Vec::with_capacity(indexes.len());
    for index in &indexes {
        let before = index.shard_num();
        index.check_shards()?;
        let after = index.shard_num();
        let active = index.shards().last().cloned();
        results.push((index.name().to_string(), before, after, active));
    }

    match format {
        OutputFormat::Human => {
            for (name, before, after, active) in &results {
                let status = if after > before {
                    colors::success("rolled over")
                } else {
                    colors::dim("unchanged")
                };
                let (active_id, active_size) = active
                    .as_ref()
                    .map(|s| (s.id, s.storage_size))
                    .unwrap_or_default();
                println!(
                    "  {:<24} {:>4} shards  active {:06x} at {:>10}  {}",
                    colors::index_name(name),
                    colors::number(&after.to_string()),
                    active_id,
                    colors::number(&format_bytes(active_size)),
                    status
                );
            }
        }
        OutputFormat::Json => {
            let items: Vec<serde_json::Value> = results
                .iter()
                .map(|(name, before, after, active)| {
                    serde_json::json!({
                        "index": name,
                        "rolled_over": after > before,
                        "shard_num": after,
                        "active_shard": active,
                    })
                })
                .collect();
            print_json(&items)?;
        }
    }

    Ok(())
}
