//! CLI adapter for quarry
//!
//! Provides a command-line interface over the index registry. The CLI
//! only talks to `core/` through [`Services`](crate::core::services::Services).
//!
//! # Architecture
//!
//! ```text
//!              +------------------+
//!              |     core/        |
//!              |  (domain logic)  |
//!              +--------+---------+
//!                       |
//!                       v
//!              +------------------+
//!              |      cli/        |
//!              | (clap adapter)   |
//!              +------------------+
//! ```

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Quarry - shard-partitioned index management
///
/// Create indexes, write documents through the write-ahead log, and roll
/// shards over once they grow past the configured size.
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(version)]
#[command(about = "Shard-partitioned full-text index management", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Data directory (overrides config file and QUARRY_DATA_DIR)
    #[arg(long, global = true, env = "QUARRY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an index (no-op if it already exists)
    #[command(name = "create-index")]
    CreateIndex(commands::index::CreateArgs),

    /// List all indexes with their stats
    #[command(name = "list-indexes")]
    ListIndexes(commands::index::ListArgs),

    /// Show an index definition and its shards
    #[command(name = "get-index-info")]
    GetIndexInfo(commands::index::InfoArgs),

    /// Delete an index with its definition, WAL and local data
    #[command(name = "delete-index")]
    DeleteIndex(commands::index::DeleteArgs),

    /// Write documents to an index
    #[command(name = "put-document")]
    PutDocument(commands::DocumentArgs),

    /// Apply pending writes and roll the active shard over if it is full
    #[command(name = "check-shards")]
    CheckShards(commands::ShardsArgs),

    /// Show current configuration
    #[command(name = "show-config")]
    ShowConfig(commands::ConfigArgs),

    /// Show version and store information
    #[command(name = "get-server-info")]
    GetServerInfo(commands::InfoArgs),

    /// Generate shell completion scripts
    ///
    /// Output completion script to stdout. To install:
    ///
    ///   bash:  quarry completions bash > ~/.local/share/bash-completion/completions/quarry
    ///   zsh:   quarry completions zsh > ~/.zfunc/_quarry
    ///   fish:  quarry completions fish > ~/.config/fish/completions/quarry.fish
    Completions(commands::CompletionsArgs),
}

/// Run the CLI with the provided arguments
pub fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    use crate::core::config::Config;
    use crate::core::services::Services;
    use crate::core::xdg::XdgDirs;

    // Handle completions command early (doesn't need services)
    if let Commands::Completions(args) = cli.command {
        return commands::completions::execute(args);
    }

    // Initialize XDG directories
    let xdg = XdgDirs::new();
    xdg.ensure_dirs_exist()?;
    xdg.log_paths();

    // Load configuration
    let mut config = Config::load_with_xdg(&xdg)?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_path = data_dir;
    }
    config.log_config();

    // Create services
    let services = Services::new(config)?;

    // Execute command
    let result = match cli.command {
        Commands::CreateIndex(args) => commands::index::execute_create(args, &services, cli.format),
        Commands::ListIndexes(args) => commands::index::execute_list(args, &services, cli.format),
        Commands::GetIndexInfo(args) => commands::index::execute_info(args, &services, cli.format),
        Commands::DeleteIndex(args) => {
            commands::index::execute_delete(args, &services, cli.format)
        }
        Commands::PutDocument(args) => commands::document::execute(args, &services, cli.format),
        Commands::CheckShards(args) => commands::shards::execute(args, &services, cli.format),
        Commands::ShowConfig(args) => commands::config::execute(args, &services, cli.format),
        Commands::GetServerInfo(args) => commands::info::execute(args, &services, cli.format),
        Commands::Completions(_) => unreachable!(), // Handled above
    };

    // Close indexes even when the command failed
    let shutdown = services.shutdown();
    result?;
    shutdown?;
    Ok(())
}
