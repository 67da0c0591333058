//! Quarry CLI - command-line interface for sharded index management
//!
//! # Examples
//!
//! ```bash
//! # Create an index on local disk
//! quarry create-index logs-2024
//!
//! # Write a document and run the shard check
//! quarry put-document logs-2024 '{"level": "info", "msg": "started"}'
//!
//! # Bulk load JSON lines
//! quarry put-document logs-2024 --file events.jsonl
//!
//! # Inspect shards
//! quarry get-index-info logs-2024
//! ```
//!
//! Logs go to stderr. `RUST_LOG` controls the filter and `QUARRY_LOG_JSON`
//! switches to JSON lines.

use clap::Parser;
use quarry::cli::output::print_error;
use quarry::cli::{run, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "quarry=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var_os("QUARRY_LOG_JSON").is_some() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}

fn main() {
    init_logging();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}
