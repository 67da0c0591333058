//! Put-document command - write documents through an index's WAL
//!
//! Documents come from the command line as one JSON object, or from a
//! file (or stdin with `-`) holding one JSON object per line. After the
//! writes the shard check runs, matching the usual write-burst sequence.

use crate::cli::output::{colors, format_duration, print_json, print_warning};
use crate::cli::OutputFormat;
use crate::core::document::Document;
use crate::core::services::Services;
use clap::Args;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for put-document
#[derive(Args, Debug)]
pub struct DocumentArgs {
    /// Index name (created on first use)
    pub index: String,

    /// Document as a JSON object
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub document: Option<String>,

    /// Read JSON-lines documents from a file ('-' for stdin)
    #[arg(long, short = 'F')]
    pub file: Option<PathBuf>,

    /// Document id (generated when omitted; single document only)
    #[arg(long, conflicts_with = "file")]
    pub id: Option<String>,

    /// Replace an existing document with the same id
    #[arg(long)]
    pub upsert: bool,

    /// Leave writes in the WAL and skip the shard check
    #[arg(long)]
    pub no_check: bool,
}

/// Parse JSON-lines input, skipping blank lines
pub fn parse_documents(reader: impl BufRead) -> Result<Vec<Document>, Box<dyn std::error::Error>> {
    let mut documents = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(&line)
            .map_err(|e| format!("line {}: invalid JSON: {e}", line_no + 1))?;
        let doc = Document::from_json(value).map_err(|e| format!("line {}: {e}", line_no + 1))?;
        documents.push(doc);
    }
    Ok(documents)
}

/// Execute put-document command
pub fn execute(
    args: DocumentArgs,
    services: &Services,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let documents = match (&args.document, &args.file) {
        (Some(json), _) => vec![Document::from_json(serde_json::from_str(json)?)?],
        (None, Some(path)) if path.as_os_str() == "-" => parse_documents(io::stdin().lock())?,
        (None, Some(path)) => parse_documents(BufReader::new(File::open(path)?))?,
        (None, None) => return Err("No document given".into()),
    };

    if documents.is_empty() {
        print_warning("No documents to write");
        return Ok(());
    }

    let start = Instant::now();
    let (index, existed) = services.registry.get_or_create(&args.index, "")?;
    if !existed && format == OutputFormat::Human {
        eprintln!(
            "{} index '{}'",
            colors::success("Created"),
            colors::index_name(index.name())
        );
    }

    let doc_id = args.id.unwrap_or_default();
    let mut ids = Vec::with_capacity(documents.len());
    for doc in documents {
        ids.push(index.create_document(&doc_id, doc, args.upsert)?);
    }

    if !args.no_check {
        index.check_shards()?;
    }
    let duration_secs = start.elapsed().as_secs_f64();

    match format {
        OutputFormat::Human => {
            println!(
                "{} {} document(s) to '{}' in {}",
                colors::success("Wrote"),
                colors::number(&ids.len().to_string()),
                colors::index_name(index.name()),
                format_duration(duration_secs)
            );
            if ids.len() == 1 {
                println!("  {}: {}", colors::label("id"), ids[0]);
            }
            println!(
                "  {}: {}",
                colors::label("shards"),
                colors::number(&index.shard_num().to_string())
            );
        }
        OutputFormat::Json => {
            print_json(&serde_json::json!({
                "index": index.name(),
                "ids": ids,
                "shard_num": index.shard_num(),
                "wal_size": index.wal_size(),
                "duration_secs": duration_secs
            }))?;
        }
    }

    Ok(())
}
