//! Tantivy-backed shard writers.
//!
//! Each shard is an independent Tantivy index. Documents are stored
//! with their id, the original JSON source, and a JSON field holding
//! the flattened fields for full-text search.

use crate::core::document::Document;
use crate::core::error::{QuarryError, Result};
use crate::core::storage::engine::{IndexEngine, ShardWriter};
use crate::core::storage::resolver::{Backend, OpenConfig};
use crate::core::types::AnalyzerSpec;
use std::path::Path;
use tantivy::schema::*;
use tantivy::{Index, IndexWriter, TantivyDocument, Term};

/// Tokenizers registered by Tantivy's default tokenizer manager
const BUILTIN_TOKENIZERS: &[&str] = &["default", "raw", "en_stem", "whitespace"];

/// Create the Tantivy schema for a shard
///
/// Fields:
/// - _id: Document identifier (STRING | STORED)
/// - _source: Original document JSON (STORED)
/// - fields: Flattened document fields (JSON, tokenized with the
///   default search analyzer)
pub fn create_schema(analyzer: Option<&AnalyzerSpec>) -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field("_id", STRING | STORED);
    builder.add_text_field("_source", STORED);

    let tokenizer = analyzer.map(|a| a.tokenizer.as_str()).unwrap_or("default");
    let indexing = TextFieldIndexing::default()
        .set_tokenizer(tokenizer)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    builder.add_json_field(
        "fields",
        JsonObjectOptions::default().set_indexing_options(indexing),
    );

    builder.build()
}

/// Engine opening Tantivy indexes on local disk
#[derive(Debug, Default, Clone)]
pub struct TantivyEngine;

impl TantivyEngine {
    pub fn new() -> Self {
        Self
    }
}

impl IndexEngine for TantivyEngine {
    fn open_writer(&self, config: &OpenConfig) -> Result<Box<dyn ShardWriter>> {
        match &config.backend {
            Backend::Disk { path } => {
                let writer = TantivyShardWriter::open(
                    path,
                    config.default_search_analyzer.as_ref(),
                    config.writer_heap_bytes,
                )?;
                Ok(Box::new(writer))
            }
            other => Err(QuarryError::StorageError(format!(
                "Tantivy engine cannot open {} storage; an object-store engine is required",
                other.storage_type()
            ))),
        }
    }
}

/// Tantivy index writer for one shard
pub struct TantivyShardWriter {
    schema: Schema,
    id_field: Field,
    writer: Option<IndexWriter>,
}

impl std::fmt::Debug for TantivyShardWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyShardWriter")
            .field("open", &self.writer.is_some())
            .finish()
    }
}

impl TantivyShardWriter {
    /// Open the shard index at `index_dir`, creating it when absent
    pub fn open(
        index_dir: &Path,
        analyzer: Option<&AnalyzerSpec>,
        heap_bytes: usize,
    ) -> Result<Self> {
        if let Some(spec) = analyzer {
            if !BUILTIN_TOKENIZERS.contains(&spec.tokenizer.as_str()) {
                return Err(QuarryError::StorageError(format!(
                    "Unknown tokenizer '{}' (available: {})",
                    spec.tokenizer,
                    BUILTIN_TOKENIZERS.join(", ")
                )));
            }
        }

        std::fs::create_dir_all(index_dir)?;

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir)
                .map_err(|e| QuarryError::StorageError(format!("Failed to open index: {e}")))?
        } else {
            Index::create_in_dir(index_dir, create_schema(analyzer))
                .map_err(|e| QuarryError::StorageError(format!("Failed to create index: {e}")))?
        };

        let schema = index.schema();
        let id_field = schema
            .get_field("_id")
            .map_err(|e| QuarryError::StorageError(format!("Missing _id field: {e}")))?;

        let writer = index
            .writer_with_num_threads(1, heap_bytes)
            .map_err(|e| QuarryError::StorageError(format!("Failed to create writer: {e}")))?;

        Ok(Self {
            schema,
            id_field,
            writer: Some(writer),
        })
    }

    fn writer(&mut self) -> Result<&mut IndexWriter> {
        self.writer
            .as_mut()
            .ok_or_else(|| QuarryError::StorageError("Shard writer is closed".to_string()))
    }
}

impl ShardWriter for TantivyShardWriter {
    fn add_document(&mut self, id: &str, doc: &Document, upsert: bool) -> Result<()> {
        let fields = doc.to_json()?;
        let source = serde_json::to_string(&fields)?;
        let json = serde_json::json!({
            "_id": id,
            "_source": source,
            "fields": fields,
        });

        let tantivy_doc = TantivyDocument::parse_json(&self.schema, &json.to_string())
            .map_err(|e| QuarryError::StorageError(format!("Failed to build document: {e}")))?;

        let id_term = Term::from_field_text(self.id_field, id);
        let writer = self.writer()?;
        if upsert {
            writer.delete_term(id_term);
        }
        writer
            .add_document(tantivy_doc)
            .map_err(|e| QuarryError::StorageError(format!("Failed to add document: {e}")))?;

        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.writer()?
            .commit()
            .map_err(|e| QuarryError::StorageError(format!("Failed to commit: {e}")))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .wait_merging_threads()
                .map_err(|e| QuarryError::StorageError(format!("Failed to close writer: {e}")))?;
        }
        Ok(())
    }
}
