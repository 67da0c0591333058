//! Search engine seam.
//!
//! The index layer never touches segment files itself. It hands a
//! resolved [`OpenConfig`] to an [`IndexEngine`] and gets back a
//! [`ShardWriter`] bound to that shard's storage location.

use crate::core::document::Document;
use crate::core::error::Result;
use crate::core::storage::resolver::OpenConfig;

/// Opens writers for shard storage locations
pub trait IndexEngine: Send + Sync {
    fn open_writer(&self, config: &OpenConfig) -> Result<Box<dyn ShardWriter>>;
}

/// Single writer for one shard
pub trait ShardWriter: Send {
    /// Stage a document; with `upsert` an existing document with the same
    /// id is replaced
    fn add_document(&mut self, id: &str, doc: &Document, upsert: bool) -> Result<()>;

    /// Make staged documents durable and visible
    fn commit(&mut self) -> Result<()>;

    /// Release the writer; uncommitted documents are dropped
    fn close(&mut self) -> Result<()>;
}
