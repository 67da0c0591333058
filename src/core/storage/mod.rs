//! Storage layer for shard data and index definitions.
//!
//! This module keeps every storage concern behind a narrow seam so the
//! index layer stays backend-agnostic.
//!
//! # Architecture
//!
//! - **StorageConfigResolver**: Maps a storage type to open parameters
//! - **IndexEngine / ShardWriter**: Search engine seam, one writer per shard
//! - **TantivyEngine**: Tantivy-backed engine for local disk
//! - **MetadataStore**: Durable key/value store for index definitions
//!
//! # On-disk layout
//!
//! ```text
//! {data_path}/
//! ├── _metadata/          # one JSON definition per index, plus version
//! ├── _wal/{index}/       # write-ahead log per index
//! └── {index}/{shard}/    # Tantivy index per shard
//!     ├── meta.json
//!     └── [segment files]
//! ```

mod engine;
mod metadata;
mod resolver;
mod tantivy;

pub use engine::{IndexEngine, ShardWriter};
pub use metadata::{FileMetadataStore, MemoryMetadataStore, MetadataStore};
pub use resolver::{shard_location, Backend, OpenConfig, StorageConfigResolver};
pub use tantivy::{create_schema, TantivyEngine, TantivyShardWriter};
