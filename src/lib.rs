//! Quarry - physical index management for full-text search
//!
//! Quarry owns the lifecycle of named, shard-partitioned, WAL-backed
//! indexes: which durable storage unit a document lands in and when
//! that unit rotates. Segment formats and search are delegated to
//! Tantivy behind the [`core::storage::IndexEngine`] seam.
//!
//! # Architecture
//!
//! The codebase is organized into two modules:
//!
//! - **core**: Domain logic (adapter-agnostic)
//!   - config, error, types, xdg
//!   - document, wal (durability path)
//!   - storage (resolver, engine seam, metadata store)
//!   - index (construction, shard lifecycle), registry
//!   - services (unified service container)
//!
//! - **cli**: Command-line adapter (depends on core)
//!
//! # Key Features
//!
//! - Exactly-once index construction under concurrent first access
//! - Size-driven shard rollover with monotonic shard IDs
//! - Crash-safe definitions and write-ahead logged documents
//! - Disk, S3 and MinIO storage resolution

// Core domain logic (adapter-agnostic)
pub mod core;

// Command-line adapter
pub mod cli;

// Re-export commonly used types for convenience
pub use core::config::Config;
pub use core::document::{Document, FieldValue};
pub use core::error::{QuarryError, Result};
pub use core::index::{check_index_name, Index, IndexContext};
pub use core::registry::IndexRegistry;
pub use core::services::Services;
pub use core::types::*;
