//! Core domain logic (adapter-agnostic)
//!
//! This module contains the index management layer, independent of any
//! command-line or network adapter.
//!
//! # Architecture
//!
//! - **config**: Configuration loading (TOML + environment)
//! - **error**: Error types and Result alias
//! - **types**: Index definitions, shard descriptors and stats
//! - **xdg**: XDG directory handling
//! - **document**: Schema-checked document records
//! - **wal**: Per-index write-ahead log
//! - **storage**: Storage resolution, engine seam, metadata store
//! - **template**: Schema presets for new indexes
//! - **index**: Index entity and shard lifecycle
//! - **registry**: Live index table
//! - **services**: Unified service container

pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod registry;
pub mod services;
pub mod storage;
pub mod template;
pub mod types;
pub mod wal;
pub mod xdg;

// Re-export key types for convenience
pub use config::Config;
pub use error::{QuarryError, Result};
pub use services::Services;
