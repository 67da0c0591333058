//! Unified service container for quarry
//!
//! Provides shared access to the registry and its collaborators.

use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::index::IndexContext;
use crate::core::registry::IndexRegistry;
use crate::core::storage::{FileMetadataStore, IndexEngine, MetadataStore, TantivyEngine};
use crate::core::template::TemplateStore;
use std::sync::Arc;

/// Unified services container
///
/// Adapters (the CLI, embedding applications) use this struct for
/// service access.
#[derive(Clone)]
pub struct Services {
    /// Registry of live indexes
    pub registry: Arc<IndexRegistry>,

    /// Schema templates applied to new indexes
    pub templates: Arc<TemplateStore>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl Services {
    /// Create services from configuration
    ///
    /// Uses the Tantivy engine and a file metadata store under the
    /// configured data path, then opens the registry.
    pub fn new(config: Config) -> Result<Self> {
        let metadata = Arc::new(FileMetadataStore::open(config.storage.metadata_dir())?);
        Self::with_collaborators(config, Arc::new(TantivyEngine::new()), metadata)
    }

    /// Create services around an explicit engine and metadata store
    pub fn with_collaborators(
        config: Config,
        engine: Arc<dyn IndexEngine>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Result<Self> {
        let templates = Arc::new(TemplateStore::new());
        let ctx = IndexContext::new(config.clone(), engine, metadata)
            .with_templates(Arc::clone(&templates));
        let registry = Arc::new(IndexRegistry::open(Arc::new(ctx))?);

        Ok(Self {
            registry,
            templates,
            config: Arc::new(config),
        })
    }

    /// Close every live index
    pub fn shutdown(&self) -> Result<()> {
        self.registry.close()
    }
}
