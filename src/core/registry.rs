//! Registry of live indexes.
//!
//! The registry maps index names to the single live [`Index`] instance for
//! that name. Its lock only guards the map: slow per-index work (WAL
//! replay, shard rollover) happens under the index's own lock, and the
//! registry lock is never taken while an index lock is held.
//!
//! `get_or_create` takes the read lock on the fast path and re-checks
//! under the write lock on a miss, so concurrent first references build
//! and persist exactly one index.

use crate::core::error::{QuarryError, Result};
use crate::core::index::{check_index_name, Index, IndexContext};
use crate::core::types::{
    index_key, IndexMeta, IndexStat, StorageType, INDEX_KEY_PREFIX, VERSION_KEY,
};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Duration;

/// Version marker written to a fresh metadata store
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-wide table of live indexes
pub struct IndexRegistry {
    ctx: Arc<IndexContext>,
    indexes: RwLock<HashMap<String, Arc<Index>>>,
}

impl std::fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRegistry")
            .field("indexes", &self.list_name())
            .finish()
    }
}

impl IndexRegistry {
    /// Create an empty registry without touching the metadata store
    pub fn new(ctx: Arc<IndexContext>) -> Self {
        Self {
            ctx,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    /// Open the registry: write the version marker if absent and load
    /// every persisted index definition
    pub fn open(ctx: Arc<IndexContext>) -> Result<Self> {
        let registry = Self::new(ctx);
        registry.ensure_version()?;
        registry.load()?;
        Ok(registry)
    }

    pub fn context(&self) -> &Arc<IndexContext> {
        &self.ctx
    }

    fn ensure_version(&self) -> Result<()> {
        if self.ctx.metadata.get(VERSION_KEY)?.is_none() {
            let value = serde_json::to_vec(VERSION)?;
            self.ctx.metadata.set(VERSION_KEY, &value)?;
            tracing::info!("Initialized metadata store at version {}", VERSION);
        }
        Ok(())
    }

    /// Version marker recorded in the metadata store
    pub fn version(&self) -> Result<Option<String>> {
        match self.ctx.metadata.get(VERSION_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load every persisted definition
    ///
    /// A definition that cannot be read or reopened is logged and skipped
    /// so the remaining indexes stay available.
    fn load(&self) -> Result<()> {
        let mut loaded = HashMap::new();
        let mut skipped = 0usize;
        for (name, value) in self.ctx.metadata.list_prefix(INDEX_KEY_PREFIX)? {
            match self.index_from_bytes(&name, &value) {
                Ok(index) => {
                    loaded.insert(name, Arc::new(index));
                }
                Err(e) => {
                    tracing::error!("Failed to load index '{}': {}", name, e);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} unreadable index definition(s)", skipped);
        }
        tracing::info!("Loaded {} index definition(s)", loaded.len());
        *self.indexes.write() = loaded;
        Ok(())
    }

    fn index_from_bytes(&self, key: &str, value: &[u8]) -> Result<Index> {
        Index::from_meta(parse_meta(key, value)?, self.ctx.clone())
    }

    /// Insert or replace an index; the caller has validated and persisted it
    pub fn add(&self, index: Arc<Index>) {
        self.indexes
            .write()
            .insert(index.name().to_string(), index);
    }

    pub fn get(&self, name: &str) -> Option<Arc<Index>> {
        let index = self.indexes.read().get(name).cloned();
        if let Some(index) = &index {
            index.touch();
        }
        index
    }

    /// Get the live index for `name`, creating and persisting it on first
    /// reference
    ///
    /// Returns the index and whether it already existed. An index evicted
    /// by GC is reloaded from its persisted definition. When construction
    /// or persistence fails nothing is cached, so the call can be retried.
    pub fn get_or_create(&self, name: &str, storage_type: &str) -> Result<(Arc<Index>, bool)> {
        if let Some(index) = self.get(name) {
            return Ok((index, true));
        }
        check_index_name(name)?;

        let mut indexes = self.indexes.write();
        // another caller may have won the race for the write lock
        if let Some(index) = indexes.get(name) {
            index.touch();
            return Ok((index.clone(), true));
        }

        if let Some(bytes) = self.ctx.metadata.get(&index_key(name))? {
            let index = Arc::new(self.index_from_bytes(name, &bytes)?);
            indexes.insert(name.to_string(), index.clone());
            tracing::debug!("Index '{}' reloaded from metadata", name);
            return Ok((index, true));
        }

        let index = Index::new(name, storage_type, self.ctx.clone())?;
        if let Err(e) = index.store() {
            if let Err(close_err) = index.close() {
                tracing::warn!("Failed to close unpersisted index '{}': {}", name, close_err);
            }
            return Err(e);
        }

        let index = Arc::new(index);
        indexes.insert(name.to_string(), index.clone());
        tracing::info!(
            "Created index '{}' on {} storage",
            name,
            index.storage_type()
        );
        Ok((index, false))
    }

    /// Persist an index definition and make the index visible
    pub fn store_index(&self, index: Arc<Index>) -> Result<()> {
        index.store()?;
        self.add(index);
        Ok(())
    }

    /// Close and unregister an index
    ///
    /// A close failure is logged and the index is removed anyway. Unknown
    /// names are ignored.
    pub fn delete(&self, name: &str) {
        let mut indexes = self.indexes.write();
        if let Some(index) = indexes.remove(name) {
            if let Err(e) = index.close() {
                tracing::error!("Failed to close index '{}': {}", name, e);
            }
            tracing::info!("Index '{}' removed from registry", name);
        }
    }

    /// Delete an index for good: unregister it, drop its definition, its
    /// WAL and its local shard data
    pub fn delete_index(&self, name: &str) -> Result<()> {
        check_index_name(name)?;

        let storage_type = match self.get(name) {
            Some(index) => index.storage_type(),
            None => match self.ctx.metadata.get(&index_key(name))? {
                Some(bytes) => parse_meta(name, &bytes)?.storage_type,
                None => return Err(QuarryError::IndexNotFound(name.to_string())),
            },
        };

        self.delete(name);
        self.ctx.metadata.delete(&index_key(name))?;

        let storage = &self.ctx.config.storage;
        remove_index_dir(&storage.wal_dir(), &storage.index_wal_dir(name))?;
        if storage_type == StorageType::Disk {
            remove_index_dir(&storage.data_path, &storage.index_data_dir(name))?;
        }

        tracing::info!("Deleted index '{}'", name);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.indexes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.read().is_empty()
    }

    /// Snapshot of the live indexes, in no particular order
    pub fn list(&self) -> Vec<Arc<Index>> {
        self.indexes.read().values().cloned().collect()
    }

    /// Stats for every live index, sorted by name
    ///
    /// WAL sizes are refreshed under each index's own lock after the
    /// registry lock is released.
    pub fn list_stat(&self) -> Vec<IndexStat> {
        let mut items = self.list();
        items.sort_by(|a, b| a.name().cmp(b.name()));

        items
            .iter()
            .map(|index| {
                if let Err(e) = index.refresh_wal_size() {
                    tracing::debug!("WAL size of '{}' unavailable: {}", index.name(), e);
                }
                index.stat()
            })
            .collect()
    }

    /// Names of every live index, sorted
    pub fn list_name(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Close every index, stopping at the first failure
    ///
    /// On success the registry is left empty. On failure the indexes
    /// stay registered; those visited before the failing one are closed.
    pub fn close(&self) -> Result<()> {
        let mut indexes = self.indexes.write();
        let mut names: Vec<&String> = indexes.keys().collect();
        names.sort();

        for name in names {
            if let Some(index) = indexes.get(name.as_str()) {
                index.close()?;
            }
        }

        tracing::info!("Closed {} index(es)", indexes.len());
        indexes.clear();
        Ok(())
    }

    /// Evict indexes idle longer than the configured GC timeout
    pub fn gc(&self) -> Vec<String> {
        let timeout = Duration::from_secs(self.ctx.config.gc.idle_timeout_secs);
        self.evict_idle(timeout)
    }

    /// Evict indexes idle for at least `idle` that nobody else holds
    ///
    /// An index counts as held while any `Arc` besides the registry's
    /// exists. Evicted indexes are closed; their definitions and WALs stay
    /// on disk and `get_or_create` reloads them. Returns the evicted names.
    pub fn evict_idle(&self, idle: Duration) -> Vec<String> {
        let now = Utc::now();
        let idle_millis = i64::try_from(idle.as_millis()).unwrap_or(i64::MAX);

        let mut indexes = self.indexes.write();
        let mut evicted: Vec<String> = indexes
            .iter()
            .filter(|(_, index)| {
                Arc::strong_count(index) == 1 && index.idle_millis(now) >= idle_millis
            })
            .map(|(name, _)| name.clone())
            .collect();
        evicted.sort();

        for name in &evicted {
            if let Some(index) = indexes.remove(name) {
                if let Err(e) = index.close() {
                    tracing::warn!("Failed to close idle index '{}': {}", name, e);
                }
            }
        }

        if !evicted.is_empty() {
            tracing::info!("GC evicted {} idle index(es)", evicted.len());
        }
        evicted
    }
}

/// Decode a persisted definition stored under `key`
fn parse_meta(key: &str, value: &[u8]) -> Result<IndexMeta> {
    let meta: IndexMeta = serde_json::from_slice(value).map_err(|e| {
        QuarryError::MetadataError(format!("index [{key}] definition is unreadable: {e}"))
    })?;
    if meta.name != key {
        return Err(QuarryError::MetadataError(format!(
            "index definition stored under [{key}] is named [{}]",
            meta.name
        )));
    }
    Ok(meta)
}

/// Remove an index directory, which must sit strictly below `root`
fn remove_index_dir(root: &Path, path: &Path) -> Result<()> {
    let below_root = path.strip_prefix(root).is_ok_and(|rel| {
        let mut components = rel.components().peekable();
        components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
    });
    if !below_root {
        return Err(QuarryError::StorageError(format!(
            "refusing to remove {path:?}: not inside {root:?}"
        )));
    }

    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    Ok(())
}
