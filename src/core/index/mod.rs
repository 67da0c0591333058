//! Index entity.
//!
//! An [`Index`] bundles a validated name, its schema (settings, mappings,
//! analyzers), the ordered shard sequence and the write-ahead log every
//! document write passes through. All mutable state sits behind one
//! per-index lock, separate from the registry lock.
//!
//! # Lifecycle
//!
//! ```text
//! Index::new ──> Index::store ──> create_document* ──> check_shards ──> close
//!    │                                  │                   │
//!    └ name check, template,            └ WAL append        └ flush WAL to the
//!      WAL open, shard 0                                      active shard, roll
//!                                                             over when too big
//! ```

mod shards;

use crate::core::config::Config;
use crate::core::document::Document;
use crate::core::error::{QuarryError, Result};
use crate::core::storage::{
    shard_location, IndexEngine, MetadataStore, OpenConfig, ShardWriter, StorageConfigResolver,
};
use crate::core::template::TemplateStore;
use crate::core::types::{
    index_key, AnalyzerSpec, IndexMeta, IndexSettings, IndexShard, IndexStat, Mappings, Property,
    StorageType,
};
use crate::core::wal::{Wal, EMPTY_WAL_LEN};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use ulid::Ulid;

static INDEX_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap());

/// Check an index name against the naming contract
///
/// Names must be non-empty, must not start with `_` and may only use
/// `[A-Za-z0-9_.-]`.
pub fn check_index_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(QuarryError::InvalidIndexName(
            "index name cannot be empty".to_string(),
        ));
    }
    if name.starts_with('_') {
        return Err(QuarryError::InvalidIndexName(
            "index name cannot start with _".to_string(),
        ));
    }
    if !INDEX_NAME_RE.is_match(name) {
        return Err(QuarryError::InvalidIndexName(format!(
            "index name [{name}] is invalid, just accept [a-zA-Z0-9_.-]"
        )));
    }
    Ok(())
}

/// Shared collaborators every index needs
pub struct IndexContext {
    pub config: Config,
    pub engine: Arc<dyn IndexEngine>,
    pub metadata: Arc<dyn MetadataStore>,
    pub resolver: StorageConfigResolver,
    pub templates: Arc<TemplateStore>,
}

impl IndexContext {
    pub fn new(
        config: Config,
        engine: Arc<dyn IndexEngine>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let resolver = StorageConfigResolver::new(&config);
        Self {
            config,
            engine,
            metadata,
            resolver,
            templates: Arc::new(TemplateStore::new()),
        }
    }

    pub fn with_templates(mut self, templates: Arc<TemplateStore>) -> Self {
        self.templates = templates;
        self
    }
}

impl std::fmt::Debug for IndexContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexContext")
            .field("config", &self.config)
            .field("templates", &self.templates.len())
            .finish()
    }
}

/// Mutable index state, guarded by the index lock
struct IndexState {
    shard_num: u64,
    shards: Vec<IndexShard>,
    wal_applied_seq: u64,
    settings: Option<IndexSettings>,
    mappings: Option<Mappings>,
    analyzers: Option<BTreeMap<String, AnalyzerSpec>>,
    update_at: DateTime<Utc>,
    wal_size: u64,
    wal: Wal,

    /// WAL records below this are committed to the active writer, even
    /// if the definition does not count them yet
    committed_seq: u64,

    /// Writer for the active shard; sealed shards never hold one
    writer: Option<Box<dyn ShardWriter>>,
    closed: bool,
}

impl IndexState {
    fn active_shard(&self) -> Result<&IndexShard> {
        self.shards
            .last()
            .ok_or_else(|| QuarryError::StorageError("index has no shards".to_string()))
    }
}

/// A named, sharded, WAL-backed index
pub struct Index {
    name: String,
    storage_type: StorageType,
    create_at: DateTime<Utc>,
    ctx: Arc<IndexContext>,
    state: Mutex<IndexState>,

    /// Unix millis of the last registry lookup or write, read by GC
    last_access: AtomicI64,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("storage_type", &self.storage_type)
            .field("create_at", &self.create_at)
            .finish()
    }
}

/// WAL record count as shown to callers: the empty-log marker is hidden
fn pending_wal_entries(raw_len: u64) -> u64 {
    raw_len.saturating_sub(EMPTY_WAL_LEN)
}

impl Index {
    /// Build a new, not yet persisted index
    ///
    /// An empty `storage_type` falls back to the configured default
    /// storage type (`disk` unless configured otherwise).
    pub fn new(name: &str, storage_type: &str, ctx: Arc<IndexContext>) -> Result<Self> {
        check_index_name(name)?;

        let storage_type = if storage_type.is_empty() {
            ctx.config.storage.default_type
        } else {
            storage_type.parse()?
        };

        let (settings, mappings) = match ctx.templates.find(name) {
            Some(template) => {
                tracing::debug!("Index '{}' uses template '{}'", name, template.name);
                (template.settings, template.mappings)
            }
            None => (None, None),
        };

        let wal = Wal::open(
            &ctx.config.storage.index_wal_dir(name),
            ctx.config.wal.sync_on_write,
        )?;

        let now = Utc::now();
        Ok(Self {
            name: name.to_string(),
            storage_type,
            create_at: now,
            state: Mutex::new(IndexState {
                shard_num: 1,
                shards: vec![IndexShard::new(0)],
                wal_applied_seq: 0,
                settings,
                mappings,
                analyzers: None,
                update_at: now,
                wal_size: 0,
                wal,
                committed_seq: 0,
                writer: None,
                closed: false,
            }),
            ctx,
            last_access: AtomicI64::new(now.timestamp_millis()),
        })
    }

    /// Rebuild an index from its persisted definition, reopening its WAL
    ///
    /// WAL records the definition already counts as applied are dropped,
    /// so a crash between saving the definition and resetting the WAL does
    /// not apply them twice.
    pub fn from_meta(meta: IndexMeta, ctx: Arc<IndexContext>) -> Result<Self> {
        check_index_name(&meta.name)?;
        if meta.shards.is_empty() {
            return Err(QuarryError::MetadataError(format!(
                "index [{}] definition has no shards",
                meta.name
            )));
        }

        let mut wal = Wal::open(
            &ctx.config.storage.index_wal_dir(&meta.name),
            ctx.config.wal.sync_on_write,
        )?;
        let stale = wal.discard_applied(meta.wal_applied_seq)?;
        if stale > 0 {
            tracing::warn!(
                "Index '{}' dropped {} WAL entries already applied to a shard",
                meta.name,
                stale
            );
        }
        let wal_size = pending_wal_entries(wal.len()?);
        if wal_size > 0 {
            tracing::info!(
                "Index '{}' has {} unapplied WAL entries",
                meta.name,
                wal_size
            );
        }

        Ok(Self {
            name: meta.name,
            storage_type: meta.storage_type,
            create_at: meta.create_at,
            state: Mutex::new(IndexState {
                shard_num: meta.shard_num,
                shards: meta.shards,
                wal_applied_seq: meta.wal_applied_seq,
                settings: meta.settings,
                mappings: meta.mappings,
                analyzers: meta.analyzers,
                update_at: meta.update_at,
                wal_size,
                wal,
                committed_seq: meta.wal_applied_seq,
                writer: None,
                closed: false,
            }),
            ctx,
            last_access: AtomicI64::new(Utc::now().timestamp_millis()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    pub fn create_at(&self) -> DateTime<Utc> {
        self.create_at
    }

    pub fn update_at(&self) -> DateTime<Utc> {
        self.state.lock().update_at
    }

    pub fn shard_num(&self) -> u64 {
        self.state.lock().shard_num
    }

    pub fn shards(&self) -> Vec<IndexShard> {
        self.state.lock().shards.clone()
    }

    pub fn settings(&self) -> Option<IndexSettings> {
        self.state.lock().settings.clone()
    }

    pub fn mappings(&self) -> Option<Mappings> {
        self.state.lock().mappings.clone()
    }

    pub fn analyzers(&self) -> Option<BTreeMap<String, AnalyzerSpec>> {
        self.state.lock().analyzers.clone()
    }

    /// Cached WAL size as of the last refresh
    pub fn wal_size(&self) -> u64 {
        self.state.lock().wal_size
    }

    /// Re-read the WAL length and update the cached size
    pub fn refresh_wal_size(&self) -> Result<u64> {
        let mut state = self.state.lock();
        let size = pending_wal_entries(state.wal.len()?);
        state.wal_size = size;
        Ok(size)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Persisted definition of this index
    pub fn meta(&self) -> IndexMeta {
        let state = self.state.lock();
        self.meta_locked(&state)
    }

    /// Summary with shard totals and the cached WAL size
    pub fn stat(&self) -> IndexStat {
        let state = self.state.lock();
        IndexStat {
            name: self.name.clone(),
            storage_type: self.storage_type,
            shard_num: state.shard_num,
            doc_num: state.shards.iter().map(|s| s.doc_num).sum(),
            storage_size: state.shards.iter().map(|s| s.storage_size).sum(),
            wal_size: state.wal_size,
            create_at: self.create_at,
            update_at: state.update_at,
        }
    }

    /// Define (or replace) a named analyzer
    pub fn set_analyzer(&self, name: &str, spec: AnalyzerSpec) -> Result<()> {
        let mut state = self.lock_open()?;
        self.update_meta_locked(&mut state, |meta| {
            meta.analyzers
                .get_or_insert_with(BTreeMap::new)
                .insert(name.to_string(), spec);
        })
    }

    /// Replace the index settings
    pub fn set_settings(&self, settings: IndexSettings) -> Result<()> {
        let mut state = self.lock_open()?;
        self.update_meta_locked(&mut state, |meta| meta.settings = Some(settings))
    }

    /// Persist the definition to the metadata store
    ///
    /// Unset settings, analyzers and mappings are initialized first; fresh
    /// mappings always carry the reserved time field.
    pub fn store(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.update_meta_locked(&mut state, |_| {})
    }

    /// Save an edited copy of the definition, then adopt it
    ///
    /// The in-memory state only changes once the metadata store accepted
    /// the write, so a failed save leaves the index as it was.
    fn update_meta_locked(
        &self,
        state: &mut IndexState,
        change: impl FnOnce(&mut IndexMeta),
    ) -> Result<()> {
        let mut meta = self.meta_locked(state);
        meta.settings.get_or_insert_with(IndexSettings::default);
        meta.analyzers.get_or_insert_with(BTreeMap::new);
        meta.mappings.get_or_insert_with(Mappings::with_time_field);
        change(&mut meta);
        meta.update_at = Utc::now();

        let persist_err = |message: String| QuarryError::PersistenceError {
            index: self.name.clone(),
            message,
        };
        let bytes = serde_json::to_vec_pretty(&meta).map_err(|e| persist_err(e.to_string()))?;
        self.ctx
            .metadata
            .set(&index_key(&self.name), &bytes)
            .map_err(|e| persist_err(e.message()))?;

        state.shard_num = meta.shard_num;
        state.shards = meta.shards;
        state.wal_applied_seq = meta.wal_applied_seq;
        state.settings = meta.settings;
        state.mappings = meta.mappings;
        state.analyzers = meta.analyzers;
        state.update_at = meta.update_at;
        Ok(())
    }

    fn meta_locked(&self, state: &IndexState) -> IndexMeta {
        IndexMeta {
            name: self.name.clone(),
            storage_type: self.storage_type,
            shard_num: state.shard_num,
            shards: state.shards.clone(),
            wal_applied_seq: state.wal_applied_seq,
            settings: state.settings.clone(),
            mappings: state.mappings.clone(),
            analyzers: state.analyzers.clone(),
            create_at: self.create_at,
            update_at: state.update_at,
        }
    }

    fn lock_open(&self) -> Result<MutexGuard<'_, IndexState>> {
        let state = self.state.lock();
        if state.closed {
            return Err(QuarryError::IndexClosed(self.name.clone()));
        }
        Ok(state)
    }

    /// Append a document write to the WAL
    ///
    /// An empty `doc_id` gets a generated id. The document is stamped with
    /// the reserved time field when missing and checked against the
    /// mappings; newly seen fields are mapped and persisted before the
    /// append. Returns the document id.
    pub fn create_document(&self, doc_id: &str, document: Document, upsert: bool) -> Result<String> {
        let mut state = self.lock_open()?;

        let id = if doc_id.is_empty() {
            Ulid::new().to_string()
        } else {
            doc_id.to_string()
        };

        let mut doc = document;
        doc.ensure_timestamp(Utc::now());

        let mappings = state.mappings.get_or_insert_with(Mappings::with_time_field);
        let inferred = doc.validate(mappings)?;
        if !inferred.is_empty() {
            self.update_meta_locked(&mut state, |meta| {
                let mappings = meta.mappings.get_or_insert_with(Mappings::with_time_field);
                for (field, field_type) in &inferred {
                    mappings.set_property(field, Property::new(*field_type));
                }
            })?;
            tracing::debug!(
                "Index '{}' mapped {} new field(s)",
                self.name,
                inferred.len()
            );
        }

        state.wal.append(&id, &doc, upsert)?;
        state.wal_size = pending_wal_entries(state.wal.len()?);
        self.touch();

        Ok(id)
    }

    /// Resolve open parameters for one of this index's shards
    fn open_config(&self, state: &IndexState, shard_id: u64) -> Result<OpenConfig> {
        let analyzer = match state
            .settings
            .as_ref()
            .and_then(|s| s.default_search_analyzer.as_deref())
        {
            Some(analyzer_name) => Some(
                state
                    .analyzers
                    .as_ref()
                    .and_then(|a| a.get(analyzer_name))
                    .ok_or_else(|| {
                        QuarryError::ConfigError(format!(
                            "index [{}] default search analyzer [{analyzer_name}] is not defined",
                            self.name
                        ))
                    })?,
            ),
            None => None,
        };

        self.ctx.resolver.resolve(
            self.storage_type,
            &shard_location(&self.name, shard_id),
            analyzer,
            None,
        )
    }

    /// Close the active shard writer and the WAL
    ///
    /// Both are closed even when the first one fails; the first error is
    /// returned. Unapplied WAL entries stay on disk. Closing twice is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        let writer_result = match state.writer.take() {
            Some(mut writer) => writer.close(),
            None => Ok(()),
        };
        let wal_result = state.wal.close();

        tracing::debug!("Index '{}' closed", self.name);
        writer_result.and(wal_result)
    }

    /// Record a lookup or write for idle tracking
    pub(crate) fn touch(&self) {
        self.last_access
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Milliseconds since the last lookup or write
    pub(crate) fn idle_millis(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis() - self.last_access.load(Ordering::Relaxed)
    }
}
