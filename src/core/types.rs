//! Core data types for the quarry index layer.
//!
//! This module defines the persisted shape of an index definition
//! (settings, mappings, analyzers, shard descriptors) and the summary
//! view returned by registry listings.

use crate::core::error::QuarryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Reserved system time field, mapped on every index
pub const TIME_FIELD_NAME: &str = "@timestamp";

/// Metadata key holding the running version marker
pub const VERSION_KEY: &str = "kv/version";

/// Metadata namespace for index definitions
pub const INDEX_KEY_PREFIX: &str = "index/";

/// Metadata key of the definition of index `name`
pub fn index_key(name: &str) -> String {
    format!("{INDEX_KEY_PREFIX}{name}")
}

/// Storage backend an index lives on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Disk,
    S3,
    #[serde(rename = "minio")]
    MinIO,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Disk => "disk",
            StorageType::S3 => "s3",
            StorageType::MinIO => "minio",
        }
    }
}

impl FromStr for StorageType {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disk" => Ok(StorageType::Disk),
            "s3" => Ok(StorageType::S3),
            "minio" => Ok(StorageType::MinIO),
            other => Err(QuarryError::InvalidStorageType(format!(
                "[{other}] is not one of disk, s3, minio"
            ))),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional time partition for object-store shard locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start, unix milliseconds
    pub start: i64,
    /// Exclusive end, unix milliseconds
    pub end: i64,
}

/// Field types understood by the mapping layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Keyword,
    Numeric,
    Bool,
    Date,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::Numeric => "numeric",
            FieldType::Bool => "bool",
            FieldType::Date => "date",
        };
        f.write_str(s)
    }
}

/// Mapping entry for a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default = "default_true")]
    pub index: bool,

    #[serde(default)]
    pub store: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Property {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            index: true,
            store: false,
            analyzer: None,
        }
    }
}

/// Field name to property schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mappings {
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
}

impl Mappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mappings seeded with the reserved time field
    pub fn with_time_field() -> Self {
        let mut mappings = Self::new();
        mappings.set_property(TIME_FIELD_NAME, Property::new(FieldType::Date));
        mappings
    }

    pub fn set_property(&mut self, field: &str, property: Property) {
        self.properties.insert(field.to_string(), property);
    }

    pub fn get_property(&self, field: &str) -> Option<&Property> {
        self.properties.get(field)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Text analysis pipeline description, interpreted by the search engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerSpec {
    pub tokenizer: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub token_filters: Vec<String>,
}

impl AnalyzerSpec {
    pub fn new(tokenizer: impl Into<String>) -> Self {
        Self {
            tokenizer: tokenizer.into(),
            token_filters: Vec::new(),
        }
    }
}

/// Index-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default)]
    pub number_of_replicas: u32,

    /// Name of the entry in `analyzers` used as the default search analyzer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_search_analyzer: Option<String>,
}

/// Shard descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexShard {
    pub id: u64,

    /// Documents routed to this shard
    #[serde(default)]
    pub doc_num: u64,

    /// Serialized document bytes routed to this shard
    #[serde(default)]
    pub storage_size: u64,
}

impl IndexShard {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            doc_num: 0,
            storage_size: 0,
        }
    }
}

/// Persisted index definition, stored in the metadata store under its name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub storage_type: StorageType,
    pub shard_num: u64,
    pub shards: Vec<IndexShard>,

    /// WAL records with a lower sequence number are already in a shard
    #[serde(default)]
    pub wal_applied_seq: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<IndexSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings: Option<Mappings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzers: Option<BTreeMap<String, AnalyzerSpec>>,

    pub create_at: DateTime<Utc>,
    pub update_at: DateTime<Utc>,
}

/// Summary of an index returned by registry listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStat {
    pub name: String,
    pub storage_type: StorageType,
    pub shard_num: u64,
    pub doc_num: u64,
    pub storage_size: u64,
    pub wal_size: u64,
    pub create_at: DateTime<Utc>,
    pub update_at: DateTime<Utc>,
}
