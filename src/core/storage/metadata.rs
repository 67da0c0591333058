//! Durable key/value persistence for index definitions.
//!
//! Keys are namespaced: index definitions live under `index/{name}` and
//! store-level values such as the version marker under `kv/{key}`.

use crate::core::error::{QuarryError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Key/value store holding index definitions
pub trait MetadataStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Removing a missing key is not an error
    fn delete(&self, key: &str) -> Result<()>;

    /// Every key with its value, ordered by key
    fn list(&self) -> Result<Vec<(String, Vec<u8>)>>;

    /// Entries whose key starts with `prefix`, with the prefix stripped
    fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .list()?
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(prefix)
                    .map(|rest| (rest.to_string(), value))
            })
            .collect())
    }
}

/// One JSON file per key, one directory per namespace
///
/// ```text
/// {data_path}/_metadata/
/// ├── kv/version.json
/// └── index/{index-name}.json
/// ```
///
/// File names are escaped so that every key maps to a plain file: `%`,
/// path separators and a leading `.` are percent-encoded.
#[derive(Debug, Clone)]
pub struct FileMetadataStore {
    dir: PathBuf,
}

impl FileMetadataStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    /// Directory and file name a key is stored under
    fn key_location(&self, key: &str) -> Result<(PathBuf, String)> {
        let (dir, name) = match key.split_once('/') {
            Some((namespace, name)) => {
                if namespace.is_empty() {
                    return Err(invalid_key(key));
                }
                (self.dir.join(encode_segment(namespace)), name)
            }
            None => (self.dir.clone(), key),
        };
        if name.is_empty() {
            return Err(invalid_key(key));
        }
        Ok((dir, format!("{}.json", encode_segment(name))))
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        let (dir, file) = self.key_location(key)?;
        Ok(dir.join(file))
    }
}

fn invalid_key(key: &str) -> QuarryError {
    QuarryError::MetadataError(format!("invalid metadata key '{key}'"))
}

/// Escape a key segment into a file name that is never hidden and never
/// a path component like `.` or `..`
fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for (i, c) in segment.char_indices() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            '.' if i == 0 => out.push_str("%2E"),
            _ => out.push(c),
        }
    }
    out
}

fn decode_segment(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Decoded keys of the `*.json` files directly under `dir`
fn read_entries(dir: &Path, namespace: Option<&str>) -> Result<Vec<(String, Vec<u8>)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        // temp files from an interrupted write
        if name.starts_with('.') {
            continue;
        }
        let Some(key) = name.strip_suffix(".json").and_then(decode_segment) else {
            continue;
        };
        let key = match namespace {
            Some(namespace) => format!("{namespace}/{key}"),
            None => key,
        };
        entries.push((key, fs::read(entry.path())?));
    }
    Ok(entries)
}

impl MetadataStore for FileMetadataStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let (dir, file) = self.key_location(key)?;
        fs::create_dir_all(&dir)?;
        let tmp = dir.join(format!(".{file}.tmp"));

        // write-then-rename so readers never see a partial definition
        let mut out = fs::File::create(&tmp)?;
        out.write_all(value)?;
        out.sync_all()?;
        fs::rename(&tmp, dir.join(file))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut entries = read_entries(&self.dir, None)?;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dir_name = entry.file_name();
            let Some(namespace) = dir_name.to_str().and_then(decode_segment) else {
                continue;
            };
            entries.extend(read_entries(&entry.path(), Some(&namespace))?);
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

/// In-process store, for tests and ephemeral registries
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn list(&self) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
