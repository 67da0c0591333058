//! Per-index write-ahead log.
//!
//! Every document write is appended here before it is applied to a
//! shard writer. The log is a JSON-lines file whose first record is a
//! marker written when the log is created or reset, so an empty log
//! always holds exactly one record. The marker carries the next sequence
//! number, so sequence numbers keep increasing across resets and reopens.
//!
//! ```text
//! {data_path}/_wal/{index}/
//! └── wal.log        # marker, then one document record per line
//! ```

use crate::core::document::Document;
use crate::core::error::{QuarryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const WAL_FILE: &str = "wal.log";

/// Record count of a log with nothing pending
pub const EMPTY_WAL_LEN: u64 = 1;

/// One line of the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WalRecord {
    Marker {
        created_at: DateTime<Utc>,
        #[serde(default)]
        next_seq: u64,
    },
    Document {
        seq: u64,
        id: String,
        upsert: bool,
        doc: Document,
    },
}

/// A document write waiting to be applied to a shard
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub seq: u64,
    pub id: String,
    pub upsert: bool,
    pub doc: Document,
}

/// Append-only log for a single index
#[derive(Debug)]
pub struct Wal {
    dir: PathBuf,
    file: Option<File>,
    records: u64,
    next_seq: u64,
    sync_on_write: bool,
}

impl Wal {
    /// Open (or create) the log stored in `dir`
    ///
    /// A torn final line left by a crash mid-append is cut off; a bad line
    /// anywhere else is reported as corruption.
    pub fn open(dir: &Path, sync_on_write: bool) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(WAL_FILE);

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let (records, next_seq, valid_len) = scan(&path)?;
        let file_len = file.metadata()?.len();
        if valid_len < file_len {
            tracing::warn!(
                "Truncating torn WAL tail in {:?}: {} of {} bytes valid",
                path,
                valid_len,
                file_len
            );
            file.set_len(valid_len)?;
        }

        let mut wal = Self {
            dir: dir.to_path_buf(),
            file: Some(file),
            records,
            next_seq,
            sync_on_write,
        };

        if wal.records == 0 {
            wal.write_record(&WalRecord::Marker {
                created_at: Utc::now(),
                next_seq,
            })?;
        }

        Ok(wal)
    }

    fn path(&self) -> PathBuf {
        self.dir.join(WAL_FILE)
    }

    fn write_record(&mut self, record: &WalRecord) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| QuarryError::WalError(format!("WAL {:?} is closed", self.dir)))?;

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.flush()?;
        if self.sync_on_write {
            file.sync_data()?;
        }

        self.records += 1;
        Ok(())
    }

    /// Append a document write, returning its sequence number
    pub fn append(&mut self, id: &str, doc: &Document, upsert: bool) -> Result<u64> {
        let seq = self.next_seq;
        self.write_record(&WalRecord::Document {
            seq,
            id: id.to_string(),
            upsert,
            doc: doc.clone(),
        })?;
        self.next_seq += 1;
        tracing::debug!("WAL {:?} appended seq {}", self.dir, seq);
        Ok(seq)
    }

    /// Number of records, including the marker
    pub fn len(&self) -> Result<u64> {
        if self.file.is_none() {
            return Err(QuarryError::WalError(format!(
                "WAL {:?} is closed",
                self.dir
            )));
        }
        Ok(self.records)
    }

    /// Document writes not yet applied to a shard, in append order
    pub fn pending(&self) -> Result<Vec<PendingWrite>> {
        if self.file.is_none() {
            return Err(QuarryError::WalError(format!(
                "WAL {:?} is closed",
                self.dir
            )));
        }

        let reader = BufReader::new(File::open(self.path())?);
        let mut writes = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            if let WalRecord::Document {
                seq,
                id,
                upsert,
                doc,
            } = serde_json::from_str(&line)?
            {
                writes.push(PendingWrite {
                    seq,
                    id,
                    upsert,
                    doc,
                });
            }
        }
        Ok(writes)
    }

    /// Drop every record, leaving a fresh marker
    pub fn reset(&mut self) -> Result<()> {
        self.rewrite(&[])
    }

    /// Drop records with a sequence number below `applied_seq`
    ///
    /// Used on open when a crash hit after those records reached a shard
    /// but before the log was reset. Returns the number of records dropped.
    pub fn discard_applied(&mut self, applied_seq: u64) -> Result<usize> {
        self.next_seq = self.next_seq.max(applied_seq);

        let pending = self.pending()?;
        let stale = pending.iter().filter(|w| w.seq < applied_seq).count();
        if stale == 0 {
            return Ok(0);
        }

        let keep: Vec<PendingWrite> = pending
            .into_iter()
            .filter(|w| w.seq >= applied_seq)
            .collect();
        self.rewrite(&keep)?;
        Ok(stale)
    }

    /// Replace the log with a fresh marker followed by `keep`
    ///
    /// The replacement file is written and synced before it is renamed
    /// over the old log.
    fn rewrite(&mut self, keep: &[PendingWrite]) -> Result<()> {
        if self.file.is_none() {
            return Err(QuarryError::WalError(format!(
                "WAL {:?} is closed",
                self.dir
            )));
        }

        let tmp = self.dir.join(format!("{WAL_FILE}.tmp"));
        {
            let mut out = File::create(&tmp)?;
            let mut lines = serde_json::to_vec(&WalRecord::Marker {
                created_at: Utc::now(),
                next_seq: self.next_seq,
            })?;
            lines.push(b'\n');
            for write in keep {
                lines.extend(serde_json::to_vec(&WalRecord::Document {
                    seq: write.seq,
                    id: write.id.clone(),
                    upsert: write.upsert,
                    doc: write.doc.clone(),
                })?);
                lines.push(b'\n');
            }
            out.write_all(&lines)?;
            out.sync_all()?;
        }
        fs::rename(&tmp, self.path())?;

        self.file = Some(
            OpenOptions::new()
                .read(true)
                .append(true)
                .open(self.path())?,
        );
        self.records = EMPTY_WAL_LEN + keep.len() as u64;
        Ok(())
    }

    /// Flush to disk and release the file handle; closing twice is a no-op
    pub fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }
}

/// Count valid records, find the next sequence number and the byte
/// length of the valid prefix
fn scan(path: &Path) -> Result<(u64, u64, u64)> {
    let contents = fs::read(path)?;
    let mut records = 0u64;
    let mut next_seq = 0u64;
    let mut valid_len = 0u64;
    let mut offset = 0usize;

    while offset < contents.len() {
        let end = contents[offset..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|p| offset + p);

        let (line, line_end, terminated) = match end {
            Some(e) => (&contents[offset..e], e + 1, true),
            None => (&contents[offset..], contents.len(), false),
        };

        match serde_json::from_slice::<WalRecord>(line) {
            Ok(record) if terminated => {
                match record {
                    WalRecord::Document { seq, .. } => next_seq = next_seq.max(seq + 1),
                    WalRecord::Marker {
                        next_seq: marker_seq,
                        ..
                    } => next_seq = next_seq.max(marker_seq),
                }
                records += 1;
                valid_len = line_end as u64;
            }
            _ if line_end == contents.len() => {
                // torn tail from an interrupted append
                break;
            }
            _ => {
                return Err(QuarryError::WalError(format!(
                    "corrupted record at byte {offset} in {path:?}"
                )));
            }
        }

        offset = line_end;
    }

    Ok((records, next_seq, valid_len))
}
