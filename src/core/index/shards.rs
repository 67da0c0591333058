//! Shard lifecycle: applying the WAL to the active shard and rolling
//! over to a new shard once the active one grows past the size limit.
//!
//! Shard size is the cumulative serialized size of the documents
//! applied to it, so rollover is deterministic and independent of
//! engine segment merges.

use super::{Index, IndexState};
use crate::core::error::{QuarryError, Result};
use crate::core::storage::ShardWriter;
use crate::core::types::IndexShard;
use crate::core::wal::{PendingWrite, EMPTY_WAL_LEN};

impl Index {
    /// Apply pending WAL entries to the active shard
    ///
    /// Entries are committed to the shard, then the shard stats and the
    /// last applied WAL sequence are saved, then the WAL is reset. When
    /// the save fails the WAL is kept and the stats stay unchanged; the
    /// next flush counts the same entries again without re-adding them to
    /// the shard. Once the definition is saved, reopening the index skips
    /// those entries even if the WAL reset never happened. Returns the
    /// number of documents applied.
    pub fn flush(&self) -> Result<usize> {
        let mut state = self.lock_open()?;
        self.flush_locked(&mut state)
    }

    fn flush_locked(&self, state: &mut IndexState) -> Result<usize> {
        let applied_seq = state.wal_applied_seq;
        let pending: Vec<PendingWrite> = state
            .wal
            .pending()?
            .into_iter()
            .filter(|write| write.seq >= applied_seq)
            .collect();
        if pending.is_empty() {
            if state.wal.len()? > EMPTY_WAL_LEN {
                // applied entries left by a reset that failed last time
                state.wal.reset()?;
                state.wal_size = 0;
            }
            return Ok(0);
        }

        let count = pending.len();
        let next_applied = pending.last().map_or(applied_seq, |write| write.seq + 1);
        let bytes = pending
            .iter()
            .map(|write| write.doc.encoded_len())
            .sum::<Result<u64>>()?;

        // entries committed by a flush whose save failed are not re-added
        let committed_seq = state.committed_seq;
        let uncommitted: Vec<&PendingWrite> = pending
            .iter()
            .filter(|write| write.seq >= committed_seq)
            .collect();
        if !uncommitted.is_empty() {
            self.ensure_writer(state)?;
            let applied = match state.writer.as_mut() {
                Some(writer) => apply_pending(writer.as_mut(), &uncommitted),
                None => Err(QuarryError::StorageError(
                    "active shard writer missing".to_string(),
                )),
            };

            if let Err(e) = applied {
                // drop the writer so staged documents are discarded; the
                // next flush reopens it and replays the uncommitted entries
                if let Some(mut writer) = state.writer.take() {
                    if let Err(close_err) = writer.close() {
                        tracing::warn!(
                            "Index '{}' failed to discard shard writer: {}",
                            self.name,
                            close_err
                        );
                    }
                }
                return Err(e);
            }
            state.committed_seq = next_applied;
        }

        self.update_meta_locked(state, |meta| {
            if let Some(shard) = meta.shards.last_mut() {
                shard.doc_num += count as u64;
                shard.storage_size += bytes;
            }
            meta.wal_applied_seq = next_applied;
        })?;

        state.wal.reset()?;
        state.wal_size = 0;

        tracing::debug!(
            "Index '{}' applied {} document(s), {} bytes",
            self.name,
            count,
            bytes
        );
        Ok(count)
    }

    /// Open the active shard's writer if it is not open yet
    fn ensure_writer(&self, state: &mut IndexState) -> Result<()> {
        if state.writer.is_some() {
            return Ok(());
        }

        let shard_id = state.active_shard()?.id;
        let config = self.open_config(state, shard_id)?;
        let writer = self
            .ctx
            .engine
            .open_writer(&config)
            .map_err(|e| QuarryError::ShardError {
                index: self.name.clone(),
                shard: shard_id,
                message: e.message(),
            })?;
        state.writer = Some(writer);
        Ok(())
    }

    /// Roll over to a new shard when the active one is too big
    ///
    /// Pending WAL entries are applied first so they land in the shard
    /// they were accounted to. Below the configured maximum this is a
    /// no-op. Otherwise the next shard's writer is opened and the
    /// definition with the new shard appended is saved; only then is the
    /// active shard sealed and the new shard adopted. If the writer cannot
    /// be opened or the definition cannot be saved, the shard sequence and
    /// the active writer are left unchanged.
    pub fn check_shards(&self) -> Result<()> {
        let mut state = self.lock_open()?;
        self.flush_locked(&mut state)?;

        let max_size = self.ctx.config.shard.max_size;
        let active = state.active_shard()?;
        if active.storage_size <= max_size {
            return Ok(());
        }

        let sealed_id = active.id;
        let sealed_size = active.storage_size;
        let next_id = sealed_id + 1;

        let config = self.open_config(&state, next_id)?;
        let writer = self
            .ctx
            .engine
            .open_writer(&config)
            .map_err(|e| QuarryError::ShardError {
                index: self.name.clone(),
                shard: next_id,
                message: e.message(),
            })?;

        let saved = self.update_meta_locked(&mut state, |meta| {
            meta.shards.push(IndexShard::new(next_id));
            meta.shard_num += 1;
        });
        if let Err(e) = saved {
            close_writer(&self.name, next_id, Some(writer));
            return Err(e);
        }

        close_writer(&self.name, sealed_id, state.writer.replace(writer));

        tracing::info!(
            "Index '{}' sealed shard {} at {} bytes, opened shard {}",
            self.name,
            sealed_id,
            sealed_size,
            next_id
        );
        Ok(())
    }
}

/// Stage every pending write, then commit
fn apply_pending(writer: &mut dyn ShardWriter, pending: &[&PendingWrite]) -> Result<()> {
    for write in pending {
        writer.add_document(&write.id, &write.doc, write.upsert)?;
    }
    writer.commit()
}

/// Close a shard writer that is no longer active; its data is committed
fn close_writer(index: &str, shard_id: u64, writer: Option<Box<dyn ShardWriter>>) {
    if let Some(mut writer) = writer {
        if let Err(e) = writer.close() {
            tracing::warn!(
                "Index '{}' failed to close writer of shard {}: {}",
                index,
                shard_id,
                e
            );
        }
    }
}
