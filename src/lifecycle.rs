//! Lifecycle and maintenance operations
//!
//! Backup / restore / drop-all replace or serialize the whole file;
//! drop-with-prefix empties one bucket; compact is a no-op.
//!
//! Restore and drop-all close the live database and reopen it. That
//! sequence is not transactional: if the reopen fails, the engine stays
//! closed and every call returns `Closed`. Callers must serialize them
//! against their own use of the engine.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use redb::ReadableTable;
use tracing::{debug, info};

use crate::codec;
use crate::config::{Config, LockWait};
use crate::engine::{open_database, Engine};
use crate::error::{BucketKvError, Result};
use crate::storage::snapshot::{SnapshotReader, SnapshotRecord, SnapshotStats, SnapshotWriter};
use crate::storage::{self, WriteBucket};
use crate::traits::ManagedStorage;

/// Suffix of the file a restore is staged into before it replaces the data file
const STAGING_SUFFIX: &str = ".restore";

impl Engine {
    /// Write a consistent snapshot of every bucket to `writer`
    ///
    /// Returns the commit sequence the snapshot reflects. `since` is accepted
    /// for compatibility with incremental backends; the snapshot is always
    /// complete.
    ///
    /// Each entry is one frame capped at 256 MiB. A larger key/value pair
    /// fails the backup with `Snapshot` partway through the stream, so the
    /// bytes already written to `writer` must be discarded.
    pub fn backup<W: Write>(&self, writer: W, _since: u64) -> Result<u64> {
        let stats = self.view(|txn| {
            let mut snapshot = SnapshotWriter::new(writer, storage::read_sequence(txn)?)?;

            for bucket in storage::list_buckets(txn)? {
                let Some(table) = storage::open_bucket(txn, &bucket)? else {
                    continue;
                };
                snapshot.bucket(&bucket)?;
                for item in table.iter()? {
                    let (key, value) = item?;
                    snapshot.entry(key.value(), value.value())?;
                }
            }

            snapshot.finish()
        })?;

        info!(
            name = %self.name(),
            sequence = stats.sequence,
            buckets = stats.buckets,
            entries = stats.entries,
            "backup complete"
        );
        Ok(stats.sequence)
    }

    /// Replace the whole store with a snapshot written by [`Engine::backup`]
    ///
    /// The stream is loaded into a staging file first; a malformed stream
    /// fails here and leaves the live database untouched. Only then is the
    /// live database closed, the staging file moved over it, and the file
    /// reopened read-write.
    pub fn restore<R: Read>(&self, reader: R) -> Result<()> {
        self.ensure_writable()?;

        let staging = staging_path(self.path());
        remove_if_exists(&staging)?;

        let stats = match load_snapshot(&staging, reader, self.config()) {
            Ok(stats) => stats,
            Err(e) => {
                if let Err(cleanup_err) = remove_if_exists(&staging) {
                    debug!(error = %cleanup_err, "failed to remove staging file");
                }
                return Err(e);
            }
        };
        debug!(staging = %staging.display(), "snapshot staged");

        self.replace_database(|config| {
            fs::rename(&staging, &config.path)?;
            let mut config = config.clone();
            config.read_only = false;
            open_database(&config)
        })?;

        info!(
            name = %self.name(),
            sequence = stats.sequence,
            buckets = stats.buckets,
            entries = stats.entries,
            "restore complete"
        );
        Ok(())
    }

    /// Delete the data file and start over with an empty one
    pub fn drop_all(&self) -> Result<()> {
        self.ensure_writable()?;

        self.replace_database(|config| {
            remove_if_exists(&config.path)?;
            open_database(config)
        })?;

        info!(name = %self.name(), "all buckets dropped");
        Ok(())
    }

    /// Delete every key of the bucket `prefix` resolves to
    ///
    /// Only the bucket part of `prefix` matters. The bucket itself stays,
    /// empty; a missing bucket is not created.
    pub fn drop_with_prefix(&self, prefix: &[u8]) -> Result<()> {
        let (bucket, _) = codec::split(prefix);

        let existed = self.update(|txn| storage::clear_bucket(txn, bucket))?;

        debug!(
            bucket = %String::from_utf8_lossy(bucket),
            existed,
            "bucket cleared"
        );
        Ok(())
    }

    /// No-op: redb has no online compaction primitive to drive here
    pub fn compact(&self, _discard_ratio: f64) -> Result<()> {
        debug!(name = %self.name(), "compact requested, nothing to do");
        Ok(())
    }
}

/// Build a fresh database at `staging` from a snapshot stream
fn load_snapshot<R: Read>(staging: &Path, reader: R, config: &Config) -> Result<SnapshotStats> {
    let mut snapshot = SnapshotReader::new(reader)?;

    let staging_config = Config {
        path: staging.to_path_buf(),
        read_only: false,
        lock_wait: LockWait::NoWait,
        ..config.clone()
    };
    let db = open_database(&staging_config)?;

    let txn = db.begin_write()?;
    {
        let mut current: Option<WriteBucket<'_>> = None;

        while let Some(record) = snapshot.next_record()? {
            match record {
                SnapshotRecord::Bucket { name } => {
                    drop(current.take());
                    current = Some(storage::create_bucket_if_not_exists(&txn, &name)?);
                }
                SnapshotRecord::Entry { key, value } => {
                    let table = current.as_mut().ok_or_else(|| {
                        BucketKvError::Snapshot("entry before any bucket".to_string())
                    })?;
                    table.insert(&*key, &*value)?;
                }
                SnapshotRecord::End { .. } => {}
            }
        }
    }
    storage::write_sequence(&txn, snapshot.sequence())?;
    txn.commit()?;

    Ok(snapshot.stats())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Storage Contract
// =============================================================================

impl ManagedStorage for Engine {
    fn name(&self) -> &str {
        Engine::name(self)
    }

    fn compact(&self, discard_ratio: f64) -> Result<()> {
        Engine::compact(self, discard_ratio)
    }

    fn backup(&self, writer: &mut dyn Write, since: u64) -> Result<u64> {
        Engine::backup(self, writer, since)
    }

    fn restore(&self, reader: &mut dyn Read) -> Result<()> {
        Engine::restore(self, reader)
    }

    fn drop_all(&self) -> Result<()> {
        Engine::drop_all(self)
    }

    fn drop_with_prefix(&self, prefix: &[u8]) -> Result<()> {
        Engine::drop_with_prefix(self, prefix)
    }

    fn close(&self) -> Result<()> {
        Engine::close(self)
    }
}
