//! Engine Module
//!
//! Adapts the flat key-value contract onto bucketed redb tables.
//!
//! ## Responsibilities
//! - Open the database file (permissions, read-only, lock wait)
//! - Own the swappable database handle
//! - Run every public operation inside exactly one transaction
//! - Raw CRUD: get / set / remove / read-modify-write

use std::fs::{self, OpenOptions};
use std::io;
use std::ops::ControlFlow;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use redb::{
    Builder, Database, DatabaseError, Durability, ReadTransaction, ReadableTable, WriteTransaction,
};
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::{Config, LockWait};
use crate::entry::RawEntry;
use crate::error::{BucketKvError, Result};
use crate::storage;
use crate::traits::RawStorage;

/// Poll interval while waiting for another handle to release the file lock
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// The storage engine
///
/// ## Concurrency Model
///
/// The adapter adds no locking of its own around data: redb serializes write
/// transactions and gives each read transaction a snapshot.
///
/// - `handle` is only write-locked by restore / drop-all / close, which swap
///   the database out. Every other operation holds a read guard for its whole
///   duration, so it can never observe a half-closed database.
/// - Do not call into the same engine from an enumeration visitor; a pending
///   restore would deadlock against the visitor's own read guard.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Current database, `None` once closed
    handle: RwLock<Option<Database>>,
}

impl Engine {
    /// Open or create the database described by `config`
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let db = open_database(&config)?;

        info!(
            name = %config.name,
            path = %config.path.display(),
            read_only = config.read_only,
            "database opened"
        );

        Ok(Self {
            config,
            handle: RwLock::new(Some(db)),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data file
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().path(path).build())
    }

    /// Wrap a database the caller already opened
    ///
    /// `config.path` must name the file `db` was opened from: restore and
    /// drop-all reopen it from there. The open-time options (file mode, lock
    /// wait, cache size) are only used by those reopens.
    pub fn from_database(config: Config, db: Database) -> Result<Self> {
        config.validate()?;

        info!(
            name = %config.name,
            path = %config.path.display(),
            read_only = config.read_only,
            "database attached"
        );

        Ok(Self {
            config,
            handle: RwLock::new(Some(db)),
        })
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Read guard over the current database
    pub(crate) fn database(&self) -> Result<MappedRwLockReadGuard<'_, Database>> {
        RwLockReadGuard::try_map(self.handle.read(), Option::as_ref)
            .map_err(|_| BucketKvError::Closed)
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.config.read_only {
            return Err(BucketKvError::ReadOnly);
        }
        Ok(())
    }

    /// Run `f` inside a read transaction
    pub(crate) fn view<T>(&self, f: impl FnOnce(&ReadTransaction) -> Result<T>) -> Result<T> {
        let db = self.database()?;
        let txn = db.begin_read()?;
        f(&txn)
    }

    /// Run `f` inside a write transaction, committing on `Ok` and rolling
    /// back on `Err`
    pub(crate) fn update<T>(&self, f: impl FnOnce(&WriteTransaction) -> Result<T>) -> Result<T> {
        self.ensure_writable()?;

        let db = self.database()?;
        let mut txn = db.begin_write()?;
        if !self.config.sync_writes {
            txn.set_durability(Durability::Eventual);
        }

        let outcome = f(&txn).and_then(|out| {
            storage::bump_sequence(&txn)?;
            Ok(out)
        });

        match outcome {
            Ok(out) => {
                txn.commit()?;
                Ok(out)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    warn!(error = %abort_err, "failed to abort write transaction");
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // Raw CRUD
    // =========================================================================

    /// Get a value by flat key
    ///
    /// A missing bucket reads as a missing key. With `required`, a miss is
    /// `KeyNotFound` instead of `Ok(None)`.
    pub fn get(&self, key: &[u8], required: bool) -> Result<Option<Vec<u8>>> {
        let (bucket, local) = codec::split(key);

        let value = self.view(|txn| {
            let Some(table) = storage::open_bucket(txn, bucket)? else {
                return Ok(None);
            };
            Ok(table.get(local)?.map(|v| v.value().to_vec()))
        })?;

        if value.is_none() && required {
            return Err(BucketKvError::KeyNotFound);
        }
        Ok(value)
    }

    /// Put a value, creating its bucket on first use
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let (bucket, local) = codec::split(key);

        self.update(|txn| {
            let mut table = storage::create_bucket_if_not_exists(txn, bucket)?;
            table.insert(local, value)?;
            Ok(())
        })
    }

    /// Delete a key. Deleting a missing key is not an error.
    ///
    /// Like `set`, this creates the bucket if it does not exist yet.
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        let (bucket, local) = codec::split(key);

        self.update(|txn| {
            let mut table = storage::create_bucket_if_not_exists(txn, bucket)?;
            table.remove(local)?;
            Ok(())
        })
    }

    /// Atomic read-modify-write of one key
    ///
    /// `mutator` sees the current value (`None` if absent). Returning
    /// `Break` fails the call with `Canceled` and rolls everything back.
    /// On `Continue` the entry's value is written back: `Some` upserts,
    /// `None` removes the key.
    pub fn do_in_transaction<F>(&self, key: &[u8], mutator: F) -> Result<()>
    where
        F: FnOnce(&mut RawEntry) -> ControlFlow<()>,
    {
        let (bucket, local) = codec::split(key);

        self.update(|txn| {
            let mut table = storage::create_bucket_if_not_exists(txn, bucket)?;
            let current = table.get(local)?.map(|v| v.value().to_vec());

            let mut entry = RawEntry::new(key.to_vec(), current);
            if mutator(&mut entry).is_break() {
                debug!(key = %String::from_utf8_lossy(key), "transaction canceled by mutator");
                return Err(BucketKvError::Canceled);
            }

            match entry.value {
                Some(value) => {
                    table.insert(local, value.as_slice())?;
                }
                None => {
                    table.remove(local)?;
                }
            }
            Ok(())
        })
    }

    /// Versioned set, degraded to an unconditional `set`
    ///
    /// redb keeps no versions, so `version` is ignored and the call always
    /// reports success. Callers that need a real conditional update should
    /// use [`Engine::compare_and_swap`].
    pub fn compare_and_set(&self, key: &[u8], value: &[u8], _version: i64) -> Result<bool> {
        self.set(key, value)?;
        Ok(true)
    }

    /// Conditional update: write `new` only if the current value equals
    /// `expected` (`None` = key absent). Returns whether the write happened.
    pub fn compare_and_swap(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool> {
        let outcome = self.do_in_transaction(key, |entry| {
            if entry.value.as_deref() != expected {
                return ControlFlow::Break(());
            }
            entry.value = Some(new.to_vec());
            ControlFlow::Continue(())
        });

        match outcome {
            Ok(()) => Ok(true),
            Err(BucketKvError::Canceled) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Atomically add `delta` to a counter and return the new value
    ///
    /// Counters are stored as 8-byte big-endian `i64`. A missing key starts
    /// at `initial`.
    pub fn increment(&self, key: &[u8], initial: i64, delta: i64) -> Result<i64> {
        let mut invalid_len = None;
        let mut updated = initial;

        let outcome = self.do_in_transaction(key, |entry| {
            let current = match entry.value.as_deref() {
                None => initial,
                Some(bytes) => match <[u8; 8]>::try_from(bytes) {
                    Ok(raw) => i64::from_be_bytes(raw),
                    Err(_) => {
                        invalid_len = Some(bytes.len());
                        return ControlFlow::Break(());
                    }
                },
            };
            updated = current.wrapping_add(delta);
            entry.value = Some(updated.to_be_bytes().to_vec());
            ControlFlow::Continue(())
        });

        match (outcome, invalid_len) {
            (Ok(()), _) => Ok(updated),
            (Err(BucketKvError::Canceled), Some(len)) => {
                Err(BucketKvError::InvalidCounter { len })
            }
            (Err(e), _) => Err(e),
        }
    }

    /// Names of all buckets, ascending
    pub fn buckets(&self) -> Result<Vec<Vec<u8>>> {
        self.view(storage::list_buckets)
    }

    // =========================================================================
    // Handle Management
    // =========================================================================

    /// Swap the database out under the write lock
    ///
    /// `reopen` runs with the old database already closed. If it fails the
    /// handle stays closed and later calls fail with `Closed`.
    pub(crate) fn replace_database<F>(&self, reopen: F) -> Result<()>
    where
        F: FnOnce(&Config) -> Result<Database>,
    {
        let mut handle = self.handle.write();
        if let Some(db) = handle.take() {
            drop(db);
            debug!(name = %self.config.name, "database closed for replacement");
        }
        *handle = Some(reopen(&self.config)?);
        Ok(())
    }

    /// Close the database. Later operations fail with `Closed`.
    pub fn close(&self) -> Result<()> {
        if self.handle.write().take().is_some() {
            info!(name = %self.config.name, "database closed");
        }
        Ok(())
    }

    /// Escape hatch: the underlying redb database, for operations this
    /// adapter does not cover. Hold the guard briefly; restore and drop-all
    /// wait for it.
    pub fn instance(&self) -> Result<MappedRwLockReadGuard<'_, Database>> {
        self.database()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the storage name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get the data file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

// =============================================================================
// Opening
// =============================================================================

/// Open the database file, waiting for the file lock per `config.lock_wait`
pub(crate) fn open_database(config: &Config) -> Result<Database> {
    if !config.read_only {
        create_data_file(config)?;
    }

    let started = Instant::now();
    let mut waited = false;

    loop {
        match try_open(config) {
            Ok(db) => return Ok(db),
            Err(DatabaseError::DatabaseAlreadyOpen) => {
                let keep_waiting = match config.lock_wait {
                    LockWait::NoWait => false,
                    LockWait::Timeout(timeout) => started.elapsed() < timeout,
                    LockWait::Indefinitely => true,
                };
                if !keep_waiting {
                    return Err(DatabaseError::DatabaseAlreadyOpen.into());
                }
                if !waited {
                    warn!(path = %config.path.display(), "database file is locked, waiting");
                    waited = true;
                }
                thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn try_open(config: &Config) -> std::result::Result<Database, DatabaseError> {
    let mut builder = Builder::new();
    if let Some(bytes) = config.cache_size {
        builder.set_cache_size(bytes);
    }

    if config.read_only {
        builder.open(&config.path)
    } else {
        builder.create(&config.path)
    }
}

/// Create an empty data file with the configured permissions. redb then
/// initializes it in place; an existing file is left alone.
fn create_data_file(config: &Config) -> Result<()> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(config.file_mode);
    }

    match options.open(&config.path) {
        Ok(_) => {
            debug!(
                path = %config.path.display(),
                mode = format_args!("{:o}", config.file_mode),
                "created data file"
            );
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Storage Contract
// =============================================================================

impl RawStorage for Engine {
    fn get_raw(&self, key: &[u8], required: bool) -> Result<Option<RawEntry>> {
        Ok(self
            .get(key, required)?
            .map(|value| RawEntry::new(key.to_vec(), Some(value))))
    }

    fn set_raw(&self, key: &[u8], value: &[u8], _ttl_seconds: u32) -> Result<()> {
        self.set(key, value)
    }

    fn do_in_transaction(
        &self,
        key: &[u8],
        mutator: &mut dyn FnMut(&mut RawEntry) -> ControlFlow<()>,
    ) -> Result<()> {
        Engine::do_in_transaction(self, key, |entry| mutator(entry))
    }

    fn compare_and_set_raw(
        &self,
        key: &[u8],
        value: &[u8],
        _ttl_seconds: u32,
        version: i64,
    ) -> Result<bool> {
        self.compare_and_set(key, value, version)
    }

    fn remove_raw(&self, key: &[u8]) -> Result<()> {
        self.remove(key)
    }

    fn enumerate_raw(
        &self,
        prefix: &[u8],
        seek: &[u8],
        _batch_size: usize,
        only_keys: bool,
        visit: &mut dyn FnMut(&RawEntry) -> ControlFlow<()>,
    ) -> Result<()> {
        self.enumerate(prefix, seek, only_keys, |entry| visit(entry))
    }

    fn fetch_keys_raw(&self, prefix: &[u8], _batch_size: usize) -> Result<Vec<Vec<u8>>> {
        self.fetch_keys(prefix)
    }
}
