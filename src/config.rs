//! Configuration for bucketkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BucketKvError, Result};

/// Main configuration for a bucketkv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------
    /// Name of this storage instance (used in logs, must be non-empty)
    pub name: String,

    // -------------------------------------------------------------------------
    // File Configuration
    // -------------------------------------------------------------------------
    /// Path of the single database file holding every bucket
    pub path: PathBuf,

    /// Permission bits applied when the data file is created (unix only)
    pub file_mode: u32,

    /// Open without write access. The file must already exist, and the
    /// handle still holds the file lock exclusively.
    pub read_only: bool,

    /// What to do when another handle holds the file lock
    pub lock_wait: LockWait,

    // -------------------------------------------------------------------------
    // Engine Configuration
    // -------------------------------------------------------------------------
    /// Page cache size in bytes (None = engine default)
    pub cache_size: Option<usize>,

    /// fsync on every commit. `false` trades durability of the most recent
    /// commits for write throughput.
    pub sync_writes: bool,
}

/// File lock acquisition policy at open time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockWait {
    /// Fail immediately if the file is locked
    NoWait,

    /// Retry until the timeout elapses
    Timeout(Duration),

    /// Retry until the lock is released
    Indefinitely,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "bucketkv".to_string(),
            path: PathBuf::from("./bucketkv.redb"),
            file_mode: 0o666,
            read_only: false,
            lock_wait: LockWait::NoWait,
            cache_size: None,
            sync_writes: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check field constraints. Called by `Engine::open`.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(BucketKvError::Config("empty storage name".to_string()));
        }
        if self.path.as_os_str().is_empty() {
            return Err(BucketKvError::Config("empty database path".to_string()));
        }
        if self.cache_size == Some(0) {
            return Err(BucketKvError::Config(
                "cache size must be greater than zero".to_string(),
            ));
        }
        if self.lock_wait == LockWait::Timeout(Duration::ZERO) {
            return Err(BucketKvError::Config(
                "lock timeout must be greater than zero, use LockWait::NoWait instead".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the storage name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the database file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the permission bits for a newly created data file
    pub fn file_mode(mut self, mode: u32) -> Self {
        self.config.file_mode = mode;
        self
    }

    /// Open the database read-only
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Wait at most `timeout` for the file lock
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_wait = LockWait::Timeout(timeout);
        self
    }

    /// Set the file lock policy
    pub fn lock_wait(mut self, wait: LockWait) -> Self {
        self.config.lock_wait = wait;
        self
    }

    /// Set the page cache size (in bytes)
    pub fn cache_size(mut self, bytes: usize) -> Self {
        self.config.cache_size = Some(bytes);
        self
    }

    /// Enable or disable fsync on commit
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.config.sync_writes = sync;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
