//! Storage contract exposed to higher layers
//!
//! Operation builders, CLIs, and config layers talk to storage through these
//! object-safe traits so that a bucketed backend can be swapped for another
//! backend. Parameters some backends honour (ttl, version, batch size,
//! backup watermark, discard ratio) are part of the signatures even where
//! this backend ignores them.

use std::io::{Read, Write};
use std::ops::ControlFlow;

use crate::entry::RawEntry;
use crate::error::Result;

/// Byte-level CRUD and enumeration
pub trait RawStorage: Send + Sync {
    /// Read a flat key. `required` turns a miss into `KeyNotFound`.
    fn get_raw(&self, key: &[u8], required: bool) -> Result<Option<RawEntry>>;

    /// Upsert a flat key
    fn set_raw(&self, key: &[u8], value: &[u8], ttl_seconds: u32) -> Result<()>;

    /// Atomic read-modify-write of one key. `Break` cancels and rolls back.
    fn do_in_transaction(
        &self,
        key: &[u8],
        mutator: &mut dyn FnMut(&mut RawEntry) -> ControlFlow<()>,
    ) -> Result<()>;

    /// Versioned set. Backends without versions may degrade this to a plain
    /// set that reports success.
    fn compare_and_set_raw(
        &self,
        key: &[u8],
        value: &[u8],
        ttl_seconds: u32,
        version: i64,
    ) -> Result<bool>;

    fn remove_raw(&self, key: &[u8]) -> Result<()>;

    /// Visit entries under `prefix` in ascending order, starting at `seek`.
    fn enumerate_raw(
        &self,
        prefix: &[u8],
        seek: &[u8],
        batch_size: usize,
        only_keys: bool,
        visit: &mut dyn FnMut(&RawEntry) -> ControlFlow<()>,
    ) -> Result<()>;

    /// All flat keys under `prefix`
    fn fetch_keys_raw(&self, prefix: &[u8], batch_size: usize) -> Result<Vec<Vec<u8>>>;
}

/// Whole-store maintenance on top of [`RawStorage`]
pub trait ManagedStorage: RawStorage {
    fn name(&self) -> &str;

    fn compact(&self, discard_ratio: f64) -> Result<()>;

    /// Write a consistent snapshot; returns the snapshot watermark
    fn backup(&self, writer: &mut dyn Write, since: u64) -> Result<u64>;

    /// Replace the whole store with a snapshot produced by `backup`
    fn restore(&self, reader: &mut dyn Read) -> Result<()>;

    fn drop_all(&self) -> Result<()>;

    fn drop_with_prefix(&self, prefix: &[u8]) -> Result<()>;

    fn close(&self) -> Result<()>;
}
