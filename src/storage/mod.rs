//! Storage Module
//!
//! Physical layout of buckets inside the redb file.
//!
//! ## Responsibilities
//! - Map bucket names onto redb table names (and back)
//! - Open buckets without side effects on read, lazily create them on write
//! - List buckets in ascending name order
//! - Keep the commit sequence used as the backup watermark
//!
//! ## Table Layout
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ redb file                                                │
//! │  ┌────────────────────────────┐                          │
//! │  │ "bucket/" ++ hex(name)     │  &[u8] -> &[u8]  (×N)    │
//! │  └────────────────────────────┘                          │
//! │  ┌────────────────────────────┐                          │
//! │  │ "meta"                     │  "sequence" -> u64       │
//! │  └────────────────────────────┘                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! redb table names are non-empty strings while bucket names are arbitrary
//! bytes (the empty name included), hence the hex encoding. Lowercase hex
//! keeps byte order, so sorted table names are sorted bucket names.

pub mod snapshot;

use redb::{
    ReadOnlyTable, ReadTransaction, ReadableTable, Table, TableDefinition, TableError, TableHandle,
    WriteTransaction,
};

use crate::error::Result;

/// Namespace of bucket tables
const BUCKET_TABLE_PREFIX: &str = "bucket/";

/// Private bookkeeping table, outside the bucket namespace
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key of the commit sequence in META_TABLE
const SEQUENCE_KEY: &str = "sequence";

/// Definition of one bucket's table
pub(crate) type BucketDefinition<'a> = TableDefinition<'a, &'static [u8], &'static [u8]>;

/// A bucket opened inside a read transaction
pub(crate) type ReadBucket = ReadOnlyTable<&'static [u8], &'static [u8]>;

/// A bucket opened inside a write transaction
pub(crate) type WriteBucket<'txn> = Table<'txn, &'static [u8], &'static [u8]>;

// =============================================================================
// Naming
// =============================================================================

/// redb table name holding `bucket`
pub(crate) fn table_name(bucket: &[u8]) -> String {
    format!("{}{}", BUCKET_TABLE_PREFIX, hex::encode(bucket))
}

/// Bucket name stored in `table`, or None for non-bucket tables
pub(crate) fn bucket_name(table: &str) -> Option<Vec<u8>> {
    let encoded = table.strip_prefix(BUCKET_TABLE_PREFIX)?;
    hex::decode(encoded).ok()
}

// =============================================================================
// Bucket Access
// =============================================================================

/// Open an existing bucket. Absent buckets are `None`, never created.
pub(crate) fn open_bucket(txn: &ReadTransaction, bucket: &[u8]) -> Result<Option<ReadBucket>> {
    let name = table_name(bucket);
    match txn.open_table(BucketDefinition::new(&name)) {
        Ok(table) => Ok(Some(table)),
        Err(TableError::TableDoesNotExist(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Open a bucket for writing, creating it if missing
pub(crate) fn create_bucket_if_not_exists<'txn>(
    txn: &'txn WriteTransaction,
    bucket: &[u8],
) -> Result<WriteBucket<'txn>> {
    let name = table_name(bucket);
    Ok(txn.open_table(BucketDefinition::new(&name))?)
}

/// Remove every key of a bucket, keeping the bucket itself.
///
/// Returns false if the bucket did not exist (nothing is created then).
pub(crate) fn clear_bucket(txn: &WriteTransaction, bucket: &[u8]) -> Result<bool> {
    let name = table_name(bucket);
    let definition = BucketDefinition::new(&name);
    if !txn.delete_table(definition)? {
        return Ok(false);
    }
    txn.open_table(definition)?;
    Ok(true)
}

/// All bucket names, ascending
pub(crate) fn list_buckets(txn: &ReadTransaction) -> Result<Vec<Vec<u8>>> {
    let mut buckets: Vec<Vec<u8>> = txn
        .list_tables()?
        .filter_map(|handle| bucket_name(handle.name()))
        .collect();
    buckets.sort();
    Ok(buckets)
}

// =============================================================================
// Commit Sequence
// =============================================================================

/// Sequence of the last committed write visible to `txn` (0 for a new file)
pub(crate) fn read_sequence(txn: &ReadTransaction) -> Result<u64> {
    match txn.open_table(META_TABLE) {
        Ok(table) => Ok(table.get(SEQUENCE_KEY)?.map(|v| v.value()).unwrap_or(0)),
        Err(TableError::TableDoesNotExist(_)) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Advance the sequence inside a write transaction; returns the new value
pub(crate) fn bump_sequence(txn: &WriteTransaction) -> Result<u64> {
    let mut table = txn.open_table(META_TABLE)?;
    let next = table.get(SEQUENCE_KEY)?.map(|v| v.value()).unwrap_or(0) + 1;
    table.insert(SEQUENCE_KEY, next)?;
    Ok(next)
}

/// Overwrite the sequence (restore path)
pub(crate) fn write_sequence(txn: &WriteTransaction, sequence: u64) -> Result<()> {
    let mut table = txn.open_table(META_TABLE)?;
    table.insert(SEQUENCE_KEY, sequence)?;
    Ok(())
}
