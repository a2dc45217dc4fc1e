//! Cross-bucket enumeration
//!
//! Makes the two-level (bucket, local key) layout scan like one flat,
//! prefix-ordered keyspace.
//!
//! ## Paths
//! ```text
//!   prefix "users:al"          prefix "us" / ""
//!   (separator present)        (no separator)
//!          │                          │
//!          ▼                          ▼
//!   ┌──────────────┐          ┌────────────────────┐
//!   │ one bucket   │─absent──▶│ every bucket whose │
//!   │ "users"      │          │ name shares the    │
//!   └──────────────┘          │ prefix, ascending  │
//!                             └────────────────────┘
//! ```
//!
//! Within a bucket, local keys are sorted, so keys under a prefix are
//! contiguous: each bucket scan stops at the first key that no longer
//! matches.
//!
//! Order is bucket name first, then local key. This differs from plain
//! flat-key byte order when one bucket name is a prefix of another
//! (`"a"` sorts before `"a0"` although `"a0:"` < `"a:"`).

use std::cmp::Ordering;
use std::ops::ControlFlow;

use tracing::debug;

use crate::codec;
use crate::engine::Engine;
use crate::entry::RawEntry;
use crate::error::{BucketKvError, Result};
use crate::storage::{self, ReadBucket};

impl Engine {
    /// Visit every entry whose flat key starts with `prefix`, in ascending
    /// order, beginning at `seek`
    ///
    /// `seek` must itself start with `prefix` (pass `prefix` to start at the
    /// first match); otherwise this fails with `InvalidSeek` before any
    /// transaction is opened. `visit` returning `Break` ends the scan
    /// without error. With `only_keys`, entries carry no value.
    ///
    /// The whole scan runs in one read transaction and sees one snapshot.
    pub fn enumerate<F>(
        &self,
        prefix: &[u8],
        seek: &[u8],
        only_keys: bool,
        mut visit: F,
    ) -> Result<()>
    where
        F: FnMut(&RawEntry) -> ControlFlow<()>,
    {
        if !seek.starts_with(prefix) {
            return Err(BucketKvError::InvalidSeek);
        }

        let single_bucket = codec::has_separator(prefix);
        let (bucket_prefix, _) = codec::split(prefix);
        let (bucket_seek, local_seek) = codec::split(seek);

        if single_bucket && bucket_prefix != bucket_seek {
            return Err(BucketKvError::CrossBucketSeek {
                prefix_bucket: String::from_utf8_lossy(bucket_prefix).into_owned(),
                seek_bucket: String::from_utf8_lossy(bucket_seek).into_owned(),
            });
        }

        self.view(|txn| {
            if single_bucket {
                if let Some(table) = storage::open_bucket(txn, bucket_prefix)? {
                    scan_bucket(&table, bucket_prefix, prefix, local_seek, only_keys, &mut visit)?;
                    return Ok(());
                }
                // Not created yet; the all-buckets pass finds nothing to
                // visit but keeps the behaviour of other backends.
                debug!(
                    bucket = %String::from_utf8_lossy(bucket_prefix),
                    "prefix bucket absent, scanning all buckets"
                );
            }

            for bucket in storage::list_buckets(txn)? {
                if !shares_prefix(&bucket, prefix) {
                    continue;
                }

                let start: &[u8] = match bucket.as_slice().cmp(bucket_seek) {
                    Ordering::Less => continue,
                    Ordering::Equal => local_seek,
                    Ordering::Greater => &[],
                };

                let Some(table) = storage::open_bucket(txn, &bucket)? else {
                    continue;
                };
                if scan_bucket(&table, &bucket, prefix, start, only_keys, &mut visit)?.is_break() {
                    break;
                }
            }
            Ok(())
        })
    }

    /// All flat keys under `prefix`, ascending
    pub fn fetch_keys(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        self.enumerate(prefix, prefix, true, |entry| {
            keys.push(entry.key.clone());
            ControlFlow::Continue(())
        })?;
        Ok(keys)
    }
}

/// True if `bucket` and `prefix` agree on their common length
fn shares_prefix(bucket: &[u8], prefix: &[u8]) -> bool {
    let len = bucket.len().min(prefix.len());
    bucket[..len] == prefix[..len]
}

/// Scan one bucket from `start` while flat keys still match `prefix`
fn scan_bucket<F>(
    table: &ReadBucket,
    bucket: &[u8],
    prefix: &[u8],
    start: &[u8],
    only_keys: bool,
    visit: &mut F,
) -> Result<ControlFlow<()>>
where
    F: FnMut(&RawEntry) -> ControlFlow<()>,
{
    for item in table.range(start..)? {
        let (key, value) = item?;

        let flat = codec::join(bucket, key.value());
        if !flat.starts_with(prefix) {
            break;
        }

        let value = if only_keys {
            None
        } else {
            Some(value.value().to_vec())
        };

        if visit(&RawEntry::new(flat, value)).is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }
    Ok(ControlFlow::Continue(()))
}
