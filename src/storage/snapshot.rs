//! Snapshot Stream
//!
//! Portable backup format written by `Engine::backup` and consumed by
//! `Engine::restore`.
//!
//! ## Stream Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "BKVS" (4) | Version: u16 (2) | Sequence: u64  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Frames (variable)                                       │
//! │   [PayloadLen: u32][CRC32: u32][bincode(record)]        │
//! │   Bucket { name }            starts a bucket            │
//! │   Entry { key, value }       belongs to the last bucket │
//! │   ... repeated ...                                      │
//! │   End { buckets, entries }   always the last frame      │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::borrow::Cow;
use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{BucketKvError, Result};

/// Magic bytes identifying a bucketkv snapshot stream
pub(crate) const MAGIC: &[u8; 4] = b"BKVS";

/// Current snapshot format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + Sequence (8) = 14 bytes
pub(crate) const HEADER_SIZE: usize = 14;

/// Frame header size: PayloadLen (4) + CRC32 (4)
const FRAME_HEADER_SIZE: usize = 8;

/// Largest accepted frame payload (256 MB)
pub(crate) const MAX_FRAME_SIZE: u32 = 256 * 1024 * 1024;

/// One frame of the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotRecord<'a> {
    Bucket { name: Cow<'a, [u8]> },
    Entry { key: Cow<'a, [u8]>, value: Cow<'a, [u8]> },
    End { buckets: u64, entries: u64 },
}

/// Counts reported once a stream is complete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub sequence: u64,
    pub buckets: u64,
    pub entries: u64,
}

// =============================================================================
// Writer
// =============================================================================

/// Writes a snapshot stream; call `bucket()`/`entry()` in order, then `finish()`
pub struct SnapshotWriter<W: Write> {
    inner: W,
    stats: SnapshotStats,
}

impl<W: Write> SnapshotWriter<W> {
    /// Write the header immediately
    pub fn new(mut inner: W, sequence: u64) -> Result<Self> {
        inner.write_all(MAGIC)?;
        inner.write_all(&VERSION.to_le_bytes())?;
        inner.write_all(&sequence.to_le_bytes())?;

        Ok(Self {
            inner,
            stats: SnapshotStats {
                sequence,
                ..SnapshotStats::default()
            },
        })
    }

    /// Start a bucket; following entries belong to it
    pub fn bucket(&mut self, name: &[u8]) -> Result<()> {
        self.write_record(&SnapshotRecord::Bucket {
            name: Cow::Borrowed(name),
        })?;
        self.stats.buckets += 1;
        Ok(())
    }

    pub fn entry(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.stats.buckets == 0 {
            return Err(BucketKvError::Snapshot(
                "entry written before any bucket".to_string(),
            ));
        }
        self.write_record(&SnapshotRecord::Entry {
            key: Cow::Borrowed(key),
            value: Cow::Borrowed(value),
        })?;
        self.stats.entries += 1;
        Ok(())
    }

    /// Write the End frame and flush
    pub fn finish(mut self) -> Result<SnapshotStats> {
        self.write_record(&SnapshotRecord::End {
            buckets: self.stats.buckets,
            entries: self.stats.entries,
        })?;
        self.inner.flush()?;
        Ok(self.stats)
    }

    fn write_record(&mut self, record: &SnapshotRecord<'_>) -> Result<()> {
        let payload = bincode::serialize(record)?;
        if payload.len() > MAX_FRAME_SIZE as usize {
            return Err(BucketKvError::Snapshot(format!(
                "Frame too large: {} bytes (max {})",
                payload.len(),
                MAX_FRAME_SIZE
            )));
        }

        let crc = crc32fast::hash(&payload);
        self.inner.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.inner.write_all(&crc.to_le_bytes())?;
        self.inner.write_all(&payload)?;
        Ok(())
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Reads and validates a snapshot stream
pub struct SnapshotReader<R: Read> {
    inner: R,
    stats: SnapshotStats,
    finished: bool,
}

impl<R: Read> SnapshotReader<R> {
    /// Read and validate the header
    pub fn new(mut inner: R) -> Result<Self> {
        let mut header = [0u8; HEADER_SIZE];
        read_exact_or_truncated(&mut inner, &mut header, "header")?;

        if &header[0..4] != MAGIC {
            return Err(BucketKvError::Snapshot(format!(
                "Invalid snapshot magic: expected BKVS, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(BucketKvError::Snapshot(format!(
                "Unsupported snapshot version: {}",
                version
            )));
        }

        let mut sequence = [0u8; 8];
        sequence.copy_from_slice(&header[6..14]);

        Ok(Self {
            inner,
            stats: SnapshotStats {
                sequence: u64::from_le_bytes(sequence),
                ..SnapshotStats::default()
            },
            finished: false,
        })
    }

    /// Commit sequence of the database the snapshot was taken from
    pub fn sequence(&self) -> u64 {
        self.stats.sequence
    }

    /// Next Bucket or Entry record; `None` once a valid End frame was read
    pub fn next_record(&mut self) -> Result<Option<SnapshotRecord<'static>>> {
        if self.finished {
            return Ok(None);
        }

        let mut frame_header = [0u8; FRAME_HEADER_SIZE];
        read_exact_or_truncated(&mut self.inner, &mut frame_header, "frame header")?;

        let len = u32::from_le_bytes([
            frame_header[0],
            frame_header[1],
            frame_header[2],
            frame_header[3],
        ]);
        let expected_crc = u32::from_le_bytes([
            frame_header[4],
            frame_header[5],
            frame_header[6],
            frame_header[7],
        ]);

        if len > MAX_FRAME_SIZE {
            return Err(BucketKvError::Snapshot(format!(
                "Frame too large: {} bytes (max {})",
                len, MAX_FRAME_SIZE
            )));
        }

        let mut payload = vec![0u8; len as usize];
        read_exact_or_truncated(&mut self.inner, &mut payload, "frame payload")?;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            return Err(BucketKvError::Snapshot(format!(
                "Checksum mismatch: expected {:#010x}, got {:#010x}",
                expected_crc, actual_crc
            )));
        }

        let record: SnapshotRecord<'static> = bincode::deserialize(&payload)?;
        match record {
            SnapshotRecord::Bucket { .. } => {
                self.stats.buckets += 1;
                Ok(Some(record))
            }
            SnapshotRecord::Entry { .. } => {
                if self.stats.buckets == 0 {
                    return Err(BucketKvError::Snapshot(
                        "entry before any bucket".to_string(),
                    ));
                }
                self.stats.entries += 1;
                Ok(Some(record))
            }
            SnapshotRecord::End { buckets, entries } => {
                if buckets != self.stats.buckets || entries != self.stats.entries {
                    return Err(BucketKvError::Snapshot(format!(
                        "Count mismatch: trailer says {} buckets/{} entries, read {}/{}",
                        buckets, entries, self.stats.buckets, self.stats.entries
                    )));
                }
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Counts read so far (final once `next_record` returned `None`)
    pub fn stats(&self) -> SnapshotStats {
        self.stats
    }
}

fn read_exact_or_truncated<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(BucketKvError::Snapshot(
            format!("Truncated snapshot: unexpected end of stream in {}", what),
        )),
        Err(e) => Err(e.into()),
    }
}
