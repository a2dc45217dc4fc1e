//! Key Codec
//!
//! Maps a flat external key onto the two-level (bucket, local key) layout.
//!
//! ```text
//!   flat key:   b"users:alice:email"
//!                ─────┬─ ─────┬─────
//!               bucket│       │local key
//!                     └─ first SEPARATOR decides the boundary
//! ```
//!
//! A flat key without a separator names a whole bucket with an empty local
//! key. Pure functions; nothing here touches storage.

/// Byte separating the bucket name from the local key
pub const SEPARATOR: u8 = b':';

/// Split a flat key into `(bucket, local_key)` at the first separator.
pub fn split(flat: &[u8]) -> (&[u8], &[u8]) {
    match flat.iter().position(|&b| b == SEPARATOR) {
        Some(pos) => (&flat[..pos], &flat[pos + 1..]),
        None => (flat, &[]),
    }
}

/// Rebuild a flat key: `bucket ++ SEPARATOR ++ local_key`.
pub fn join(bucket: &[u8], local: &[u8]) -> Vec<u8> {
    let mut flat = Vec::with_capacity(bucket.len() + 1 + local.len());
    flat.extend_from_slice(bucket);
    flat.push(SEPARATOR);
    flat.extend_from_slice(local);
    flat
}

/// True if `flat` contains a separator, i.e. its bucket is fully determined.
pub fn has_separator(flat: &[u8]) -> bool {
    flat.contains(&SEPARATOR)
}
