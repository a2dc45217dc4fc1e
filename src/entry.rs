//! Raw entry handed to callers and read-modify-write mutators.

/// A (flat key, value, ttl, version) tuple.
///
/// `ttl` and `version` are always zero: the engine keeps no such metadata.
/// They exist so entries line up with storage backends that do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    /// Flat key (`bucket:local`)
    pub key: Vec<u8>,

    /// Value bytes. `None` for key-only scans and for absent keys inside
    /// `do_in_transaction`.
    pub value: Option<Vec<u8>>,

    /// Time to live in seconds (always 0)
    pub ttl: u32,

    /// Version stamp (always 0)
    pub version: i64,
}

impl RawEntry {
    pub(crate) fn new(key: Vec<u8>, value: Option<Vec<u8>>) -> Self {
        Self {
            key,
            value,
            ttl: 0,
            version: 0,
        }
    }

    /// Value bytes, or an empty slice if there is none
    pub fn value_bytes(&self) -> &[u8] {
        self.value.as_deref().unwrap_or_default()
    }
}
