//! Error types for bucketkv
//!
//! Provides a unified error type for all operations. Engine failures are
//! carried through unmodified inside [`BucketKvError::Engine`].

use thiserror::Error;

/// Result type alias using BucketKvError
pub type Result<T> = std::result::Result<T, BucketKvError>;

/// Unified error type for bucketkv operations
#[derive(Debug, Error)]
pub enum BucketKvError {
    // -------------------------------------------------------------------------
    // I/O and Engine Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] redb::Error),

    // -------------------------------------------------------------------------
    // Access Errors
    // -------------------------------------------------------------------------
    /// Mutation attempted on a store opened read-only
    #[error("Database is read-only")]
    ReadOnly,

    /// Handle was closed, or left closed by a failed restore/drop-all
    #[error("Database is closed")]
    Closed,

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Enumeration Errors
    // -------------------------------------------------------------------------
    /// Seek position does not start with the enumeration prefix
    #[error("Invalid seek: seek must start with the enumeration prefix")]
    InvalidSeek,

    #[error("Cross-bucket seek: prefix bucket {prefix_bucket:?} != seek bucket {seek_bucket:?}")]
    CrossBucketSeek {
        prefix_bucket: String,
        seek_bucket: String,
    },

    // -------------------------------------------------------------------------
    // Transaction Errors
    // -------------------------------------------------------------------------
    /// Read-modify-write mutator aborted the transaction
    #[error("Operation was canceled")]
    Canceled,

    #[error("Stored value is not a counter: expected 8 bytes, got {len}")]
    InvalidCounter { len: usize },

    // -------------------------------------------------------------------------
    // Backup Stream Errors
    // -------------------------------------------------------------------------
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

// redb splits its failures across several types; all of them fold into
// `redb::Error` so callers see a single engine variant.
macro_rules! engine_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for BucketKvError {
                fn from(err: $ty) -> Self {
                    BucketKvError::Engine(err.into())
                }
            }
        )*
    };
}

engine_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl From<bincode::Error> for BucketKvError {
    fn from(err: bincode::Error) -> Self {
        BucketKvError::Serialization(err.to_string())
    }
}
