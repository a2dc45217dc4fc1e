//! # bucketkv
//!
//! A flat key-value storage adapter over an embedded, bucketed, transactional
//! store ([redb](https://docs.rs/redb)):
//! - Flat keys `bucket:local` mapped onto one sorted table per bucket
//! - Prefix enumeration with seek/resume across bucket boundaries
//! - One transaction per operation (single writer / many snapshot readers)
//! - Atomic read-modify-write, counters, conditional updates
//! - Portable backup / restore, drop-all, per-bucket drop
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            Callers (operation builders, CLI)                │
//! │                  flat keys: b"bucket:local"                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  RawStorage / ManagedStorage
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                │
//! │        (swappable handle, one txn per operation)            │
//! └──────┬──────────────────────┬───────────────────────┬───────┘
//!        │                      │                       │
//!        ▼                      ▼                       ▼
//!   ┌──────────┐        ┌──────────────┐        ┌──────────────┐
//!   │ Raw CRUD │        │  Enumerator  │        │  Lifecycle   │
//!   │          │        │ (cross-bucket│        │ backup/drop  │
//!   └────┬─────┘        └──────┬───────┘        └──────┬───────┘
//!        │        codec::split / codec::join           │
//!        └─────────────────────┬───────────────────────┘
//!                              ▼
//!                     ┌─────────────────┐
//!                     │  redb tables    │
//!                     │ (one per bucket)│
//!                     └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod entry;
pub mod storage;
pub mod traits;
pub mod engine;
pub mod enumerate;
pub mod lifecycle;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BucketKvError, Result};
pub use config::{Config, LockWait};
pub use codec::SEPARATOR;
pub use engine::Engine;
pub use entry::RawEntry;
pub use traits::{ManagedStorage, RawStorage};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of bucketkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
