//! Tests for the key codec
//!
//! These tests verify:
//! - Splitting at the first separator only
//! - Keys without a separator name a whole bucket
//! - join/split round trips

use bucketkv::codec::{has_separator, join, split, SEPARATOR};
use proptest::prelude::*;

// =============================================================================
// Split Tests
// =============================================================================

#[test]
fn test_split_bucket_and_local() {
    assert_eq!(split(b"first:name"), (&b"first"[..], &b"name"[..]));
}

#[test]
fn test_split_at_first_separator_only() {
    assert_eq!(split(b"a:b:c"), (&b"a"[..], &b"b:c"[..]));
}

#[test]
fn test_split_without_separator() {
    assert_eq!(split(b"first"), (&b"first"[..], &b""[..]));
}

#[test]
fn test_split_edge_cases() {
    assert_eq!(split(b""), (&b""[..], &b""[..]));
    assert_eq!(split(b":"), (&b""[..], &b""[..]));
    assert_eq!(split(b"bucket:"), (&b"bucket"[..], &b""[..]));
    assert_eq!(split(b":local"), (&b""[..], &b"local"[..]));
}

#[test]
fn test_split_binary_bytes() {
    let key = [0xffu8, 0x00, SEPARATOR, 0x01, SEPARATOR];
    assert_eq!(split(&key), (&key[..2], &key[3..]));
}

// =============================================================================
// Join Tests
// =============================================================================

#[test]
fn test_join_inserts_separator() {
    assert_eq!(join(b"first", b"name"), b"first:name".to_vec());
    assert_eq!(join(b"first", b""), b"first:".to_vec());
    assert_eq!(join(b"", b""), b":".to_vec());
}

#[test]
fn test_has_separator() {
    assert!(has_separator(b"a:"));
    assert!(has_separator(b":"));
    assert!(!has_separator(b"abc"));
    assert!(!has_separator(b""));
}

// =============================================================================
// Properties
// =============================================================================

fn bucket_name() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>().prop_filter("no separator", |b| *b != SEPARATOR), 0..16)
}

proptest! {
    #[test]
    fn prop_key_without_separator_is_whole_bucket(key in bucket_name()) {
        let (bucket, local) = split(&key);
        prop_assert_eq!(bucket, &key[..]);
        prop_assert!(local.is_empty());
    }

    #[test]
    fn prop_split_inverts_join(
        bucket in bucket_name(),
        local in proptest::collection::vec(any::<u8>(), 0..32),
    ) {
        let flat = join(&bucket, &local);
        let (b, l) = split(&flat);
        prop_assert_eq!(b, &bucket[..]);
        prop_assert_eq!(l, &local[..]);
    }

    #[test]
    fn prop_join_rebuilds_keys_with_separator(
        bucket in bucket_name(),
        local in proptest::collection::vec(any::<u8>(), 0..32),
    ) {
        let mut flat = bucket.clone();
        flat.push(SEPARATOR);
        flat.extend_from_slice(&local);

        let (b, l) = split(&flat);
        prop_assert_eq!(join(b, l), flat);
    }
}
