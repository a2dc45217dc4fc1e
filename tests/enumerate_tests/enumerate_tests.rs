//! Tests for cross-bucket enumeration
//!
//! These tests verify:
//! - Single-bucket scans (prefix contains a separator)
//! - All-bucket scans (prefix without separator, empty prefix)
//! - Seek / resume semantics, inside and across buckets
//! - Early termination and key-only scans
//! - Snapshot isolation of a running scan

use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread;

use bucketkv::{BucketKvError, Config, Engine};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("enum.redb"))
        .build();
    let engine = Engine::open(config).unwrap();
    (temp_dir, engine)
}

/// Engine with three buckets: "first", "fizz", "other"
fn setup_populated_engine() -> (TempDir, Engine) {
    let (temp, engine) = setup_temp_engine();
    for key in [
        "first:alpha",
        "first:beta",
        "first:gamma",
        "fizz:one",
        "fizz:two",
        "other:x",
    ] {
        engine.set(key.as_bytes(), format!("v-{}", key).as_bytes()).unwrap();
    }
    (temp, engine)
}

/// Collect the flat keys visited for (prefix, seek)
fn collect_keys(engine: &Engine, prefix: &str, seek: &str) -> Vec<String> {
    let mut keys = Vec::new();
    engine
        .enumerate(prefix.as_bytes(), seek.as_bytes(), false, |entry| {
            keys.push(String::from_utf8(entry.key.clone()).unwrap());
            ControlFlow::Continue(())
        })
        .unwrap();
    keys
}

// =============================================================================
// Empty Prefix Tests
// =============================================================================

#[test]
fn test_empty_prefix_visits_everything_once() {
    let (_temp, engine) = setup_populated_engine();

    let keys = collect_keys(&engine, "", "");

    assert_eq!(
        keys,
        vec![
            "first:alpha",
            "first:beta",
            "first:gamma",
            "fizz:one",
            "fizz:two",
            "other:x",
        ]
    );
}

#[test]
fn test_empty_store_visits_nothing() {
    let (_temp, engine) = setup_temp_engine();

    assert!(collect_keys(&engine, "", "").is_empty());
}

#[test]
fn test_order_is_bucket_then_key() {
    let (_temp, engine) = setup_temp_engine();
    engine.set(b"a0:k", b"v").unwrap();
    engine.set(b"a:z", b"v").unwrap();
    engine.set(b"a:b", b"v").unwrap();

    // Bucket "a" sorts before "a0" even though "a0:" < "a:" bytewise
    assert_eq!(collect_keys(&engine, "", ""), vec!["a:b", "a:z", "a0:k"]);
}

#[test]
fn test_entries_carry_values() {
    let (_temp, engine) = setup_populated_engine();

    let mut values = Vec::new();
    engine
        .enumerate(b"fizz:", b"fizz:", false, |entry| {
            assert_eq!(entry.ttl, 0);
            assert_eq!(entry.version, 0);
            values.push(entry.value.clone().unwrap());
            ControlFlow::Continue(())
        })
        .unwrap();

    assert_eq!(values, vec![b"v-fizz:one".to_vec(), b"v-fizz:two".to_vec()]);
}

// =============================================================================
// Single-Bucket Tests
// =============================================================================

#[test]
fn test_bucket_prefix_confines_scan() {
    let (_temp, engine) = setup_populated_engine();

    assert_eq!(
        collect_keys(&engine, "first:", "first:"),
        vec!["first:alpha", "first:beta", "first:gamma"]
    );
}

#[test]
fn test_local_prefix() {
    let (_temp, engine) = setup_populated_engine();
    engine.set(b"first:alphabet", b"v").unwrap();

    assert_eq!(
        collect_keys(&engine, "first:alpha", "first:alpha"),
        vec!["first:alpha", "first:alphabet"]
    );
    assert_eq!(collect_keys(&engine, "first:b", "first:b"), vec!["first:beta"]);
}

#[test]
fn test_prefix_without_match() {
    let (_temp, engine) = setup_populated_engine();

    assert!(collect_keys(&engine, "first:nothing", "first:nothing").is_empty());
}

#[test]
fn test_prefix_bucket_not_created() {
    let (_temp, engine) = setup_populated_engine();

    assert!(collect_keys(&engine, "missing:", "missing:").is_empty());
    assert!(collect_keys(&engine, "fi:", "fi:").is_empty());
    // Enumeration never creates buckets
    assert_eq!(engine.buckets().unwrap().len(), 3);
}

#[test]
fn test_empty_bucket_name() {
    let (_temp, engine) = setup_populated_engine();
    engine.set(b":root", b"v").unwrap();

    assert_eq!(collect_keys(&engine, ":", ":"), vec![":root"]);
    assert_eq!(collect_keys(&engine, "", "")[0], ":root");
}

#[test]
fn test_local_keys_with_separator() {
    let (_temp, engine) = setup_temp_engine();
    engine.set(b"a:b:1", b"v").unwrap();
    engine.set(b"a:b:2", b"v").unwrap();
    engine.set(b"a:c", b"v").unwrap();

    assert_eq!(collect_keys(&engine, "a:b:", "a:b:"), vec!["a:b:1", "a:b:2"]);
}

// =============================================================================
// All-Bucket Tests
// =============================================================================

#[test]
fn test_partial_bucket_prefix_spans_buckets() {
    let (_temp, engine) = setup_populated_engine();

    assert_eq!(
        collect_keys(&engine, "fi", "fi"),
        vec!["first:alpha", "first:beta", "first:gamma", "fizz:one", "fizz:two"]
    );
}

#[test]
fn test_whole_bucket_name_without_separator() {
    let (_temp, engine) = setup_populated_engine();
    engine.set(b"firstly:x", b"v").unwrap();

    // "first" is a prefix of both bucket "first" and bucket "firstly"
    assert_eq!(
        collect_keys(&engine, "first", "first"),
        vec!["first:alpha", "first:beta", "first:gamma", "firstly:x"]
    );
}

#[test]
fn test_prefix_longer_than_bucket_name() {
    let (_temp, engine) = setup_populated_engine();

    assert!(collect_keys(&engine, "firstx", "firstx").is_empty());
}

// =============================================================================
// Seek Tests
// =============================================================================

#[test]
fn test_seek_resumes_inside_bucket() {
    let (_temp, engine) = setup_populated_engine();

    assert_eq!(
        collect_keys(&engine, "first:", "first:beta"),
        vec!["first:beta", "first:gamma"]
    );
}

#[test]
fn test_seek_between_keys() {
    let (_temp, engine) = setup_populated_engine();

    assert_eq!(collect_keys(&engine, "first:", "first:c"), vec!["first:gamma"]);
}

#[test]
fn test_seek_past_last_key() {
    let (_temp, engine) = setup_populated_engine();

    assert!(collect_keys(&engine, "first:", "first:zzz").is_empty());
}

#[test]
fn test_seek_equal_to_prefix_starts_at_first_match() {
    let (_temp, engine) = setup_populated_engine();

    assert_eq!(
        collect_keys(&engine, "first:", "first:"),
        collect_keys(&engine, "first:", "first:a")
    );
}

#[test]
fn test_seek_across_buckets() {
    let (_temp, engine) = setup_populated_engine();

    assert_eq!(
        collect_keys(&engine, "", "fizz:two"),
        vec!["fizz:two", "other:x"]
    );
    assert_eq!(
        collect_keys(&engine, "fi", "first:gamma"),
        vec!["first:gamma", "fizz:one", "fizz:two"]
    );
}

#[test]
fn test_seek_to_partial_bucket_name() {
    let (_temp, engine) = setup_populated_engine();

    // "fiz" skips bucket "first" and starts at the beginning of "fizz"
    assert_eq!(
        collect_keys(&engine, "", "fiz"),
        vec!["fizz:one", "fizz:two", "other:x"]
    );
}

#[test]
fn test_invalid_seek() {
    let (_temp, engine) = setup_populated_engine();

    let mut visited = 0;
    let result = engine.enumerate(b"first:", b"fizz:one", false, |_| {
        visited += 1;
        ControlFlow::Continue(())
    });

    assert!(matches!(result, Err(BucketKvError::InvalidSeek)));
    assert_eq!(visited, 0);
}

#[test]
fn test_invalid_seek_on_closed_engine() {
    let (_temp, engine) = setup_populated_engine();
    engine.close().unwrap();

    // Checked before any transaction is attempted
    let result = engine.enumerate(b"a:", b"b:", false, |_| ControlFlow::Continue(()));
    assert!(matches!(result, Err(BucketKvError::InvalidSeek)));
}

// =============================================================================
// Termination and Key-Only Tests
// =============================================================================

#[test]
fn test_visitor_break_stops_immediately() {
    let (_temp, engine) = setup_populated_engine();

    let mut keys = Vec::new();
    engine
        .enumerate(b"", b"", false, |entry| {
            keys.push(entry.key.clone());
            if keys.len() == 4 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();

    // Stops across bucket boundaries too
    assert_eq!(keys.len(), 4);
    assert_eq!(keys[3], b"fizz:one".to_vec());
}

#[test]
fn test_visitor_break_on_first_entry() {
    let (_temp, engine) = setup_populated_engine();

    let mut visited = 0;
    engine
        .enumerate(b"first:", b"first:", false, |_| {
            visited += 1;
            ControlFlow::Break(())
        })
        .unwrap();

    assert_eq!(visited, 1);
}

#[test]
fn test_only_keys() {
    let (_temp, engine) = setup_populated_engine();

    let mut count = 0;
    engine
        .enumerate(b"", b"", true, |entry| {
            assert!(entry.value.is_none());
            count += 1;
            ControlFlow::Continue(())
        })
        .unwrap();

    assert_eq!(count, 6);
}

#[test]
fn test_fetch_keys() {
    let (_temp, engine) = setup_populated_engine();

    assert_eq!(
        engine.fetch_keys(b"fizz:").unwrap(),
        vec![b"fizz:one".to_vec(), b"fizz:two".to_vec()]
    );
    assert_eq!(engine.fetch_keys(b"").unwrap().len(), 6);
    assert!(engine.fetch_keys(b"none:").unwrap().is_empty());
}

// =============================================================================
// Isolation Tests
// =============================================================================

#[test]
fn test_scan_sees_snapshot() {
    let (_temp, engine) = setup_populated_engine();
    let engine = Arc::new(engine);

    let mut keys = Vec::new();
    engine
        .enumerate(b"", b"", true, |entry| {
            if keys.is_empty() {
                // Concurrent writer commits while the scan is running
                let writer = Arc::clone(&engine);
                thread::spawn(move || {
                    writer.set(b"first:delta", b"late").unwrap();
                    writer.set(b"zzz:late", b"late").unwrap();
                })
                .join()
                .unwrap();
            }
            keys.push(entry.key.clone());
            ControlFlow::Continue(())
        })
        .unwrap();

    assert_eq!(keys.len(), 6);
    // A new scan sees the writes
    assert_eq!(engine.fetch_keys(b"").unwrap().len(), 8);
}
