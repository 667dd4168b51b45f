//! Integration tests for the consume-once store.
//!
//! These tests drive the public API only and cover:
//! - Single consumption and explicit removal
//! - TTL expiry timing (on Tokio's paused clock)
//! - Replacement under the same key while an older watcher is pending
//! - Concurrent readers and writers from tasks and OS threads

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use burnkv::{StoreConfig, StoreError, TtlStore, DEFAULT_TTL};
use bytes::Bytes;
use tokio_test::{assert_err, assert_ok};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("burnkv=debug")
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Basic Contract
// ============================================================================

#[tokio::test]
async fn test_round_trip() {
    let store = TtlStore::new();

    store.put("foo", "bar");
    assert_eq!(store.get("foo"), Some("bar"));
}

#[tokio::test]
async fn test_second_get_sees_nothing() {
    let store = TtlStore::new();

    store.put("foo", "bar");
    assert_eq!(store.get("foo"), Some("bar"));
    assert_eq!(store.get("foo"), None);
}

#[tokio::test]
async fn test_remove_then_get() {
    let store = TtlStore::new();

    store.put("foo", "bar");
    store.remove("foo");
    assert_eq!(store.get("foo"), None);
}

#[tokio::test]
async fn test_put_after_consume_is_visible_again() {
    let store = TtlStore::new();

    store.put("foo", "bar");
    assert_eq!(store.get("foo"), Some("bar"));

    store.put("foo", "baz");
    assert_eq!(store.get("foo"), Some("baz"));
}

#[tokio::test]
async fn test_default_ttl() {
    let store: TtlStore<String, String> = TtlStore::new();
    assert_eq!(store.ttl(), DEFAULT_TTL);
    assert_eq!(DEFAULT_TTL, Duration::from_secs(30));
}

#[tokio::test]
async fn test_one_time_tokens() -> anyhow::Result<()> {
    init_tracing();

    let store = TtlStore::try_with_config(StoreConfig::default())?;
    let token = Bytes::from_static(b"csrf:7d1e");

    store.put(token.clone(), Bytes::from("session-19"));

    let claimed = store.get(&token);
    assert_eq!(claimed.as_deref(), Some(&b"session-19"[..]));

    // Replaying the token yields nothing
    assert_eq!(store.get(&token), None);
    Ok(())
}

// ============================================================================
// TTL Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_value_present_before_timeout() {
    init_tracing();
    let store = TtlStore::with_ttl(Duration::from_secs(2));

    store.put("foo", "bar");
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(store.get("foo"), Some("bar"));
}

#[tokio::test(start_paused = true)]
async fn test_value_removed_after_timeout() {
    init_tracing();
    let store = TtlStore::with_ttl(Duration::from_secs(2));

    store.put("foo", "bar");
    tokio::time::sleep(Duration::from_secs(4)).await;

    assert_eq!(store.get("foo"), None);
    assert_eq!(store.stats().expired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_watcher_does_not_evict_replacement() {
    init_tracing();
    let store = TtlStore::with_ttl(Duration::from_secs(2));

    store.put("k", "v1");
    tokio::time::sleep(Duration::from_millis(1900)).await;
    store.put("k", "v2");

    // v1's watcher would fire in this window
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(store.get("k"), Some("v2"));
}

#[tokio::test(start_paused = true)]
async fn test_remove_before_timeout_then_reput() {
    let store = TtlStore::with_ttl(Duration::from_secs(2));

    store.put("k", "v1");
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(store.remove("k"));
    store.put("k", "v2");

    // The first entry's deadline passes, the second's has not
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(store.get("k"), Some("v2"));
}

#[tokio::test(start_paused = true)]
async fn test_expired_entries_are_evicted_without_reads() {
    let store = TtlStore::with_ttl(Duration::from_millis(100));

    for i in 0..50u32 {
        store.put(i, i * 2);
    }
    assert_eq!(store.len(), 50);

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(store.is_empty());
    assert_eq!(store.stats().expired, 50);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_put_and_get_from_many_tasks() {
    let store = TtlStore::new();

    let tasks: Vec<_> = (0..100u64)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store.put(i, i + 1);
                tokio::time::sleep(Duration::from_millis(10)).await;

                assert_eq!(store.get(&i), Some(i + 1));
                assert_eq!(store.get(&i), None);
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    let stats = store.stats();
    assert_eq!(stats.hits, 100);
    assert_eq!(stats.entries, 0);
}

#[test]
fn test_exactly_one_reader_wins() {
    const READERS: usize = 8;
    const ROUNDS: usize = 200;

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let store = TtlStore::with_handle(StoreConfig::default(), runtime.handle().clone());

    for round in 0..ROUNDS {
        store.put("contended".to_string(), round);

        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(READERS));

        let handles: Vec<_> = (0..READERS)
            .map(|_| {
                let store = store.clone();
                let winners = Arc::clone(&winners);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    if let Some(value) = store.get("contended") {
                        assert_eq!(value, round);
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1, "round {}", round);
    }

    assert_eq!(store.stats().hits, ROUNDS as u64);
}

#[test]
fn test_store_from_plain_threads() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let store = TtlStore::with_handle(
        StoreConfig::new().with_ttl(Duration::from_secs(5)),
        runtime.handle().clone(),
    );

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..250 {
                    let key = format!("key:{}:{}", t, i);
                    store.put(key.clone(), i);
                    assert_eq!(store.get(&key), Some(i));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(store.is_empty());
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_construction_requires_runtime() {
    let result = TtlStore::<String, String>::try_with_config(StoreConfig::default());
    let err = assert_err!(result);
    assert!(matches!(err, StoreError::NoRuntime(_)));
}

#[test]
fn test_construction_inside_runtime() {
    tokio_test::block_on(async {
        let store = assert_ok!(TtlStore::<String, u32>::try_with_config(
            StoreConfig::new().with_shards(8)
        ));
        store.put("a".to_string(), 1);
        assert_eq!(store.get("a"), Some(1));
    });
}
