//! Consume-Once Storage Engine
//!
//! This module implements the core store for BurnKV: a thread-safe, sharded
//! HashMap in which every value is removed the first time it is read, or
//! when its time-to-live runs out, whichever comes first.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, we use multiple shards to reduce contention.
//! 2. **Read = Remove**: `get` takes the shard's write lock and removes the entry in one step,
//!    so exactly one caller can ever claim a value.
//! 3. **One Watcher Per Entry**: every `put` spawns a timer task that evicts the entry
//!    when its TTL elapses (see the `expiry` module).
//! 4. **Tickets, Not Keys**: every entry carries a unique ticket. A watcher only removes
//!    the entry whose ticket it holds, so a stale watcher can never evict a newer value
//!    stored under the same key.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TtlStore                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲            ▲            ▲
//!        │            │            │
//!   ┌────┴────┐  ┌────┴────┐  ┌────┴────┐
//!   │ Watcher │  │ Watcher │  │ Watcher │   (one Tokio task per live entry)
//!   └─────────┘  └─────────┘  └─────────┘
//! ```
//!
//! Keys are distributed across shards using a hash function.
//! This allows multiple threads to put/get different keys concurrently.

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::expiry::ExpiryWatcher;

/// Default time-to-live applied to every entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Default number of shards for the store.
/// More shards = less lock contention, but more memory overhead.
/// 64 is a good balance for most workloads.
pub const DEFAULT_SHARDS: usize = 64;

/// Deadline used when `created_at + ttl` overflows the clock (~30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Errors that can occur while constructing a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store needs a Tokio runtime to host its expiry watchers.
    #[error("no Tokio runtime is running; build the store inside a runtime or pass a handle to TtlStore::with_handle")]
    NoRuntime(#[from] TryCurrentError),
}

/// Configuration for a [`TtlStore`].
///
/// # Example
///
/// ```
/// use burnkv::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_ttl(Duration::from_secs(5))
///     .with_shards(16);
/// assert_eq!(config.ttl, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Time-to-live shared by every entry (default: 30s)
    pub ttl: Duration,

    /// Number of independently locked shards (default: 64)
    pub shards: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            shards: DEFAULT_SHARDS,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time-to-live.
    ///
    /// A zero TTL is allowed: entries become invisible to readers as soon as
    /// they are stored and are cleaned up by their watcher right away.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the shard count. Zero is treated as one.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }
}

/// A stored value together with the state its watcher needs.
#[derive(Debug)]
pub(crate) struct Entry<V> {
    /// The actual value stored
    pub(crate) value: V,
    /// Unique identity of this entry instance
    pub(crate) ticket: u64,
    /// Fired when the entry leaves the store by any path other than its own expiry
    pub(crate) cancel: CancellationToken,
    /// When this entry was created
    pub(crate) created_at: Instant,
    /// When this entry expires
    pub(crate) expires_at: Instant,
}

impl<V> Entry<V> {
    /// Checks if this entry has expired.
    #[inline]
    pub(crate) fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// A single shard containing a portion of the entries.
#[derive(Debug)]
struct Shard<K, V> {
    data: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> Shard<K, V> {
    fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    // A panic while holding a shard lock cannot leave the map half-updated,
    // so poisoned locks are recovered rather than propagated.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, Entry<V>>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, Entry<V>>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// State shared by every handle to a store and, weakly, by its watchers.
pub(crate) struct StoreInner<K, V> {
    shards: Box<[Shard<K, V>]>,
    hasher: RandomState,
    ttl: Duration,

    /// Runtime the watchers are spawned on
    runtime: Handle,

    /// Parent of every entry's token; cancelled when the store is dropped
    root: CancellationToken,

    next_ticket: AtomicU64,

    /// Statistics: total PUT operations
    put_count: AtomicU64,

    /// Statistics: successful GETs (values consumed)
    hit_count: AtomicU64,

    /// Statistics: GETs that found nothing
    miss_count: AtomicU64,

    /// Statistics: entries removed by REMOVE or CLEAR
    removed_count: AtomicU64,

    /// Statistics: entries evicted because their TTL elapsed
    expired_count: AtomicU64,

    /// Statistics: entries overwritten by a PUT on the same key
    replaced_count: AtomicU64,
}

impl<K, V> StoreInner<K, V> {
    fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }
}

impl<K, V> StoreInner<K, V>
where
    K: Hash + Eq,
{
    /// Gets the shard for a given key.
    #[inline]
    fn shard<Q>(&self, key: &Q) -> &Shard<K, V>
    where
        Q: Hash + ?Sized,
    {
        let index = (self.hasher.hash_one(key) as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Removes the entry for `key` only if it is still the instance identified by `ticket`.
    ///
    /// Called by a watcher whose deadline elapsed. Returns `true` if the entry was evicted.
    pub(crate) fn expire(&self, key: &K, ticket: u64) -> bool {
        let mut data = self.shard(key).write();

        match data.get(key) {
            Some(entry) if entry.ticket == ticket => {
                data.remove(key);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }
}

impl<K, V> Drop for StoreInner<K, V> {
    fn drop(&mut self) {
        // Children of the root stop their watchers as well.
        self.root.cancel();

        let pending = self.len();
        if pending > 0 {
            info!(pending, "Store dropped, cancelled pending expiry watchers");
        }
    }
}

/// A concurrent key-value store whose values can be read exactly once.
///
/// Every value leaves the store the first time [`get`](Self::get) returns it,
/// or when the store's TTL elapses, whichever happens first.
///
/// # Thread Safety
///
/// `TtlStore` is a cheap handle around shared state: clone it to share the
/// store across threads and tasks. All operations are thread-safe.
///
/// # Teardown
///
/// When the last handle is dropped, every pending expiry watcher is cancelled.
///
/// # Example
///
/// ```
/// use burnkv::TtlStore;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = TtlStore::with_ttl(Duration::from_secs(60));
///
/// store.put("session", "abc123");
///
/// // The first read consumes the value...
/// assert_eq!(store.get("session"), Some("abc123"));
///
/// // ...so it can never be observed again.
/// assert_eq!(store.get("session"), None);
/// # }
/// ```
pub struct TtlStore<K, V> {
    inner: Arc<StoreInner<K, V>>,
}

impl<K, V> Clone for TtlStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> std::fmt::Debug for TtlStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlStore")
            .field("ttl", &self.inner.ttl)
            .field("shards", &self.inner.shards.len())
            .field("entries", &self.inner.len())
            .finish()
    }
}

impl<K, V> TtlStore<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates an empty store with the default 30 second TTL.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context. Use
    /// [`with_handle`](Self::with_handle) to build a store from a plain thread.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates an empty store with the given TTL.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_config(StoreConfig::default().with_ttl(ttl))
    }

    /// Creates an empty store with a custom configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context. See
    /// [`try_with_config`](Self::try_with_config) for a fallible version.
    pub fn with_config(config: StoreConfig) -> Self {
        match Self::try_with_config(config) {
            Ok(store) => store,
            Err(e) => panic!("burnkv::TtlStore: {e}"),
        }
    }

    /// Creates an empty store on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoRuntime`] if no runtime is current.
    pub fn try_with_config(config: StoreConfig) -> Result<Self, StoreError> {
        let runtime = Handle::try_current()?;
        Ok(Self::with_handle(config, runtime))
    }

    /// Creates an empty store whose watchers run on `runtime`.
    ///
    /// The returned store can be used from any thread, inside or outside the runtime.
    pub fn with_handle(config: StoreConfig, runtime: Handle) -> Self {
        let shards = (0..config.shards.max(1)).map(|_| Shard::new()).collect();

        Self {
            inner: Arc::new(StoreInner {
                shards,
                hasher: RandomState::new(),
                ttl: config.ttl,
                runtime,
                root: CancellationToken::new(),
                next_ticket: AtomicU64::new(0),
                put_count: AtomicU64::new(0),
                hit_count: AtomicU64::new(0),
                miss_count: AtomicU64::new(0),
                removed_count: AtomicU64::new(0),
                expired_count: AtomicU64::new(0),
                replaced_count: AtomicU64::new(0),
            }),
        }
    }

    /// Stores `value` under `key` and starts its expiry watcher.
    ///
    /// If the key already holds a value, that value is discarded and its
    /// watcher is cancelled; the new value gets a full TTL of its own.
    pub fn put(&self, key: K, value: V) {
        let inner = &self.inner;
        inner.put_count.fetch_add(1, Ordering::Relaxed);

        let ticket = inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        let created_at = Instant::now();
        let expires_at = created_at
            .checked_add(inner.ttl)
            .unwrap_or_else(|| created_at + FAR_FUTURE);
        let cancel = inner.root.child_token();

        let entry = Entry {
            value,
            ticket,
            cancel: cancel.clone(),
            created_at,
            expires_at,
        };

        let replaced = inner.shard(&key).write().insert(key.clone(), entry);

        if let Some(old) = replaced {
            old.cancel.cancel();
            inner.replaced_count.fetch_add(1, Ordering::Relaxed);
            debug!(
                ticket,
                replaced_ticket = old.ticket,
                age_ms = old.created_at.elapsed().as_millis() as u64,
                "Entry replaced"
            );
        }

        trace!(ticket, ttl_ms = inner.ttl.as_millis() as u64, "Entry stored");

        ExpiryWatcher::new(Arc::downgrade(inner), key, ticket, expires_at, cancel)
            .spawn(&inner.runtime);
    }

    /// Takes the value stored under `key`, removing it from the store.
    ///
    /// Returns `None` if the key was never stored, was already consumed,
    /// was removed, or has expired. A value is returned at most once.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let inner = &self.inner;

        // Check, remove and claim under one write lock
        let claimed = inner.shard(key).write().remove(key);

        let Some(entry) = claimed else {
            inner.miss_count.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        entry.cancel.cancel();

        // The deadline passed but the watcher has not run yet
        if entry.is_expired() {
            inner.expired_count.fetch_add(1, Ordering::Relaxed);
            inner.miss_count.fetch_add(1, Ordering::Relaxed);
            trace!(ticket = entry.ticket, "Expired entry dropped on read");
            return None;
        }

        inner.hit_count.fetch_add(1, Ordering::Relaxed);
        trace!(ticket = entry.ticket, "Entry consumed");
        Some(entry.value)
    }

    /// Deletes the entry for `key` and cancels its watcher.
    ///
    /// # Returns
    ///
    /// Returns `true` if an entry was removed, `false` if there was none.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let inner = &self.inner;

        match inner.shard(key).write().remove(key) {
            Some(entry) => {
                entry.cancel.cancel();
                inner.removed_count.fetch_add(1, Ordering::Relaxed);
                trace!(ticket = entry.ticket, "Entry removed");
                true
            }
            None => false,
        }
    }

    /// Checks whether a live value is stored under `key` without consuming it.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner
            .shard(key)
            .read()
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    /// Removes every entry and cancels every watcher.
    ///
    /// # Returns
    ///
    /// Returns the number of entries that were removed.
    pub fn clear(&self) -> usize {
        let mut cleared = 0;

        for shard in self.inner.shards.iter() {
            let mut data = shard.write();
            for (_, entry) in data.drain() {
                entry.cancel.cancel();
                cleared += 1;
            }
        }

        if cleared > 0 {
            self.inner
                .removed_count
                .fetch_add(cleared as u64, Ordering::Relaxed);
            debug!(cleared, "Store cleared");
        }

        cleared
    }

    /// Returns the number of entries currently held, including any whose
    /// deadline has passed but whose watcher has not run yet.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.shards.iter().all(|shard| shard.read().is_empty())
    }

    /// Returns the TTL applied to every entry.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        let inner = &self.inner;
        StoreStats {
            entries: inner.len(),
            puts: inner.put_count.load(Ordering::Relaxed),
            hits: inner.hit_count.load(Ordering::Relaxed),
            misses: inner.miss_count.load(Ordering::Relaxed),
            removed: inner.removed_count.load(Ordering::Relaxed),
            expired: inner.expired_count.load(Ordering::Relaxed),
            replaced: inner.replaced_count.load(Ordering::Relaxed),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of entries currently stored
    pub entries: usize,
    /// Total PUT operations
    pub puts: u64,
    /// GETs that consumed a value
    pub hits: u64,
    /// GETs that found nothing
    pub misses: u64,
    /// Entries deleted by REMOVE or CLEAR
    pub removed: u64,
    /// Entries evicted because their TTL elapsed
    pub expired: u64,
    /// Entries overwritten by a later PUT
    pub replaced: u64,
}
