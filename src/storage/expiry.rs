//! Per-Entry Expiry Watchers
//!
//! Every `put` spawns one watcher: a small Tokio task that owns the deadline
//! of exactly one entry instance. The watcher waits for whichever comes first:
//!
//! 1. **Cancellation**: the entry was consumed by `get`, deleted by `remove`
//!    or `clear`, overwritten by another `put`, or the store itself was dropped.
//!    The watcher exits without touching the store.
//! 2. **Deadline**: the TTL elapsed with nobody claiming the value. The watcher
//!    evicts the entry, but only if the store still holds the same instance
//!    (matched by ticket, not by key).
//!
//! ## Why Tickets?
//!
//! Removing by key alone is racy: if `put(k, v1)` is followed by `put(k, v2)`,
//! v1's watcher could fire and delete v2 long before v2's own TTL is up.
//! Comparing tickets turns a stale watcher's delete into a no-op.
//!
//! ## Ownership
//!
//! Watchers hold a `Weak` reference to the store, so pending watchers never
//! keep a dropped store alive.

use std::hash::Hash;
use std::sync::Weak;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::engine::StoreInner;

/// The expiry watcher for a single entry instance.
pub(crate) struct ExpiryWatcher<K, V> {
    store: Weak<StoreInner<K, V>>,
    key: K,
    ticket: u64,
    deadline: Instant,
    cancel: CancellationToken,
}

impl<K, V> ExpiryWatcher<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(
        store: Weak<StoreInner<K, V>>,
        key: K,
        ticket: u64,
        deadline: Instant,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            key,
            ticket,
            deadline,
            cancel,
        }
    }

    /// Spawns the watcher on `runtime`.
    ///
    /// Spawning never blocks; the deadline was fixed when the entry was created,
    /// so a late first poll does not extend the entry's life.
    pub(crate) fn spawn(self, runtime: &Handle) -> JoinHandle<()> {
        runtime.spawn(self.run())
    }

    /// Waits for cancellation or the deadline, whichever comes first.
    async fn run(self) {
        tokio::select! {
            // Prefer cancellation when both are ready.
            biased;

            _ = self.cancel.cancelled() => {
                trace!(ticket = self.ticket, "Expiry watcher cancelled");
            }
            _ = tokio::time::sleep_until(self.deadline) => {
                self.expire();
            }
        }
    }

    fn expire(&self) {
        let Some(store) = self.store.upgrade() else {
            trace!(ticket = self.ticket, "Store gone before deadline");
            return;
        };

        if store.expire(&self.key, self.ticket) {
            debug!(ticket = self.ticket, "Entry expired");
        } else {
            trace!(ticket = self.ticket, "Entry already gone at deadline");
        }
    }
}
