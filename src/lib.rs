//! # BurnKV - A Consume-Once In-Memory Key-Value Store
//!
//! BurnKV is a concurrent, in-memory key-value store in which every value
//! disappears either the first time it is read, or when its time-to-live
//! elapses, whichever happens first. It fits one-time tokens, pending
//! handshake state, and short-lived correlation data: values that must never
//! be observed twice and must never linger if nobody claims them.
//!
//! ## Features
//!
//! - **Read Once**: `get` atomically removes the value it returns
//! - **TTL Expiry**: each entry gets a watcher task that evicts it on timeout
//! - **High Concurrency**: sharded storage with RwLock for concurrent access
//! - **Safe Replacement**: a stale watcher never evicts a newer value under the same key
//! - **Clean Teardown**: dropping the store cancels all pending watchers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              BurnKV                                     │
//! │                                                                         │
//! │   put(k, v) ───┐        get(k) ───┐           remove(k) ───┐            │
//! │                ▼                  ▼                        ▼            │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                          TtlStore                                │  │
//! │  │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐                     │  │
//! │  │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │                     │  │
//! │  │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │                     │  │
//! │  │  └────────┘ └────────┘ └────────┘ └────────┘                     │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                ▲                                                        │
//! │                │ cancel on get/remove/replace, expire on deadline       │
//! │  ┌─────────────┴───────────────────────────────────────────────────┐   │
//! │  │             ExpiryWatcher (one Tokio task per entry)            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use burnkv::TtlStore;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Values live for at most five minutes
//!     let store = TtlStore::with_ttl(Duration::from_secs(300));
//!
//!     store.put("reset-token:42".to_string(), "a9f3c1".to_string());
//!
//!     // The first reader claims it
//!     assert_eq!(store.get("reset-token:42").as_deref(), Some("a9f3c1"));
//!
//!     // Every later reader sees nothing
//!     assert_eq!(store.get("reset-token:42"), None);
//! }
//! ```
//!
//! ## Runtime
//!
//! Watchers are Tokio tasks. [`TtlStore::new`], [`TtlStore::with_ttl`] and
//! [`TtlStore::with_config`] capture the current runtime; use
//! [`TtlStore::with_handle`] to build a store from plain threads, or
//! [`TtlStore::try_with_config`] to get a [`StoreError`] instead of a panic.
//!
//! ## Module Overview
//!
//! - [`storage`]: The store, its configuration, and the expiry watchers

pub mod storage;

// Re-export commonly used types for convenience
pub use storage::{StoreConfig, StoreError, StoreStats, TtlStore, DEFAULT_SHARDS, DEFAULT_TTL};

/// Version of BurnKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
