//! Storage Module
//!
//! This module provides the core storage functionality for BurnKV.
//! It includes a thread-safe, sharded key-value store whose values are
//! consumed on first read, and the per-entry watchers that expire values
//! nobody claimed.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TtlStore                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ expire(key, ticket)
//!              ┌─────────────┴─────────────┐
//!              │  ExpiryWatcher per entry  │
//!              │     (Tokio task each)     │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Sharded Storage**: 64 independent shards reduce lock contention
//! - **Consume Once**: `get` removes the value it returns
//! - **TTL Expiry**: unclaimed values are evicted by their watcher
//! - **Identity-Safe Eviction**: a watcher only evicts the entry it was created for
//! - **Teardown**: dropping the store cancels every pending watcher
//!
//! ## Example
//!
//! ```
//! use burnkv::storage::{StoreConfig, TtlStore};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = TtlStore::with_config(StoreConfig::default().with_ttl(Duration::from_secs(10)));
//!
//! store.put("nonce".to_string(), 42u64);
//! assert_eq!(store.get("nonce"), Some(42));
//! assert_eq!(store.get("nonce"), None);
//! # }
//! ```

pub mod engine;
pub(crate) mod expiry;

// Re-export commonly used types
pub use engine::{StoreConfig, StoreError, StoreStats, TtlStore, DEFAULT_SHARDS, DEFAULT_TTL};
