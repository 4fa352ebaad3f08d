// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Cartwise Store
//!
//! Offline-first persistence for the Cartwise shopping list engine.
//!
//! This crate provides:
//!
//! - **Store**: lists, items, product statistics, budgets and settings over a
//!   primary engine, with fallback reads and queued writes
//! - **Engines**: SQLite on disk, or an in-memory engine
//! - **ChangeNotifier**: per-topic change events emitted by every mutation
//! - **OfflineQueue**: durable FIFO of writes awaiting replay
//! - **LiveQuery**: reads that re-run when their inputs or topic change
//! - **Persistence**: File I/O helpers for JSON data
//!
//! ## Usage
//!
//! ```ignore
//! use cartwise_store::{ChangeTopic, LiveQuery, Store, StoreConfig};
//! use cartwise_core::NewList;
//! use futures::FutureExt;
//! use std::sync::Arc;
//!
//! let store = Arc::new(Store::open(&StoreConfig::default()).await?);
//!
//! let reader = Arc::clone(&store);
//! let lists = LiveQuery::new((), move |_| {
//!     let store = Arc::clone(&reader);
//!     async move { Ok(store.lists().await) }.boxed()
//! })
//! .watching(store.notifier(), ChangeTopic::Lists);
//! lists.activate();
//!
//! store.create_list(NewList::named("Weekly Groceries")).await;
//!
//! let mut rx = lists.subscribe();
//! while rx.changed().await.is_ok() {
//!     println!("{} lists", rx.borrow().data.as_ref().map_or(0, Vec::len));
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod kv;
pub mod live_query;
pub mod notifier;
pub mod persistence;
pub mod queue;
pub mod store;

pub use config::{RetryPolicy, StoreConfig};
pub use engine::{Collection, MemoryEngine, SCHEMA_VERSION, SqliteEngine, StorageEngine};
pub use error::StoreError;
pub use kv::KvStore;
pub use live_query::{LiveQuery, QueryFn, QueryState};
pub use notifier::{ChangeAction, ChangeEvent, ChangeNotifier, ChangeTopic, SubscriptionId};
pub use persistence::{
    default_config_dir, default_config_path, default_data_dir, ensure_dir, load_json,
    load_json_or_default, save_json,
};
pub use queue::OfflineQueue;
pub use store::{ReplayReport, Store, WriteOutcome};

#[cfg(test)]
mod persistence_tests;
