// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Lesson Sync
//!
//! Offline-first data core for a lesson-delivery app aimed at intermittently
//! connected classrooms. Lessons, per-user progress, and user snapshots live
//! in a local durable store; local changes queue while offline and a
//! background scheduler reconciles with the remote API whenever connectivity
//! allows.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SyncScheduler                          │
//! │  • Periodic interval, reconnect, and manual triggers        │
//! │  • One pass at a time; mid-pass triggers are dropped        │
//! │  • Broadcasts Syncing/Synced/Error to UI observers          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SyncEngine                            │
//! │  • Push-then-pull sync pass                                 │
//! │  • User-triggered lesson downloads with media caching       │
//! │  • Storage accounting and staleness cleanup                 │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                         │
//!                    ▼                         ▼
//! ┌───────────────────────────┐  ┌───────────────────────────────┐
//! │       DurableStore        │  │          RemoteApi            │
//! │  • SQLite (production)    │  │  • HTTP (production)          │
//! │  • In-memory (tests)      │  │  • Mock (tests)               │
//! │  • Pending-mutation queue │  │                               │
//! └───────────────────────────┘  └───────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lesson_sync::{
//!     ConnectivityMonitor, HttpRemote, SqlStore, SyncConfig, SyncEngine, SyncScheduler,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SyncConfig {
//!         api_base_url: "https://classroom.example/api".into(),
//!         database_url: Some("sqlite://lessons.db?mode=rwc".into()),
//!         ..Default::default()
//!     };
//!
//!     let store = Arc::new(SqlStore::new("sqlite://lessons.db?mode=rwc"));
//!     let remote = Arc::new(HttpRemote::new(config.api_base_url.clone()));
//!     let connectivity = ConnectivityMonitor::new(true);
//!
//!     let engine = Arc::new(SyncEngine::new(store, remote, connectivity.clone(), config));
//!     let scheduler = Arc::new(SyncScheduler::new(engine.clone()));
//!     let handle = scheduler.spawn();
//!
//!     // Download a lesson for offline use
//!     let lesson = engine.download_lesson(42).await.unwrap();
//!     println!("cached: {}", lesson.title);
//!
//!     // Platform network callbacks drive the monitor
//!     connectivity.set_offline();
//!     connectivity.set_online(true); // wakes the scheduler
//!
//!     scheduler.shutdown();
//!     handle.await.unwrap();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`records`]: Record types (lessons, progress, users, pending mutations)
//! - [`store`]: Durable store trait plus SQLite and in-memory backends
//! - [`connectivity`]: Online/offline flag with change notification
//! - [`engine`]: The push-then-pull protocol engine
//! - [`scheduler`]: Background loop deciding when passes run
//! - [`remote`]: Remote API trait and HTTP implementation
//! - [`media`]: Flat-file cache for lesson media
//! - [`retry`]: Exponential-backoff retry helper

pub mod config;
pub mod connectivity;
pub mod engine;
pub mod media;
pub mod metrics;
pub mod records;
pub mod remote;
pub mod retry;
pub mod scheduler;
pub mod store;

pub use config::SyncConfig;
pub use connectivity::ConnectivityMonitor;
pub use engine::{PassSummary, StorageInfo, SyncEngine};
pub use media::MediaCache;
pub use records::{Lesson, MutationKind, PendingMutation, Progress, Role, UserSnapshot};
pub use remote::{HttpRemote, RemoteApi, SyncError, SyncPayload};
pub use retry::RetryConfig;
pub use scheduler::{SyncScheduler, SyncStatus};
pub use store::{DurableStore, MemoryStore, SqlStore, StoreError};
