//! Durable store: typed record collections with secondary indexes.
//!
//! Two backends implement the [`DurableStore`] contract:
//! - [`SqlStore`]: SQLite-backed persistent store (production)
//! - [`MemoryStore`]: process-local store for tests and ephemeral embedding

pub mod traits;
pub mod memory;
pub mod sql;

pub use traits::{DurableStore, StoreError};
pub use memory::MemoryStore;
pub use sql::SqlStore;
