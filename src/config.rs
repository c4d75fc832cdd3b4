//! Configuration for the sync core.
//!
//! # Example
//!
//! ```
//! use lesson_sync::SyncConfig;
//!
//! // Minimal config (uses defaults)
//! let config = SyncConfig::default();
//! assert_eq!(config.sync_interval_secs, 300); // 5 minutes
//!
//! // Full config
//! let config = SyncConfig {
//!     api_base_url: "https://classroom.example/api".into(),
//!     database_url: Some("sqlite://lessons.db?mode=rwc".into()),
//!     retention_days: 14,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;
use std::path::PathBuf;

/// Configuration for the sync core.
///
/// All fields have sensible defaults. At minimum, point `api_base_url` at the
/// remote collaborator and `database_url` at a writable SQLite location.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the remote API (e.g., "https://classroom.example/api")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Durable store connection string (e.g., "sqlite://lessons.db?mode=rwc").
    /// `None` means the caller wires up a store directly (tests, embedding).
    #[serde(default)]
    pub database_url: Option<String>,

    /// Directory for cached lesson media. `None` disables media caching.
    #[serde(default)]
    pub media_dir: Option<PathBuf>,

    /// Periodic sync interval in seconds (default: 5 minutes)
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Per-item push attempts before giving up on a queue entry
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    /// Initial backoff between push attempts, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Lessons unread for this many days are removed by `cleanup_storage`
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Queue purge policy after a push phase.
    ///
    /// `true` (default) clears the whole queue even when some items failed,
    /// matching the historical behavior: failed items are lost rather than
    /// retried on the next pass. `false` removes only entries that pushed
    /// successfully, leaving failures queued for the next pass.
    #[serde(default = "default_purge_failed_mutations")]
    pub purge_failed_mutations: bool,
}

fn default_api_base_url() -> String { "http://127.0.0.1:8080/api".to_string() }
fn default_sync_interval_secs() -> u64 { 300 } // 5 minutes
fn default_retry_attempts() -> usize { 3 }
fn default_retry_delay_ms() -> u64 { 1000 }
fn default_retention_days() -> u32 { 30 }
fn default_purge_failed_mutations() -> bool { true }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            database_url: None,
            media_dir: None,
            sync_interval_secs: default_sync_interval_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            retention_days: default_retention_days(),
            purge_failed_mutations: default_purge_failed_mutations(),
        }
    }
}
