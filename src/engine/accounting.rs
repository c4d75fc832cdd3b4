// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Storage accounting and the staleness cleanup policy.

use serde::Serialize;
use tracing::info;

use super::SyncEngine;
use crate::metrics;
use crate::records::now_millis;
use crate::remote::SyncError;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Local storage usage snapshot.
///
/// Byte figures are best-effort; stores without a backing file report zero
/// for both, and callers should treat `available_bytes == 0` as "unknown"
/// rather than "full".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageInfo {
    pub used_bytes: u64,
    pub available_bytes: u64,
    /// Lessons currently held offline.
    pub lessons: u64,
}

impl SyncEngine {
    /// Best-effort storage usage report.
    pub async fn storage_info(&self) -> Result<StorageInfo, SyncError> {
        let (used_bytes, available_bytes) = self.store.storage_estimate().await;
        let lessons = self.store.count_lessons().await?;
        Ok(StorageInfo {
            used_bytes,
            available_bytes,
            lessons,
        })
    }

    /// Remove lessons not accessed within the configured retention window.
    ///
    /// Progress records are never touched; unsynced progress survives any
    /// cleanup. Returns the number of lessons removed.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup_storage(&self) -> Result<u64, SyncError> {
        let cutoff = now_millis() - i64::from(self.config.retention_days) * MILLIS_PER_DAY;
        let removed = self.store.prune_lessons_older_than(cutoff).await?;

        if removed > 0 {
            metrics::record_pruned_lessons(removed);
            info!(
                removed,
                retention_days = self.config.retention_days,
                "Removed stale offline lessons"
            );
        }
        Ok(removed)
    }
}
