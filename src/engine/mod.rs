// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync protocol engine.
//!
//! The [`SyncEngine`] reconciles local and remote state. It owns no records
//! itself; everything goes through the durable store's accessor contract.
//!
//! A sync pass is always push-then-pull:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │ Push phase                                          │
//! │  • snapshot the pending-mutation queue              │
//! │  • dispatch each entry independently (bounded       │
//! │    per-item retry, continue on error)               │
//! │  • purge the queue per the configured policy        │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │ Pull phase                                          │
//! │  • one GET /sync request                            │
//! │  • upsert returned lessons and user snapshot        │
//! │  • failure is logged, never fails the pass          │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! [`download_lesson`](SyncEngine::download_lesson) is a separate,
//! user-triggered operation outside the periodic pass.

mod accounting;
mod pass;

pub use accounting::StorageInfo;
pub use pass::PassSummary;

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::media::MediaCache;
use crate::records::Lesson;
use crate::remote::{RemoteApi, SyncError};
use crate::store::DurableStore;

/// Protocol engine over one durable store and one remote collaborator.
///
/// Construct once at the application's composition root and share via
/// [`Arc`]; the scheduler drives it autonomously while UI collaborators call
/// [`download_lesson`](Self::download_lesson) and the accounting methods
/// directly.
pub struct SyncEngine {
    pub(crate) store: Arc<dyn DurableStore>,
    pub(crate) remote: Arc<dyn RemoteApi>,
    pub(crate) connectivity: ConnectivityMonitor,
    pub(crate) media: Option<MediaCache>,
    pub(crate) config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn DurableStore>,
        remote: Arc<dyn RemoteApi>,
        connectivity: ConnectivityMonitor,
        config: SyncConfig,
    ) -> Self {
        let media = config.media_dir.clone().map(MediaCache::new);
        Self {
            store,
            remote,
            connectivity,
            media,
            config,
        }
    }

    /// The durable store, for UI collaborators reading records directly.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    /// Current connectivity flag.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Download one lesson for offline use.
    ///
    /// Fails immediately with [`SyncError::Offline`] when disconnected,
    /// before any network I/O; the store is left untouched. Embedded media
    /// is fetched opportunistically afterwards - a media failure is logged
    /// and the download still succeeds.
    #[tracing::instrument(skip(self), fields(lesson_id = id))]
    pub async fn download_lesson(&self, id: i64) -> Result<Lesson, SyncError> {
        if !self.connectivity.is_online() {
            crate::metrics::record_download("offline");
            return Err(SyncError::Offline);
        }

        let lesson = match self.remote.download_lesson(id).await {
            Ok(lesson) => lesson,
            Err(e) => {
                crate::metrics::record_download("error");
                return Err(e);
            }
        };

        self.store.put_lesson(&lesson).await?;
        self.cache_media(&lesson).await;

        crate::metrics::record_download("success");
        Ok(lesson)
    }

    /// Whether a lesson is available offline.
    pub async fn is_lesson_offline(&self, id: i64) -> Result<bool, SyncError> {
        Ok(self.store.get_lesson(id).await?.is_some())
    }

    async fn cache_media(&self, lesson: &Lesson) {
        let Some(ref media) = self.media else {
            return;
        };
        let Some(url) = lesson.video_url() else {
            return;
        };

        match self.remote.fetch_media(url).await {
            Ok(bytes) => match media.save(lesson.id, "video", &bytes).await {
                Ok(path) => debug!(path = %path.display(), "Cached lesson media"),
                Err(e) => warn!(error = %e, url, "Failed to write media cache"),
            },
            Err(e) => warn!(error = %e, url, "Failed to fetch lesson media"),
        }
    }
}
