//! Filesystem cache for lesson media.
//!
//! Media referenced from lesson content (videos, mostly) is fetched
//! opportunistically during [`download_lesson`] and kept as flat files named
//! `lesson-{id}-{label}`. A missing or failed cache entry only means the
//! media plays from the network next time; lesson data is unaffected.
//!
//! [`download_lesson`]: crate::engine::SyncEngine::download_lesson

use std::path::{Path, PathBuf};

/// Flat-file media cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct MediaCache {
    dir: PathBuf,
}

impl MediaCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache path for a lesson's media entry.
    #[must_use]
    pub fn path_for(&self, lesson_id: i64, label: &str) -> PathBuf {
        self.dir.join(format!("lesson-{lesson_id}-{label}"))
    }

    /// Store one media blob, creating the cache directory on first use.
    pub async fn save(
        &self,
        lesson_id: i64,
        label: &str,
        bytes: &[u8],
    ) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(lesson_id, label);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Whether a cached entry exists for this lesson/label.
    pub async fn contains(&self, lesson_id: i64, label: &str) -> bool {
        tokio::fs::try_exists(self.path_for(lesson_id, label))
            .await
            .unwrap_or(false)
    }

    /// Remove a cached entry; no-op if absent.
    pub async fn remove(&self, lesson_id: i64, label: &str) -> std::io::Result<()> {
        match tokio::fs::remove_file(self.path_for(lesson_id, label)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
