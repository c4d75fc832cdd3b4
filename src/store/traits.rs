use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::records::{Lesson, MutationKind, PendingMutation, Progress, UserSnapshot};

#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying engine could not be opened (bad path, quota, disabled
    /// by host). Fatal for the calling operation.
    #[error("storage engine unavailable: {0}")]
    Unavailable(String),
    /// A backend operation failed after the engine was opened.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Accessor contract for the four record collections.
///
/// Absence of a keyed record is never an error: lookups return `Ok(None)`
/// and deletes of missing keys return `Ok(())`. All mutations are atomic at
/// single-record granularity; `put_progress` additionally couples the write
/// with its queue entry as one logical step.
///
/// Asynchronous operations on the same key issued concurrently have no
/// ordering guarantee beyond last-commit-wins; await the first write before
/// relying on read-after-write.
#[async_trait]
pub trait DurableStore: Send + Sync {
    // --- Lessons ---

    /// Upsert a lesson by id. Stamps `downloaded_at` and `last_accessed` to
    /// now (overwrite semantics: re-downloading resets `downloaded_at`).
    async fn put_lesson(&self, lesson: &Lesson) -> Result<(), StoreError>;

    /// Fetch a lesson by id. As a side effect schedules a fire-and-forget
    /// `last_accessed` touch that never blocks or fails the read.
    async fn get_lesson(&self, id: i64) -> Result<Option<Lesson>, StoreError>;

    /// All stored lessons, insertion-order stable.
    async fn list_lessons(&self) -> Result<Vec<Lesson>, StoreError>;

    /// Lessons for one subject (equality lookup on the subject index).
    async fn list_lessons_by_subject(&self, subject: &str) -> Result<Vec<Lesson>, StoreError>;

    /// Delete by id; no-op if absent.
    async fn delete_lesson(&self, id: i64) -> Result<(), StoreError>;

    async fn count_lessons(&self) -> Result<u64, StoreError>;

    /// Delete every lesson with `last_accessed` strictly below the cutoff,
    /// via the `last_accessed` index. Returns the number removed.
    async fn prune_lessons_older_than(&self, cutoff: i64) -> Result<u64, StoreError>;

    // --- Progress ---

    /// Upsert progress keyed by `(user_id, lesson_id)`, stamping
    /// `last_updated`, and append exactly one `progress` queue entry carrying
    /// the stamped record. Both happen or neither does.
    async fn put_progress(&self, progress: &Progress) -> Result<(), StoreError>;

    async fn get_progress(&self, user_id: &str, lesson_id: i64)
        -> Result<Option<Progress>, StoreError>;

    async fn list_progress_for_user(&self, user_id: &str) -> Result<Vec<Progress>, StoreError>;

    // --- Users ---

    /// Upsert a user snapshot, stamping `last_synced`.
    async fn put_user(&self, user: &UserSnapshot) -> Result<(), StoreError>;

    async fn get_user(&self, id: &str) -> Result<Option<UserSnapshot>, StoreError>;

    // --- Sync queue ---

    async fn enqueue_mutation(&self, kind: MutationKind, payload: Value)
        -> Result<(), StoreError>;

    /// Snapshot of the whole queue in enqueue order. Does not remove entries;
    /// entries added after the snapshot are not included.
    async fn drain_queue(&self) -> Result<Vec<PendingMutation>, StoreError>;

    /// Remove all queue entries unconditionally.
    async fn clear_queue(&self) -> Result<(), StoreError>;

    /// Remove one queue entry by sequence id; no-op if absent.
    async fn remove_mutation(&self, id: i64) -> Result<(), StoreError>;

    // --- Storage accounting ---

    /// `(used_bytes, available_bytes)` from the host, or `(0, 0)` when the
    /// backend has no estimation capability. Never errors.
    async fn storage_estimate(&self) -> (u64, u64) {
        (0, 0)
    }
}
