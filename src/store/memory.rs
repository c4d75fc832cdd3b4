use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};

use super::traits::{DurableStore, StoreError};
use crate::records::{now_millis, Lesson, MutationKind, PendingMutation, Progress, UserSnapshot};

/// In-memory durable store.
///
/// Same contract as [`super::SqlStore`] minus persistence. Used by tests and
/// by embedders that want an ephemeral cache.
pub struct MemoryStore {
    lessons: DashMap<i64, Lesson>,
    progress: DashMap<(String, i64), Progress>,
    users: DashMap<String, UserSnapshot>,
    queue: Mutex<Vec<PendingMutation>>,
    next_queue_id: AtomicI64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lessons: DashMap::new(),
            progress: DashMap::new(),
            users: DashMap::new(),
            queue: Mutex::new(Vec::new()),
            next_queue_id: AtomicI64::new(1),
        }
    }

    /// Current queue length
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Force a lesson's `last_accessed` timestamp, for staleness tests.
    #[cfg(test)]
    pub(crate) fn backdate_lesson(&self, id: i64, last_accessed: i64) {
        if let Some(mut entry) = self.lessons.get_mut(&id) {
            entry.last_accessed = last_accessed;
        }
    }

    fn push_queue_entry(&self, kind: MutationKind, payload: Value) {
        let entry = PendingMutation {
            id: self.next_queue_id.fetch_add(1, Ordering::SeqCst),
            kind,
            payload,
            enqueued_at: now_millis(),
            retries: 0,
        };
        self.queue.lock().push(entry);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn put_lesson(&self, lesson: &Lesson) -> Result<(), StoreError> {
        let now = now_millis();
        let mut stamped = lesson.clone();
        stamped.downloaded_at = now;
        stamped.last_accessed = now;
        self.lessons.insert(stamped.id, stamped);
        Ok(())
    }

    async fn get_lesson(&self, id: i64) -> Result<Option<Lesson>, StoreError> {
        // Touch is inline here; there is no I/O to defer.
        if let Some(mut entry) = self.lessons.get_mut(&id) {
            let snapshot = entry.clone();
            entry.last_accessed = now_millis();
            return Ok(Some(snapshot));
        }
        Ok(None)
    }

    async fn list_lessons(&self) -> Result<Vec<Lesson>, StoreError> {
        let mut all: Vec<Lesson> = self.lessons.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|lesson| lesson.id);
        Ok(all)
    }

    async fn list_lessons_by_subject(&self, subject: &str) -> Result<Vec<Lesson>, StoreError> {
        let mut matching: Vec<Lesson> = self
            .lessons
            .iter()
            .filter(|r| r.value().subject == subject)
            .map(|r| r.value().clone())
            .collect();
        matching.sort_by_key(|lesson| lesson.id);
        Ok(matching)
    }

    async fn delete_lesson(&self, id: i64) -> Result<(), StoreError> {
        self.lessons.remove(&id);
        Ok(())
    }

    async fn count_lessons(&self) -> Result<u64, StoreError> {
        Ok(self.lessons.len() as u64)
    }

    async fn prune_lessons_older_than(&self, cutoff: i64) -> Result<u64, StoreError> {
        let stale: Vec<i64> = self
            .lessons
            .iter()
            .filter(|r| r.value().last_accessed < cutoff)
            .map(|r| *r.key())
            .collect();
        let removed = stale.len() as u64;
        for id in stale {
            self.lessons.remove(&id);
        }
        Ok(removed)
    }

    async fn put_progress(&self, progress: &Progress) -> Result<(), StoreError> {
        let mut stamped = progress.clone();
        stamped.last_updated = now_millis();

        let payload = serde_json::to_value(&stamped)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let key = (stamped.user_id.clone(), stamped.lesson_id);
        self.progress.insert(key, stamped);
        self.push_queue_entry(MutationKind::Progress, payload);
        Ok(())
    }

    async fn get_progress(
        &self,
        user_id: &str,
        lesson_id: i64,
    ) -> Result<Option<Progress>, StoreError> {
        let key = (user_id.to_string(), lesson_id);
        Ok(self.progress.get(&key).map(|r| r.value().clone()))
    }

    async fn list_progress_for_user(&self, user_id: &str) -> Result<Vec<Progress>, StoreError> {
        let mut all: Vec<Progress> = self
            .progress
            .iter()
            .filter(|r| r.value().user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        all.sort_by_key(|p| p.lesson_id);
        Ok(all)
    }

    async fn put_user(&self, user: &UserSnapshot) -> Result<(), StoreError> {
        let mut stamped = user.clone();
        stamped.last_synced = now_millis();
        self.users.insert(stamped.id.clone(), stamped);
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserSnapshot>, StoreError> {
        Ok(self.users.get(id).map(|r| r.value().clone()))
    }

    async fn enqueue_mutation(&self, kind: MutationKind, payload: Value)
        -> Result<(), StoreError>
    {
        self.push_queue_entry(kind, payload);
        Ok(())
    }

    async fn drain_queue(&self) -> Result<Vec<PendingMutation>, StoreError> {
        Ok(self.queue.lock().clone())
    }

    async fn clear_queue(&self) -> Result<(), StoreError> {
        self.queue.lock().clear();
        Ok(())
    }

    async fn remove_mutation(&self, id: i64) -> Result<(), StoreError> {
        self.queue.lock().retain(|entry| entry.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_lesson(id: i64, subject: &str) -> Lesson {
        Lesson::new(id, format!("Lesson {id}"), subject, json!({"body": "text"}))
    }

    #[tokio::test]
    async fn test_put_and_get_lesson() {
        let store = MemoryStore::new();
        store.put_lesson(&test_lesson(1, "Mathematics")).await.unwrap();

        let lesson = store.get_lesson(1).await.unwrap().unwrap();
        assert_eq!(lesson.id, 1);
        assert_eq!(lesson.subject, "Mathematics");
        assert!(lesson.downloaded_at > 0);
    }

    #[tokio::test]
    async fn test_get_nonexistent_returns_none() {
        let store = MemoryStore::new();
        assert!(store.get_lesson(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_touches_last_accessed() {
        let store = MemoryStore::new();
        store.put_lesson(&test_lesson(1, "Science")).await.unwrap();

        let before = store.get_lesson(1).await.unwrap().unwrap().last_accessed;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.get_lesson(1).await.unwrap();

        let after = store.get_lesson(1).await.unwrap().unwrap().last_accessed;
        assert!(after >= before);
    }

    #[tokio::test]
    async fn test_redownload_resets_downloaded_at() {
        let store = MemoryStore::new();
        store.put_lesson(&test_lesson(1, "Science")).await.unwrap();
        let first = store.get_lesson(1).await.unwrap().unwrap().downloaded_at;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.put_lesson(&test_lesson(1, "Science")).await.unwrap();
        let second = store.get_lesson(1).await.unwrap().unwrap().downloaded_at;

        assert!(second >= first);
    }

    #[tokio::test]
    async fn test_delete_lesson_is_idempotent() {
        let store = MemoryStore::new();
        store.put_lesson(&test_lesson(1, "Science")).await.unwrap();

        store.delete_lesson(1).await.unwrap();
        assert!(store.get_lesson(1).await.unwrap().is_none());

        // Absent id: still Ok
        store.delete_lesson(1).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_by_subject() {
        let store = MemoryStore::new();
        store.put_lesson(&test_lesson(1, "Mathematics")).await.unwrap();
        store.put_lesson(&test_lesson(2, "Science")).await.unwrap();
        store.put_lesson(&test_lesson(3, "Mathematics")).await.unwrap();

        let math = store.list_lessons_by_subject("Mathematics").await.unwrap();
        assert_eq!(math.len(), 2);
        assert!(math.iter().all(|l| l.subject == "Mathematics"));
    }

    #[tokio::test]
    async fn test_put_progress_enqueues_exactly_one_entry() {
        let store = MemoryStore::new();
        let progress = Progress {
            user_id: "u1".into(),
            lesson_id: 1,
            progress: 50,
            completed: false,
            last_updated: 0,
        };

        store.put_progress(&progress).await.unwrap();
        assert_eq!(store.queue_len(), 1);

        let queue = store.drain_queue().await.unwrap();
        assert_eq!(queue[0].kind, MutationKind::Progress);
        assert_eq!(queue[0].payload["user_id"], "u1");
        // Payload carries the stamped timestamp, not the caller's zero
        assert!(queue[0].payload["last_updated"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_progress_last_write_wins() {
        let store = MemoryStore::new();
        let mut progress = Progress {
            user_id: "u1".into(),
            lesson_id: 1,
            progress: 50,
            completed: false,
            last_updated: 0,
        };
        store.put_progress(&progress).await.unwrap();

        progress.progress = 100;
        progress.completed = true;
        store.put_progress(&progress).await.unwrap();

        let stored = store.get_progress("u1", 1).await.unwrap().unwrap();
        assert_eq!(stored.progress, 100);
        assert!(stored.completed);
        // Two writes, two queue entries
        assert_eq!(store.queue_len(), 2);
    }

    #[tokio::test]
    async fn test_drain_queue_does_not_remove() {
        let store = MemoryStore::new();
        store.enqueue_mutation(MutationKind::User, json!({"id": "u1"})).await.unwrap();

        let first = store.drain_queue().await.unwrap();
        let second = store.drain_queue().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_queue() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.enqueue_mutation(MutationKind::User, json!({"i": i})).await.unwrap();
        }

        store.clear_queue().await.unwrap();
        assert!(store.drain_queue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_single_mutation() {
        let store = MemoryStore::new();
        store.enqueue_mutation(MutationKind::User, json!({"i": 1})).await.unwrap();
        store.enqueue_mutation(MutationKind::User, json!({"i": 2})).await.unwrap();

        let queue = store.drain_queue().await.unwrap();
        store.remove_mutation(queue[0].id).await.unwrap();

        let remaining = store.drain_queue().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, queue[1].id);
    }

    #[tokio::test]
    async fn test_queue_ids_are_monotonic() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store.enqueue_mutation(MutationKind::Progress, json!({"i": i})).await.unwrap();
        }

        let queue = store.drain_queue().await.unwrap();
        assert!(queue.windows(2).all(|pair| pair[0].id < pair[1].id));
    }

    #[tokio::test]
    async fn test_put_and_get_user() {
        let store = MemoryStore::new();
        let user = UserSnapshot {
            id: "u1".into(),
            name: "Gurpreet".into(),
            role: crate::records::Role::Student,
            profile: json!({"grade": 8}),
            last_synced: 0,
        };

        store.put_user(&user).await.unwrap();

        let stored = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(stored.name, "Gurpreet");
        assert!(stored.last_synced > 0);
        assert!(store.get_user("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_respects_cutoff() {
        let store = MemoryStore::new();
        for id in 1..=4 {
            store.put_lesson(&test_lesson(id, "Science")).await.unwrap();
        }
        // Backdate lessons 1 and 2
        store.lessons.get_mut(&1).unwrap().last_accessed = 100;
        store.lessons.get_mut(&2).unwrap().last_accessed = 200;

        let removed = store.prune_lessons_older_than(500).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get_lesson(1).await.unwrap().is_none());
        assert!(store.get_lesson(2).await.unwrap().is_none());
        assert!(store.get_lesson(3).await.unwrap().is_some());
        assert!(store.get_lesson(4).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_storage_estimate_defaults_to_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.storage_estimate().await, (0, 0));
    }

    #[tokio::test]
    async fn test_list_progress_for_user_filters() {
        let store = MemoryStore::new();
        for (user, lesson) in [("u1", 1), ("u1", 2), ("u2", 1)] {
            store
                .put_progress(&Progress {
                    user_id: user.into(),
                    lesson_id: lesson,
                    progress: 10,
                    completed: false,
                    last_updated: 0,
                })
                .await
                .unwrap();
        }

        let u1 = store.list_progress_for_user("u1").await.unwrap();
        assert_eq!(u1.len(), 2);
        assert!(u1.iter().all(|p| p.user_id == "u1"));
    }
}
