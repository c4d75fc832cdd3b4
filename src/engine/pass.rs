// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The push-then-pull sync pass.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::SyncEngine;
use crate::metrics;
use crate::records::{MutationKind, PendingMutation};
use crate::remote::SyncError;
use crate::retry::{retry, RetryConfig};

/// What one sync pass accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Queue entries delivered to the remote.
    pub pushed: usize,
    /// Queue entries that exhausted their retries.
    pub push_failed: usize,
    /// Lessons upserted from the pull response.
    pub pulled_lessons: usize,
    /// Whether the pull response carried a user snapshot.
    pub pulled_user: bool,
}

impl SyncEngine {
    /// Run one full sync pass: push pending mutations, then pull remote
    /// changes.
    ///
    /// Individual push failures and a failed pull phase do not fail the
    /// pass; `Err` means the pass could not be orchestrated at all, which
    /// in practice is a store failure while reading or purging the queue.
    #[tracing::instrument(skip(self))]
    pub async fn sync_pass(&self) -> Result<PassSummary, SyncError> {
        let start = Instant::now();
        let result = self.run_pass().await;
        let elapsed = start.elapsed();

        match &result {
            Ok(summary) => {
                metrics::record_sync_pass("success", elapsed);
                info!(
                    pushed = summary.pushed,
                    push_failed = summary.push_failed,
                    pulled_lessons = summary.pulled_lessons,
                    pulled_user = summary.pulled_user,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Sync pass complete"
                );
            }
            Err(e) => {
                metrics::record_sync_pass("error", elapsed);
                warn!(error = %e, "Sync pass failed");
            }
        }
        result
    }

    async fn run_pass(&self) -> Result<PassSummary, SyncError> {
        let (pushed, push_failed) = self.push_pending().await?;
        let (pulled_lessons, pulled_user) = self.pull_changes().await;
        Ok(PassSummary {
            pushed,
            push_failed,
            pulled_lessons,
            pulled_user,
        })
    }

    /// Push phase. Returns (delivered, failed) counts.
    pub(crate) async fn push_pending(&self) -> Result<(usize, usize), SyncError> {
        let queue = self.store.drain_queue().await?;
        metrics::set_queue_depth(queue.len());

        if queue.is_empty() {
            return Ok((0, 0));
        }

        let mut delivered = Vec::with_capacity(queue.len());
        let mut failed = 0usize;

        for entry in &queue {
            match self.dispatch(entry).await {
                Ok(()) => {
                    metrics::record_push_item(entry.kind.as_str(), "success");
                    delivered.push(entry.id);
                }
                Err(e) => {
                    metrics::record_push_item(entry.kind.as_str(), "error");
                    failed += 1;
                    warn!(
                        error = %e,
                        mutation_id = entry.id,
                        kind = %entry.kind,
                        "Failed to push queued mutation"
                    );
                }
            }
        }

        if self.config.purge_failed_mutations {
            // Faithful to the original behavior: the queue is cleared even
            // when some entries never reached the remote.
            self.store.clear_queue().await?;
            if failed > 0 {
                metrics::record_dropped_mutations(failed as u64);
                warn!(
                    dropped = failed,
                    "Cleared sync queue with undelivered entries; they will not be retried"
                );
            }
        } else {
            for id in &delivered {
                self.store.remove_mutation(*id).await?;
            }
        }

        metrics::set_queue_depth(if self.config.purge_failed_mutations {
            0
        } else {
            failed
        });

        Ok((delivered.len(), failed))
    }

    async fn dispatch(&self, entry: &PendingMutation) -> Result<(), SyncError> {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(self.config.retry_delay_ms),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            max_retries: Some(self.config.retry_attempts.max(1)),
        };

        match entry.kind {
            MutationKind::Progress => {
                retry("push_progress", &config, || {
                    self.remote.push_progress(&entry.payload)
                })
                .await
            }
            MutationKind::User => {
                retry("push_user", &config, || {
                    self.remote.push_user(&entry.payload)
                })
                .await
            }
        }
    }

    /// Pull phase. Never fails the pass; returns (lessons upserted,
    /// user snapshot applied).
    pub(crate) async fn pull_changes(&self) -> (usize, bool) {
        let payload = match self.remote.pull_changes().await {
            Ok(payload) => payload,
            Err(e) => {
                metrics::record_pull("error");
                warn!(error = %e, "Pull phase failed; local records unchanged");
                return (0, false);
            }
        };

        let mut upserted = 0usize;
        for lesson in payload.lessons.unwrap_or_default() {
            match self.store.put_lesson(&lesson).await {
                Ok(()) => upserted += 1,
                Err(e) => warn!(error = %e, lesson_id = lesson.id, "Failed to store pulled lesson"),
            }
        }

        let mut user_applied = false;
        if let Some(user) = payload.user {
            match self.store.put_user(&user).await {
                Ok(()) => user_applied = true,
                Err(e) => warn!(error = %e, user_id = %user.id, "Failed to store pulled user"),
            }
        }

        metrics::record_pull("success");
        (upserted, user_applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityMonitor;
    use crate::engine::test_support::{test_engine, MockRemote};
    use crate::records::{Lesson, Progress, Role, UserSnapshot};
    use crate::remote::SyncPayload;
    use crate::store::DurableStore;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn progress(user_id: &str, lesson_id: i64, pct: u8) -> Progress {
        Progress {
            user_id: user_id.to_string(),
            lesson_id,
            progress: pct,
            completed: pct >= 100,
            last_updated: 0,
        }
    }

    #[tokio::test]
    async fn test_pass_pushes_queued_progress() {
        let remote = Arc::new(MockRemote::new());
        let (engine, store) = test_engine(remote.clone(), ConnectivityMonitor::new(true));

        store.put_progress(&progress("u1", 3, 40)).await.unwrap();
        store.put_progress(&progress("u1", 5, 100)).await.unwrap();

        let summary = engine.sync_pass().await.unwrap();
        assert_eq!(summary.pushed, 2);
        assert_eq!(summary.push_failed, 0);

        let pushed = remote.pushed_progress.lock();
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed[0]["lesson_id"], json!(3));
        assert_eq!(pushed[1]["lesson_id"], json!(5));

        // Queue emptied after the pass
        assert_eq!(store.drain_queue().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_pass_preserves_fifo_order() {
        let remote = Arc::new(MockRemote::new());
        let (engine, store) = test_engine(remote.clone(), ConnectivityMonitor::new(true));

        for lesson_id in 1..=5 {
            store.put_progress(&progress("u1", lesson_id, 10)).await.unwrap();
        }

        engine.sync_pass().await.unwrap();

        let pushed = remote.pushed_progress.lock();
        let ids: Vec<i64> = pushed
            .iter()
            .map(|p| p["lesson_id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_purge_mode_drops_failed_entries() {
        let remote = Arc::new(MockRemote::new());
        remote.fail_progress.store(true, Ordering::SeqCst);

        let (engine, store) = test_engine(remote.clone(), ConnectivityMonitor::new(true));
        store.put_progress(&progress("u1", 3, 40)).await.unwrap();

        let summary = engine.sync_pass().await.unwrap();
        assert_eq!(summary.pushed, 0);
        assert_eq!(summary.push_failed, 1);

        // Default policy clears the queue regardless
        assert_eq!(store.drain_queue().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_keep_failed_mode_retains_undelivered_entries() {
        let remote = Arc::new(MockRemote::new());
        remote.fail_progress.store(true, Ordering::SeqCst);

        let (mut engine, store) = test_engine(remote.clone(), ConnectivityMonitor::new(true));
        engine.config.purge_failed_mutations = false;

        store.put_progress(&progress("u1", 3, 40)).await.unwrap();
        store
            .enqueue_mutation(MutationKind::User, json!({"id": "u1", "name": "Gurpreet"}))
            .await
            .unwrap();

        let summary = engine.sync_pass().await.unwrap();
        assert_eq!(summary.pushed, 1);
        assert_eq!(summary.push_failed, 1);

        // Only the failed progress entry remains
        let remaining = store.drain_queue().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].kind, MutationKind::Progress);

        // Delivering it on the next pass empties the queue
        remote.fail_progress.store(false, Ordering::SeqCst);
        let summary = engine.sync_pass().await.unwrap();
        assert_eq!(summary.pushed, 1);
        assert_eq!(store.drain_queue().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_one_bad_entry_does_not_block_the_rest() {
        let remote = Arc::new(MockRemote::new());
        remote.fail_users.store(true, Ordering::SeqCst);

        let (engine, store) = test_engine(remote.clone(), ConnectivityMonitor::new(true));

        store.put_progress(&progress("u1", 1, 10)).await.unwrap();
        store
            .enqueue_mutation(MutationKind::User, json!({"id": "u1"}))
            .await
            .unwrap();
        store.put_progress(&progress("u1", 2, 20)).await.unwrap();

        let summary = engine.sync_pass().await.unwrap();
        assert_eq!(summary.pushed, 2);
        assert_eq!(summary.push_failed, 1);
        assert_eq!(remote.pushed_progress.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_pull_upserts_lessons_and_user() {
        let remote = Arc::new(MockRemote::new());
        *remote.pull_payload.lock() = Some(SyncPayload {
            lessons: Some(vec![
                Lesson::new(1, "Fractions", "Mathematics", json!({})),
                Lesson::new(2, "Decimals", "Mathematics", json!({})),
            ]),
            user: Some(UserSnapshot {
                id: "u1".to_string(),
                name: "Gurpreet".to_string(),
                role: Role::Student,
                profile: json!({}),
                last_synced: 0,
            }),
        });

        let (engine, store) = test_engine(remote, ConnectivityMonitor::new(true));

        let summary = engine.sync_pass().await.unwrap();
        assert_eq!(summary.pulled_lessons, 2);
        assert!(summary.pulled_user);

        assert_eq!(store.count_lessons().await.unwrap(), 2);
        assert_eq!(store.get_user("u1").await.unwrap().unwrap().name, "Gurpreet");
    }

    #[tokio::test]
    async fn test_pull_failure_does_not_fail_pass() {
        let remote = Arc::new(MockRemote::new());
        *remote.pull_payload.lock() = None;

        let (engine, store) = test_engine(remote.clone(), ConnectivityMonitor::new(true));
        store.put_progress(&progress("u1", 3, 40)).await.unwrap();

        let summary = engine.sync_pass().await.unwrap();
        assert_eq!(summary.pushed, 1);
        assert_eq!(summary.pulled_lessons, 0);
        assert!(!summary.pulled_user);
    }

    #[tokio::test]
    async fn test_empty_queue_pass_is_cheap_and_clean() {
        let remote = Arc::new(MockRemote::new());
        let (engine, _store) = test_engine(remote.clone(), ConnectivityMonitor::new(true));

        let summary = engine.sync_pass().await.unwrap();
        assert_eq!(summary, PassSummary::default());
        assert!(remote.pushed_progress.lock().is_empty());
    }
}
