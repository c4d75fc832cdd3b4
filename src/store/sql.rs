// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite storage backend for the durable store.
//!
//! One database per installation holding the four collections:
//!
//! ```sql
//! lessons    (id PK, title, subject, content, downloaded_at, last_accessed)
//!            -- indexes: subject, downloaded_at, last_accessed
//! progress   (user_id, lesson_id) PK, progress, completed, last_updated
//!            -- index: user_id
//! users      (id PK, name, role, profile, last_synced)
//!            -- index: role
//! sync_queue (id PK AUTOINCREMENT, kind, payload, enqueued_at, retries)
//!            -- indexes: enqueued_at, kind
//! ```
//!
//! Opaque payloads (`content`, `profile`, queue `payload`) are stored as JSON
//! text; the store never inspects them. Booleans and the 0-100 progress value
//! are stored as INTEGER for `Any`-driver portability.
//!
//! Initialization is lazy and idempotent: the first operation opens the pool,
//! enables WAL mode, and runs `CREATE TABLE IF NOT EXISTS` for the schema.
//! Subsequent operations reuse the open handle. An engine that cannot open
//! surfaces [`StoreError::Unavailable`] to every caller.

use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::traits::{DurableStore, StoreError};
use crate::records::{
    now_millis, Lesson, MutationKind, PendingMutation, Progress, Role, UserSnapshot,
};
use crate::retry::{retry, RetryConfig};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS lessons (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        subject TEXT NOT NULL,
        content TEXT NOT NULL,
        downloaded_at INTEGER NOT NULL,
        last_accessed INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_lessons_subject ON lessons(subject)",
    "CREATE INDEX IF NOT EXISTS idx_lessons_downloaded_at ON lessons(downloaded_at)",
    "CREATE INDEX IF NOT EXISTS idx_lessons_last_accessed ON lessons(last_accessed)",
    r#"
    CREATE TABLE IF NOT EXISTS progress (
        user_id TEXT NOT NULL,
        lesson_id INTEGER NOT NULL,
        progress INTEGER NOT NULL,
        completed INTEGER NOT NULL,
        last_updated INTEGER NOT NULL,
        PRIMARY KEY (user_id, lesson_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_progress_user ON progress(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        role TEXT NOT NULL,
        profile TEXT NOT NULL,
        last_synced INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
    r#"
    CREATE TABLE IF NOT EXISTS sync_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        payload TEXT NOT NULL,
        enqueued_at INTEGER NOT NULL,
        retries INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_queue_enqueued_at ON sync_queue(enqueued_at)",
    "CREATE INDEX IF NOT EXISTS idx_queue_kind ON sync_queue(kind)",
];

pub struct SqlStore {
    url: String,
    db_path: Option<PathBuf>,
    pool: OnceCell<AnyPool>,
}

impl SqlStore {
    /// Create a store handle. No I/O happens until the first operation.
    ///
    /// Use a URL like `sqlite://lessons.db?mode=rwc` (the `mode=rwc` query
    /// creates the file on first open).
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let db_path = Self::file_path_from_url(&url);
        Self {
            url,
            db_path,
            pool: OnceCell::new(),
        }
    }

    fn file_path_from_url(url: &str) -> Option<PathBuf> {
        let rest = url.strip_prefix("sqlite:")?;
        let rest = rest.strip_prefix("//").unwrap_or(rest);
        let path = rest.split('?').next().unwrap_or_default();
        if path.is_empty() || path == ":memory:" {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }

    /// Open (once) and return the pool. First call connects with startup
    /// retry, enables WAL mode, and creates the schema.
    async fn pool(&self) -> Result<&AnyPool, StoreError> {
        self.pool
            .get_or_try_init(|| async {
                install_drivers();

                let pool = retry("store_open", &RetryConfig::startup(), || async {
                    AnyPoolOptions::new()
                        .max_connections(5)
                        .acquire_timeout(Duration::from_secs(10))
                        .connect(&self.url)
                        .await
                        .map_err(|e| StoreError::Unavailable(e.to_string()))
                })
                .await?;

                // WAL mode: readers don't block the fire-and-forget touch writes
                sqlx::query("PRAGMA journal_mode = WAL")
                    .execute(&pool)
                    .await
                    .map_err(|e| StoreError::Unavailable(format!("WAL mode: {e}")))?;

                for statement in SCHEMA {
                    sqlx::query(statement)
                        .execute(&pool)
                        .await
                        .map_err(|e| StoreError::Unavailable(format!("schema: {e}")))?;
                }

                debug!(url = %self.url, "Durable store opened");
                Ok::<_, StoreError>(pool)
            })
            .await
    }

    fn backend(e: sqlx::Error) -> StoreError {
        StoreError::Backend(e.to_string())
    }

    fn row_to_lesson(row: &sqlx::any::AnyRow) -> Result<Lesson, StoreError> {
        let content_text: String = row.try_get("content").map_err(Self::backend)?;
        let content = serde_json::from_str(&content_text)
            .map_err(|e| StoreError::Backend(format!("corrupt lesson content: {e}")))?;
        Ok(Lesson {
            id: row.try_get("id").map_err(Self::backend)?,
            title: row.try_get("title").map_err(Self::backend)?,
            subject: row.try_get("subject").map_err(Self::backend)?,
            content,
            downloaded_at: row.try_get("downloaded_at").map_err(Self::backend)?,
            last_accessed: row.try_get("last_accessed").map_err(Self::backend)?,
        })
    }

    fn row_to_progress(row: &sqlx::any::AnyRow) -> Result<Progress, StoreError> {
        let progress: i64 = row.try_get("progress").map_err(Self::backend)?;
        let completed: i64 = row.try_get("completed").map_err(Self::backend)?;
        Ok(Progress {
            user_id: row.try_get("user_id").map_err(Self::backend)?,
            lesson_id: row.try_get("lesson_id").map_err(Self::backend)?,
            progress: progress.clamp(0, 100) as u8,
            completed: completed != 0,
            last_updated: row.try_get("last_updated").map_err(Self::backend)?,
        })
    }
}

#[async_trait]
impl DurableStore for SqlStore {
    async fn put_lesson(&self, lesson: &Lesson) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let now = now_millis();
        let content = serde_json::to_string(&lesson.content)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO lessons (id, title, subject, content, downloaded_at, last_accessed)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                subject = excluded.subject,
                content = excluded.content,
                downloaded_at = excluded.downloaded_at,
                last_accessed = excluded.last_accessed
            "#,
        )
        .bind(lesson.id)
        .bind(&lesson.title)
        .bind(&lesson.subject)
        .bind(content)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(Self::backend)?;

        crate::metrics::record_store_operation("lessons", "put", "success");
        Ok(())
    }

    async fn get_lesson(&self, id: i64) -> Result<Option<Lesson>, StoreError> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "SELECT id, title, subject, content, downloaded_at, last_accessed \
             FROM lessons WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Self::backend)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let lesson = Self::row_to_lesson(&row)?;

        // Fire-and-forget last_accessed touch; a failure is logged and never
        // reaches the reader.
        let touch_pool = pool.clone();
        tokio::spawn(async move {
            let result = sqlx::query("UPDATE lessons SET last_accessed = ? WHERE id = ?")
                .bind(now_millis())
                .bind(id)
                .execute(&touch_pool)
                .await;
            if let Err(e) = result {
                warn!(error = %e, lesson_id = id, "last_accessed touch failed");
            }
        });

        Ok(Some(lesson))
    }

    async fn list_lessons(&self) -> Result<Vec<Lesson>, StoreError> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT id, title, subject, content, downloaded_at, last_accessed \
             FROM lessons ORDER BY id",
        )
        .fetch_all(pool)
        .await
        .map_err(Self::backend)?;

        rows.iter().map(Self::row_to_lesson).collect()
    }

    async fn list_lessons_by_subject(&self, subject: &str) -> Result<Vec<Lesson>, StoreError> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT id, title, subject, content, downloaded_at, last_accessed \
             FROM lessons WHERE subject = ? ORDER BY id",
        )
        .bind(subject)
        .fetch_all(pool)
        .await
        .map_err(Self::backend)?;

        rows.iter().map(Self::row_to_lesson).collect()
    }

    async fn delete_lesson(&self, id: i64) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query("DELETE FROM lessons WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(Self::backend)?;
        crate::metrics::record_store_operation("lessons", "delete", "success");
        Ok(())
    }

    async fn count_lessons(&self) -> Result<u64, StoreError> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT COUNT(*) AS n FROM lessons")
            .fetch_one(pool)
            .await
            .map_err(Self::backend)?;
        let count: i64 = row.try_get("n").map_err(Self::backend)?;
        Ok(count as u64)
    }

    async fn prune_lessons_older_than(&self, cutoff: i64) -> Result<u64, StoreError> {
        let pool = self.pool().await?;
        // Bounded scan over idx_lessons_last_accessed
        let result = sqlx::query("DELETE FROM lessons WHERE last_accessed < ?")
            .bind(cutoff)
            .execute(pool)
            .await
            .map_err(Self::backend)?;
        crate::metrics::record_store_operation("lessons", "prune", "success");
        Ok(result.rows_affected())
    }

    async fn put_progress(&self, progress: &Progress) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let mut stamped = progress.clone();
        stamped.last_updated = now_millis();

        let payload = serde_json::to_string(&stamped)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        // Record write and queue append are one logical step
        let mut tx = pool.begin().await.map_err(Self::backend)?;

        sqlx::query(
            r#"
            INSERT INTO progress (user_id, lesson_id, progress, completed, last_updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                progress = excluded.progress,
                completed = excluded.completed,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&stamped.user_id)
        .bind(stamped.lesson_id)
        .bind(stamped.progress as i64)
        .bind(stamped.completed as i64)
        .bind(stamped.last_updated)
        .execute(&mut *tx)
        .await
        .map_err(Self::backend)?;

        sqlx::query(
            "INSERT INTO sync_queue (kind, payload, enqueued_at, retries) VALUES (?, ?, ?, 0)",
        )
        .bind(MutationKind::Progress.as_str())
        .bind(payload)
        .bind(stamped.last_updated)
        .execute(&mut *tx)
        .await
        .map_err(Self::backend)?;

        tx.commit().await.map_err(Self::backend)?;
        crate::metrics::record_store_operation("progress", "put", "success");
        Ok(())
    }

    async fn get_progress(
        &self,
        user_id: &str,
        lesson_id: i64,
    ) -> Result<Option<Progress>, StoreError> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "SELECT user_id, lesson_id, progress, completed, last_updated \
             FROM progress WHERE user_id = ? AND lesson_id = ?",
        )
        .bind(user_id)
        .bind(lesson_id)
        .fetch_optional(pool)
        .await
        .map_err(Self::backend)?;

        row.as_ref().map(Self::row_to_progress).transpose()
    }

    async fn list_progress_for_user(&self, user_id: &str) -> Result<Vec<Progress>, StoreError> {
        let pool = self.pool().await?;
        // Equality lookup over idx_progress_user
        let rows = sqlx::query(
            "SELECT user_id, lesson_id, progress, completed, last_updated \
             FROM progress WHERE user_id = ? ORDER BY lesson_id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(Self::backend)?;

        rows.iter().map(Self::row_to_progress).collect()
    }

    async fn put_user(&self, user: &UserSnapshot) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let now = now_millis();
        let profile = serde_json::to_string(&user.profile)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, role, profile, last_synced)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                role = excluded.role,
                profile = excluded.profile,
                last_synced = excluded.last_synced
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.role.to_string())
        .bind(profile)
        .bind(now)
        .execute(pool)
        .await
        .map_err(Self::backend)?;

        crate::metrics::record_store_operation("users", "put", "success");
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserSnapshot>, StoreError> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "SELECT id, name, role, profile, last_synced FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Self::backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role_text: String = row.try_get("role").map_err(Self::backend)?;
        let role: Role = role_text
            .parse()
            .map_err(|e: String| StoreError::Backend(e))?;
        let profile_text: String = row.try_get("profile").map_err(Self::backend)?;
        let profile = serde_json::from_str(&profile_text)
            .map_err(|e| StoreError::Backend(format!("corrupt profile: {e}")))?;

        Ok(Some(UserSnapshot {
            id: row.try_get("id").map_err(Self::backend)?,
            name: row.try_get("name").map_err(Self::backend)?,
            role,
            profile,
            last_synced: row.try_get("last_synced").map_err(Self::backend)?,
        }))
    }

    async fn enqueue_mutation(
        &self,
        kind: MutationKind,
        payload: serde_json::Value,
    ) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let payload = serde_json::to_string(&payload)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            "INSERT INTO sync_queue (kind, payload, enqueued_at, retries) VALUES (?, ?, ?, 0)",
        )
        .bind(kind.as_str())
        .bind(payload)
        .bind(now_millis())
        .execute(pool)
        .await
        .map_err(Self::backend)?;

        crate::metrics::record_store_operation("queue", "put", "success");
        Ok(())
    }

    async fn drain_queue(&self) -> Result<Vec<PendingMutation>, StoreError> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT id, kind, payload, enqueued_at, retries FROM sync_queue ORDER BY id",
        )
        .fetch_all(pool)
        .await
        .map_err(Self::backend)?;

        rows.iter()
            .map(|row| {
                let kind_text: String = row.try_get("kind").map_err(Self::backend)?;
                let kind: MutationKind = kind_text
                    .parse()
                    .map_err(|e: String| StoreError::Backend(e))?;
                let payload_text: String = row.try_get("payload").map_err(Self::backend)?;
                let payload = serde_json::from_str(&payload_text)
                    .map_err(|e| StoreError::Backend(format!("corrupt payload: {e}")))?;
                let retries: i64 = row.try_get("retries").map_err(Self::backend)?;
                Ok(PendingMutation {
                    id: row.try_get("id").map_err(Self::backend)?,
                    kind,
                    payload,
                    enqueued_at: row.try_get("enqueued_at").map_err(Self::backend)?,
                    retries: retries as u32,
                })
            })
            .collect()
    }

    async fn clear_queue(&self) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query("DELETE FROM sync_queue")
            .execute(pool)
            .await
            .map_err(Self::backend)?;
        crate::metrics::record_store_operation("queue", "clear", "success");
        Ok(())
    }

    async fn remove_mutation(&self, id: i64) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(Self::backend)?;
        Ok(())
    }

    async fn storage_estimate(&self) -> (u64, u64) {
        let Some(ref path) = self.db_path else {
            return (0, 0);
        };

        let used = tokio::fs::metadata(path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        // Available space on the disk holding the database file; best match
        // by longest mount-point prefix.
        let lookup = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let resolved = std::fs::canonicalize(&lookup).unwrap_or(lookup);

        let disks = sysinfo::Disks::new_with_refreshed_list();
        let available = disks
            .iter()
            .filter(|disk| resolved.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
            .unwrap_or(0);

        (used, available)
    }
}
