//! Record types held by the durable store.
//!
//! Four record kinds flow through the core: downloaded lessons, per-user
//! progress, user snapshots pulled from the remote, and pending mutations
//! awaiting push. Content payloads are opaque JSON ([`serde_json::Value`]);
//! the store never interprets them.
//!
//! All timestamps are epoch milliseconds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A lesson cached locally for offline use.
///
/// `downloaded_at` and `last_accessed` are stamped by the store on write;
/// values arriving from the remote are ignored, so they default when absent
/// from a server payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub title: String,
    pub subject: String,
    /// Opaque nested content (text, quiz data, media references).
    pub content: Value,
    #[serde(default)]
    pub downloaded_at: i64,
    #[serde(default)]
    pub last_accessed: i64,
}

impl Lesson {
    /// Create a lesson with unset timestamps (the store stamps them on write).
    pub fn new(id: i64, title: impl Into<String>, subject: impl Into<String>, content: Value) -> Self {
        Self {
            id,
            title: title.into(),
            subject: subject.into(),
            content,
            downloaded_at: 0,
            last_accessed: 0,
        }
    }

    /// URL of the embedded video, if the content carries one.
    pub fn video_url(&self) -> Option<&str> {
        self.content.get("video")?.get("url")?.as_str()
    }
}

/// Per-user, per-lesson progress. Keyed by `(user_id, lesson_id)`;
/// every write is an upsert (last write wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub user_id: String,
    pub lesson_id: i64,
    /// Completion percentage, 0-100.
    pub progress: u8,
    pub completed: bool,
    #[serde(default)]
    pub last_updated: i64,
}

/// User role as reported by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Teacher => write!(f, "teacher"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Snapshot of remote user data, written during pull syncs and read for
/// reconciliation at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: String,
    pub name: String,
    pub role: Role,
    /// Free-form profile payload, opaque to the store.
    #[serde(default)]
    pub profile: Value,
    #[serde(default)]
    pub last_synced: i64,
}

/// Which remote endpoint a pending mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Progress,
    User,
}

impl MutationKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MutationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "progress" => Ok(Self::Progress),
            "user" => Ok(Self::User),
            other => Err(format!("unknown mutation kind: {other}")),
        }
    }
}

/// A locally-originated change waiting to be pushed to the remote.
///
/// `id` is assigned by the store (auto-incrementing). `retries` records the
/// retry budget already spent at enqueue time; in-pass retries are handled
/// by the protocol engine and are not written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: i64,
    pub kind: MutationKind,
    pub payload: Value,
    pub enqueued_at: i64,
    pub retries: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lesson_roundtrip() {
        let lesson = Lesson::new(1, "Linear Equations", "Mathematics", json!({"pages": 12}));

        let serialized = serde_json::to_string(&lesson).unwrap();
        let back: Lesson = serde_json::from_str(&serialized).unwrap();

        assert_eq!(back, lesson);
    }

    #[test]
    fn test_lesson_deserializes_without_timestamps() {
        // Server payloads carry no local timestamps
        let lesson: Lesson = serde_json::from_value(json!({
            "id": 4,
            "title": "Photosynthesis",
            "subject": "Science",
            "content": {"video": {"url": "https://cdn.example/ps.mp4"}}
        }))
        .unwrap();

        assert_eq!(lesson.downloaded_at, 0);
        assert_eq!(lesson.last_accessed, 0);
        assert_eq!(lesson.video_url(), Some("https://cdn.example/ps.mp4"));
    }

    #[test]
    fn test_video_url_absent() {
        let lesson = Lesson::new(1, "t", "s", json!({"text": "no media"}));
        assert!(lesson.video_url().is_none());
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Student).unwrap(), "\"student\"");
        assert_eq!(serde_json::to_string(&Role::Teacher).unwrap(), "\"teacher\"");

        let role: Role = serde_json::from_str("\"teacher\"").unwrap();
        assert_eq!(role, Role::Teacher);
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("student".parse::<Role>().unwrap(), Role::Student);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_mutation_kind_roundtrip() {
        for kind in [MutationKind::Progress, MutationKind::User] {
            let parsed: MutationKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("lesson".parse::<MutationKind>().is_err());
    }

    #[test]
    fn test_now_millis_is_recent() {
        let a = now_millis();
        let b = now_millis();
        assert!(a > 0);
        assert!(b >= a);
    }

    #[test]
    fn test_progress_serde() {
        let progress = Progress {
            user_id: "u1".to_string(),
            lesson_id: 3,
            progress: 50,
            completed: false,
            last_updated: 1_700_000_000_000,
        };

        let value = serde_json::to_value(&progress).unwrap();
        assert_eq!(value["user_id"], "u1");
        assert_eq!(value["progress"], 50);

        let back: Progress = serde_json::from_value(value).unwrap();
        assert_eq!(back, progress);
    }
}
