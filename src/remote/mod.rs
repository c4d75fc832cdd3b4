//! Remote collaborator interface.
//!
//! The protocol engine talks to the remote service through the [`RemoteApi`]
//! trait so tests can substitute mocks; [`HttpRemote`] is the production
//! implementation over HTTP.

pub mod http;

pub use http::HttpRemote;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::records::{Lesson, UserSnapshot};
use crate::store::StoreError;

/// Errors from sync and download operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The operation requires connectivity and the monitor reports offline.
    /// Raised before any network I/O is attempted.
    #[error("operation requires connectivity")]
    Offline,

    /// The remote was unreachable or the transport failed.
    #[error("network request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-success status.
    #[error("remote returned status {status} for {endpoint}")]
    Status { endpoint: &'static str, status: u16 },

    /// A queued mutation payload is missing a field the dispatch needs.
    #[error("malformed mutation payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Body of a pull-phase `GET /sync` response. Both halves are optional;
/// the remote sends whatever changed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncPayload {
    #[serde(default)]
    pub lessons: Option<Vec<Lesson>>,
    #[serde(default)]
    pub user: Option<UserSnapshot>,
}

/// Endpoints the protocol engine consumes. Request/response bodies are
/// opaque JSON matching the local record shapes.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// `POST /progress` with a queued progress payload.
    async fn push_progress(&self, payload: &Value) -> Result<(), SyncError>;

    /// `PUT /users/{id}` with a queued user payload (`id` read from it).
    async fn push_user(&self, payload: &Value) -> Result<(), SyncError>;

    /// `GET /sync` - one "what's new" request per pull phase.
    async fn pull_changes(&self) -> Result<SyncPayload, SyncError>;

    /// `GET /lessons/{id}/download` - fetch one lesson for offline use.
    async fn download_lesson(&self, id: i64) -> Result<Lesson, SyncError>;

    /// Fetch an arbitrary media URL referenced by lesson content.
    async fn fetch_media(&self, url: &str) -> Result<Vec<u8>, SyncError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sync_payload_tolerates_empty_body() {
        let payload: SyncPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.lessons.is_none());
        assert!(payload.user.is_none());
    }

    #[test]
    fn test_sync_payload_with_both_halves() {
        let payload: SyncPayload = serde_json::from_value(json!({
            "lessons": [
                {"id": 1, "title": "Fractions", "subject": "Mathematics", "content": {}}
            ],
            "user": {"id": "u1", "name": "Gurpreet", "role": "student"}
        }))
        .unwrap();

        assert_eq!(payload.lessons.unwrap().len(), 1);
        assert_eq!(payload.user.unwrap().id, "u1");
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::Status { endpoint: "progress", status: 503 };
        assert_eq!(err.to_string(), "remote returned status 503 for progress");

        assert_eq!(
            SyncError::Offline.to_string(),
            "operation requires connectivity"
        );
    }
}
