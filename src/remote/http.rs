// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP implementation of the remote collaborator.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{RemoteApi, SyncError, SyncPayload};
use crate::records::Lesson;

/// Remote collaborator over HTTP.
///
/// Requests carry no timeout of their own; a hung request stalls the sync
/// pass until the transport settles it.
pub struct HttpRemote {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemote {
    /// `base_url` is the API root, e.g. `https://classroom.example/api`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn check_status(
        endpoint: &'static str,
        response: &reqwest::Response,
    ) -> Result<(), SyncError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SyncError::Status {
                endpoint,
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn push_progress(&self, payload: &Value) -> Result<(), SyncError> {
        let response = self
            .client
            .post(format!("{}/progress", self.base_url))
            .json(payload)
            .send()
            .await?;
        Self::check_status("progress", &response)?;
        debug!("Pushed progress mutation");
        Ok(())
    }

    async fn push_user(&self, payload: &Value) -> Result<(), SyncError> {
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::Payload("user payload missing id".to_string()))?;

        let response = self
            .client
            .put(format!("{}/users/{}", self.base_url, id))
            .json(payload)
            .send()
            .await?;
        Self::check_status("users", &response)?;
        debug!(user_id = id, "Pushed user mutation");
        Ok(())
    }

    async fn pull_changes(&self) -> Result<SyncPayload, SyncError> {
        let response = self
            .client
            .get(format!("{}/sync", self.base_url))
            .send()
            .await?;
        Self::check_status("sync", &response)?;

        let payload = response.json::<SyncPayload>().await?;
        debug!(
            lessons = payload.lessons.as_ref().map_or(0, Vec::len),
            has_user = payload.user.is_some(),
            "Pulled remote changes"
        );
        Ok(payload)
    }

    async fn download_lesson(&self, id: i64) -> Result<Lesson, SyncError> {
        let response = self
            .client
            .get(format!("{}/lessons/{}/download", self.base_url, id))
            .send()
            .await?;
        Self::check_status("lessons/download", &response)?;

        Ok(response.json::<Lesson>().await?)
    }

    async fn fetch_media(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        let response = self.client.get(url).send().await?;
        Self::check_status("media", &response)?;

        Ok(response.bytes().await?.to_vec())
    }
}
