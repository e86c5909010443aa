//! Completion notification sent once the recording has been finalized.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::SessionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingEvent {
    #[serde(rename = "recording_completed")]
    Completed,
    /// The output file is missing or zero-length.
    #[serde(rename = "recording_empty")]
    Empty,
}

impl RecordingEvent {
    pub fn for_output(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Self::Completed,
            _ => Self::Empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub event: RecordingEvent,
    pub filename: String,
    pub full_path: String,
    pub meet_link: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

impl NotificationPayload {
    /// Describe the finished recording of `session` at `output`.
    pub fn for_session(session: &SessionConfig, output: &Path) -> Self {
        Self {
            event: RecordingEvent::for_output(output),
            filename: session.output_file.clone(),
            full_path: output.to_string_lossy().to_string(),
            meet_link: session.meet_link.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            message_id: session.message_id.clone(),
            file_url: session.file_url(),
        }
    }
}

#[async_trait]
pub trait RecordingNotifier: Send + Sync {
    async fn notify(&self, payload: &NotificationPayload) -> Result<()>;
}

/// POSTs the payload as JSON to a fixed URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RecordingNotifier for WebhookNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<()> {
        debug!("Posting {:?} to {}", payload.event, self.url);
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Notification endpoint returned {}", status);
        }

        info!("Notification delivered ({})", status);
        Ok(())
    }
}
