//! Winner notification dispatch
//!
//! Notifications run after the announcement transaction has committed and
//! are strictly fire-and-forget: a delivery failure is logged and never
//! surfaced to the caller, whose operation has already succeeded.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

/// Structured payload sent for each winning submitter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerNotice {
    pub bounty_id: String,
    pub bounty_title: String,
    pub submission_id: String,
    pub position: u32,
    pub amount: f64,
    pub token: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_winner(&self, recipient: &str, notice: &WinnerNotice) -> Result<()>;
}

/// Delivers notices to a configured webhook endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    recipient: &'a str,
    #[serde(flatten)]
    notice: &'a WinnerNotice,
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_winner(&self, recipient: &str, notice: &WinnerNotice) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { recipient, notice })
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("notification webhook returned {}", response.status());
        }
        info!(
            "Notified {} of position {} on bounty {}",
            recipient, notice.position, notice.bounty_id
        );
        Ok(())
    }
}

/// Used when no webhook is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify_winner(&self, recipient: &str, notice: &WinnerNotice) -> Result<()> {
        debug!(
            "Notification dispatch disabled; skipping notice to {} for bounty {}",
            recipient, notice.bounty_id
        );
        Ok(())
    }
}
