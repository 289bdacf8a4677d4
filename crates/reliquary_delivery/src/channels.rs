//! Concrete delivery channels.

use bytes::Bytes;
use reliquary_core::{ContentHash, PutMetadata};
use reliquary_error::{DeliveryError, DeliveryErrorKind};
use reliquary_interface::{LimitedChannel, UnlimitedChannel};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Discord webhook used as the size-limited channel.
///
/// Posts the file as a multipart attachment with `?wait=true` so the reply
/// carries the created message, and returns the first attachment URL.
#[derive(Debug, Clone)]
pub struct DiscordWebhookChannel {
    client: Client,
    webhook_url: reqwest::Url,
    budget: u64,
}

#[derive(Debug, Deserialize)]
struct WebhookMessage {
    #[serde(default)]
    attachments: Vec<WebhookAttachment>,
}

#[derive(Debug, Deserialize)]
struct WebhookAttachment {
    url: String,
}

impl DiscordWebhookChannel {
    /// Channel posting to `webhook_url` with a `budget` in bytes.
    ///
    /// # Errors
    ///
    /// Returns error if `webhook_url` is not a URL.
    pub fn new(client: Client, webhook_url: &str, budget: u64) -> Result<Self, DeliveryError> {
        let mut webhook_url = reqwest::Url::parse(webhook_url).map_err(|e| {
            DeliveryError::send_failed("limited", format!("invalid webhook URL: {}", e))
        })?;
        webhook_url.query_pairs_mut().append_pair("wait", "true");
        Ok(Self {
            client,
            webhook_url,
            budget,
        })
    }
}

#[async_trait::async_trait]
impl LimitedChannel for DiscordWebhookChannel {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn send(&self, bytes: &Bytes, suggested_name: &str) -> Result<String, DeliveryError> {
        let part = Part::stream_with_length(bytes.clone(), bytes.len() as u64)
            .file_name(suggested_name.to_string());
        let form = Form::new().part("files[0]", part);

        let response = self
            .client
            .post(self.webhook_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeliveryError::send_failed("limited", format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::send_failed(
                "limited",
                format!("webhook returned {}: {}", status, body),
            ));
        }

        let message: WebhookMessage = response.json().await.map_err(|e| {
            DeliveryError::send_failed("limited", format!("unreadable webhook reply: {}", e))
        })?;

        let url = message
            .attachments
            .into_iter()
            .next()
            .map(|a| a.url)
            .ok_or_else(|| {
                DeliveryError::new(DeliveryErrorKind::MissingLocation(
                    "webhook reply had no attachments".to_string(),
                ))
            })?;
        debug!(url = %url, "Posted attachment");
        Ok(url)
    }

    fn budget_bytes(&self) -> u64 {
        self.budget
    }
}

/// Content-addressed directory served under a public base URL.
///
/// Writes `{root}/{hash}.{ext}` (skipped when already present) and answers
/// `{public_base_url}/{hash}.{ext}`.
#[derive(Debug, Clone)]
pub struct FileSystemColdStore {
    root: PathBuf,
    public_base_url: String,
}

impl FileSystemColdStore {
    /// Cold store rooted at `root`, published under `public_base_url`.
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn io_error(path: &Path, e: std::io::Error) -> DeliveryError {
        DeliveryError::send_failed("unlimited", format!("{}: {}", path.display(), e))
    }
}

#[async_trait::async_trait]
impl UnlimitedChannel for FileSystemColdStore {
    #[instrument(skip(self, bytes, metadata), fields(hash = %content_hash.short(), size = bytes.len()))]
    async fn send(
        &self,
        bytes: &Bytes,
        content_hash: &ContentHash,
        extension: &str,
        metadata: &PutMetadata,
    ) -> Result<String, DeliveryError> {
        let file_name = format!("{}.{}", content_hash, extension);
        let path = self.root.join(&file_name);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("Object already uploaded");
        } else {
            tokio::fs::create_dir_all(&self.root)
                .await
                .map_err(|e| Self::io_error(&self.root, e))?;
            let temp = self
                .root
                .join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));
            tokio::fs::write(&temp, bytes)
                .await
                .map_err(|e| Self::io_error(&temp, e))?;
            if let Err(e) = tokio::fs::rename(&temp, &path).await {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(Self::io_error(&path, e));
            }
            debug!(requester = ?metadata.requester_id(), "Uploaded object");
        }

        Ok(format!("{}/{}", self.public_base_url, file_name))
    }
}
