//! Direct-URL HTTP fetcher.

use crate::{classify_status, detect_media};
use reliquary_core::{FetchOutcome, FetchRequest, MediaPayload};
use reliquary_error::{ConfigError, FetchError, FetchErrorKind, ReliquaryResult};
use reliquary_interface::Fetcher;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Fetches a single media file from a direct URL.
///
/// The fetcher owns error classification: a 429 comes back as
/// `RateLimited` with any `Retry-After` hint, 404 and 410 as `NotFound`, and
/// a body that is not recognisable media as `Unsupported`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher sending `user_agent` with a whole-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> ReliquaryResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent.into())
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build HTTP client: {}", e)))?;
        debug!(timeout_secs = timeout.as_secs(), "Created HTTP fetcher");
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self, request), fields(source = %request.source))]
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let url = reqwest::Url::parse(&request.source).map_err(|e| {
            FetchError::new(FetchErrorKind::Unsupported(format!(
                "{} is not a URL: {}",
                request.source, e
            )))
        })?;

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(error = %e, "Request failed");
            FetchError::new(FetchErrorKind::Upstream(format!("Request failed: {}", e)))
        })?;

        if let Some(error) = classify_status(response.status(), response.headers(), &request.source)
        {
            warn!(status = %response.status(), error = %error.kind, "Upstream refused fetch");
            return Err(error);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let (kind, extension) = detect_media(content_type.as_deref(), response.url())
            .or_else(|| detect_media(content_type.as_deref(), &url))
            .ok_or_else(|| {
                FetchError::new(FetchErrorKind::Unsupported(format!(
                    "{} ({})",
                    request.source,
                    content_type.as_deref().unwrap_or("no content type")
                )))
            })?;

        let bytes = response.bytes().await.map_err(|e| {
            FetchError::new(FetchErrorKind::Upstream(format!(
                "Failed to read body: {}",
                e
            )))
        })?;

        debug!(size = bytes.len(), kind = %kind, extension = %extension, "Fetched media");
        Ok(FetchOutcome::Fetched(vec![MediaPayload::new(
            bytes, kind, extension,
        )]))
    }

    fn name(&self) -> &str {
        "http"
    }
}
