//! Wiring the concrete adapters from configuration.

use crate::ReliquaryConfig;
use reliquary_delivery::{DiscordWebhookChannel, FileSystemColdStore};
use reliquary_error::{ConfigError, ReliquaryResult};
use reliquary_fetch::{HttpFetcher, ThrottledFetcher};
use reliquary_pipeline::{Collaborators, FfmpegTrimmer, Orchestrator, OrchestratorSettings};
use reliquary_rate_limit::FetchLimiter;
use reliquary_storage::{FileSystemContentStore, JsonFileLedger};
use std::sync::Arc;
use tracing::{info, instrument};

/// Build an [`Orchestrator`] backed by the adapters `config` describes.
///
/// - Downloads: [`HttpFetcher`] behind a [`ThrottledFetcher`]
/// - Trimming: [`FfmpegTrimmer`]
/// - Content store: [`FileSystemContentStore`]
/// - Ledger: [`JsonFileLedger`]
/// - Limited channel: [`DiscordWebhookChannel`]
/// - Unlimited channel: [`FileSystemColdStore`]
///
/// # Errors
///
/// Fails if the configuration is invalid, `delivery.webhook_url` is unset,
/// or a store or ledger cannot be opened.
#[instrument(skip(config))]
pub async fn assemble(config: &ReliquaryConfig) -> ReliquaryResult<Orchestrator> {
    config.validate()?;

    let fetch = config.fetch();
    let http = HttpFetcher::new(fetch.user_agent().clone(), fetch.timeout())?;
    let fetcher = ThrottledFetcher::new(http, FetchLimiter::new(fetch.limits()));

    let store = FileSystemContentStore::new(config.storage().path().clone())?;
    let ledger = JsonFileLedger::open(config.ledger().path()).await?;

    let delivery = config.delivery();
    let webhook_url = delivery
        .webhook_url()
        .as_deref()
        .ok_or_else(|| ConfigError::new("delivery.webhook_url is required"))?;
    let client = reqwest::Client::builder()
        .user_agent(fetch.user_agent().clone())
        .timeout(fetch.timeout())
        .build()
        .map_err(|e| ConfigError::new(format!("Failed to build webhook client: {}", e)))?;
    let limited =
        DiscordWebhookChannel::new(client, webhook_url, *delivery.limited_budget_bytes())?;
    let unlimited = FileSystemColdStore::new(
        delivery.cold_store_path().clone(),
        delivery.public_base_url().clone(),
    );

    let collaborators = Collaborators::builder()
        .fetcher(Arc::new(fetcher))
        .transformer(Arc::new(FfmpegTrimmer::new(
            config.transform().ffmpeg_path().clone(),
        )))
        .store(Arc::new(store))
        .limited(Arc::new(limited))
        .unlimited(Arc::new(unlimited))
        .ledger(Arc::new(ledger))
        .build()
        .map_err(|e| ConfigError::new(format!("Incomplete collaborators: {}", e)))?;

    let settings = OrchestratorSettings {
        wait_timeout: config.coalesce().wait_timeout(),
        retained_histories: *config.lifecycle().retained_histories(),
    };
    info!(
        budget = delivery.limited_budget_bytes(),
        storage = %config.storage().path().display(),
        "Assembled orchestrator"
    );
    Ok(Orchestrator::with_settings(collaborators, settings))
}
