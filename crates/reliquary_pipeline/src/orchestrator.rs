//! End-to-end acquisition flow.

use crate::{DEFAULT_RETAINED_HISTORIES, LifecycleLog, TracingLifecycleSink, TransformStage};
use derive_getters::Getters;
use futures::future::try_join_all;
use reliquary_coalesce::RequestCoalescer;
use reliquary_core::{
    ChannelKind, ContentHash, DeliveredLocation, FetchOutcome, FetchRequest, LedgerRecord,
    LifecyclePhase, LifecycleRecord, MediaKind, MediaPayload, PutMetadata, PutMetadataBuilder,
    RequestId, RequestKey, TrimSpec,
};
use reliquary_delivery::{DeliveryExecutor, DeliveryItem};
use reliquary_error::{
    ConfigError, DeliveryError, DeliveryErrorKind, FetchError, FetchErrorKind, ReliquaryError,
    ReliquaryResult,
};
use reliquary_interface::{
    Fetcher, Ledger, LifecycleSink, LimitedChannel, Transformer, UnlimitedChannel,
};
use reliquary_storage::ContentStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// The collaborators an [`Orchestrator`] drives.
///
/// # Example
///
/// ```rust,ignore
/// let collaborators = Collaborators::builder()
///     .fetcher(fetcher)
///     .store(store)
///     .limited(webhook)
///     .unlimited(cold_store)
///     .ledger(ledger)
///     .build()?;
/// ```
#[derive(Clone, derive_builder::Builder, Getters)]
pub struct Collaborators {
    /// Downloads source media
    fetcher: Arc<dyn Fetcher>,
    /// Trims media; without one, trim specs are ignored
    #[builder(setter(strip_option), default)]
    transformer: Option<Arc<dyn Transformer>>,
    /// Content-addressed store
    store: Arc<dyn ContentStore>,
    /// Size-limited delivery channel
    limited: Arc<dyn LimitedChannel>,
    /// Unlimited delivery channel
    unlimited: Arc<dyn UnlimitedChannel>,
    /// Durable request ledger
    ledger: Arc<dyn Ledger>,
    /// Receives lifecycle records
    #[builder(default = "Arc::new(TracingLifecycleSink) as Arc<dyn LifecycleSink>")]
    sink: Arc<dyn LifecycleSink>,
}

impl Collaborators {
    /// Start building a collaborator set.
    pub fn builder() -> CollaboratorsBuilder {
        CollaboratorsBuilder::default()
    }
}

/// Tunables for an [`Orchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Upper bound on one caller's wait for a shared acquisition
    pub wait_timeout: Option<Duration>,
    /// Finished request histories kept for [`Orchestrator::history`]
    pub retained_histories: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            wait_timeout: None,
            retained_histories: DEFAULT_RETAINED_HISTORIES,
        }
    }
}

/// How a request's locations were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum AcquireOrigin {
    /// The ledger already held a record; nothing was fetched
    #[display("ledger")]
    Ledger,
    /// The fetcher reported the request as delivered before
    #[display("already_delivered")]
    AlreadyDelivered,
    /// Fetched, committed and delivered by this acquisition
    #[display("delivered")]
    Delivered,
}

/// Successful result of [`Orchestrator::acquire_and_deliver`].
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct AcquireOutcome {
    /// This caller's request id
    request_id: RequestId,
    /// Request identity
    key: RequestKey,
    /// Delivered items in source order
    locations: Vec<DeliveredLocation>,
    /// Where the locations came from
    origin: AcquireOrigin,
}

impl AcquireOutcome {
    /// Total delivered size.
    pub fn size_bytes(&self) -> u64 {
        self.locations.iter().map(|l| l.size_bytes).sum()
    }
}

/// The value shared by every caller coalesced onto one acquisition.
#[derive(Debug, Clone)]
struct Shared {
    locations: Vec<DeliveredLocation>,
    origin: AcquireOrigin,
}

/// One fetched payload after transform and commit.
struct Committed {
    bytes: bytes::Bytes,
    hash: ContentHash,
    kind: MediaKind,
    extension: String,
    /// Durable location already on record for the content
    location: Option<DeliveredLocation>,
}

struct Inner {
    collaborators: Collaborators,
    transform: TransformStage,
    executor: DeliveryExecutor,
    coalescer: RequestCoalescer<Shared, ReliquaryError>,
    lifecycle: LifecycleLog,
    settings: OrchestratorSettings,
}

/// Composes ledger lookup, coalescing, dedup, transform and delivery.
///
/// Owns the pending-request table and the lifecycle log, so every instance
/// starts with fresh state. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("coalescer", &self.inner.coalescer)
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator with default settings.
    pub fn new(collaborators: Collaborators) -> Self {
        Self::with_settings(collaborators, OrchestratorSettings::default())
    }

    /// Orchestrator with explicit settings.
    pub fn with_settings(collaborators: Collaborators, settings: OrchestratorSettings) -> Self {
        let transform = TransformStage::new(
            collaborators.transformer.clone(),
            Arc::clone(&collaborators.store),
        );
        let executor = DeliveryExecutor::new(
            Arc::clone(&collaborators.limited),
            Arc::clone(&collaborators.unlimited),
        );
        let lifecycle = LifecycleLog::with_retention(
            Arc::clone(&collaborators.sink),
            settings.retained_histories,
        );
        Self {
            inner: Arc::new(Inner {
                collaborators,
                transform,
                executor,
                coalescer: RequestCoalescer::new(),
                lifecycle,
                settings,
            }),
        }
    }

    /// Acquire `source` (trimmed per `trim`) and deliver it.
    ///
    /// The ledger is consulted first; a hit short-circuits `pending -> success`
    /// without fetching. Otherwise the whole acquisition is coalesced under the
    /// request key, so concurrent identical callers share one fetch, one
    /// delivery and one ledger record. Each caller gets its own request id and
    /// lifecycle history.
    ///
    /// # Errors
    ///
    /// Returns the terminal failure; [`ReliquaryError::category`] collapses it
    /// into the category shown to the caller.
    #[instrument(
        skip(self, trim),
        fields(request_id = tracing::field::Empty, key = tracing::field::Empty)
    )]
    pub async fn acquire_and_deliver(
        &self,
        source: &str,
        trim: Option<TrimSpec>,
        requester_id: &str,
    ) -> ReliquaryResult<AcquireOutcome> {
        let request = FetchRequest::new(source, trim);
        let key = request.key();
        let request_id = Uuid::new_v4();
        let span = tracing::Span::current();
        span.record("request_id", tracing::field::display(&request_id));
        span.record("key", tracing::field::display(&key));

        self.transition(LifecycleRecord::new(request_id, LifecyclePhase::Pending))
            .await;

        match self.inner.collaborators.ledger.lookup(&key).await {
            Ok(Some(record)) => {
                info!(items = record.items.len(), "Ledger hit, skipping fetch");
                self.transition(LifecycleRecord::success(request_id, record.size_bytes()))
                    .await;
                return Ok(AcquireOutcome {
                    request_id,
                    key,
                    locations: record.items,
                    origin: AcquireOrigin::Ledger,
                });
            }
            Ok(None) => {}
            Err(e) => {
                self.transition(LifecycleRecord::new(request_id, LifecyclePhase::Running))
                    .await;
                return Err(self.fail(request_id, e.into()).await);
            }
        }

        self.transition(LifecycleRecord::new(request_id, LifecyclePhase::Running))
            .await;

        let inner = Arc::clone(&self.inner);
        let requester = requester_id.to_string();
        let acquisition = move || async move { inner.acquire(request, requester).await };

        let result = match self.inner.settings.wait_timeout {
            Some(timeout) => {
                self.inner
                    .coalescer
                    .acquire_with_timeout(key.clone(), timeout, acquisition)
                    .await
            }
            None => self.inner.coalescer.acquire(key.clone(), acquisition).await,
        };

        match result {
            Ok(shared) => {
                let outcome = AcquireOutcome {
                    request_id,
                    key,
                    locations: shared.locations,
                    origin: shared.origin,
                };
                self.transition(LifecycleRecord::success(request_id, outcome.size_bytes()))
                    .await;
                info!(
                    items = outcome.locations.len(),
                    origin = %outcome.origin,
                    "Request complete"
                );
                Ok(outcome)
            }
            Err(e) => Err(self.fail(request_id, e).await),
        }
    }

    /// Current lifecycle phase of a request.
    pub async fn phase_of(&self, request_id: &RequestId) -> Option<LifecyclePhase> {
        self.inner.lifecycle.phase_of(request_id).await
    }

    /// Lifecycle history of a request, oldest first.
    pub async fn history(&self, request_id: &RequestId) -> Vec<LifecycleRecord> {
        self.inner.lifecycle.history(request_id).await
    }

    /// Acquisitions currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.coalescer.in_flight()
    }

    /// Callers waiting on the acquisition for `key`, if one is running.
    pub fn waiting_on(&self, key: &RequestKey) -> Option<usize> {
        self.inner.coalescer.subscribers(key)
    }

    /// Abort every running acquisition and refuse new ones.
    pub fn shutdown(&self) {
        info!(in_flight = self.in_flight(), "Shutting down orchestrator");
        self.inner.coalescer.shutdown();
    }

    async fn transition(&self, record: LifecycleRecord) {
        if let Err(e) = self.inner.lifecycle.append(record).await {
            warn!(error = %e, "Rejected lifecycle transition");
        }
    }

    async fn fail(&self, request_id: RequestId, e: ReliquaryError) -> ReliquaryError {
        error!(category = %e.category(), error = %e, "Request failed");
        self.transition(LifecycleRecord::error(
            request_id,
            format!("{}: {}", e.category(), e),
        ))
        .await;
        e
    }
}

impl Inner {
    /// The shared part of a request: fetch through ledger record.
    async fn acquire(&self, request: FetchRequest, requester_id: String) -> ReliquaryResult<Shared> {
        let key = request.key();
        let fetcher = &self.collaborators.fetcher;
        debug!(fetcher = fetcher.name(), source = %request.source, "Fetching");

        let payloads = match fetcher.fetch(&request).await? {
            FetchOutcome::AlreadyDelivered(record) => {
                info!(items = record.items.len(), "Fetcher reports request already delivered");
                return Ok(Shared {
                    locations: record.items,
                    origin: AcquireOrigin::AlreadyDelivered,
                });
            }
            FetchOutcome::Fetched(payloads) if payloads.is_empty() => {
                return Err(FetchError::new(FetchErrorKind::Unsupported(format!(
                    "{} yielded no media",
                    request.source
                )))
                .into());
            }
            FetchOutcome::Fetched(payloads) => payloads,
        };

        let metadata = PutMetadataBuilder::default()
            .requester_id(requester_id.clone())
            .source(request.source.clone())
            .build()
            .map_err(|e| ConfigError::new(e.to_string()))?;

        let committed = try_join_all(
            payloads
                .into_iter()
                .map(|payload| self.commit(payload, request.trim.as_ref(), &metadata)),
        )
        .await?;

        let locations = self.deliver(committed, &metadata).await?;

        self.collaborators
            .ledger
            .record(LedgerRecord::new(key, locations.clone(), requester_id))
            .await?;

        Ok(Shared {
            locations,
            origin: AcquireOrigin::Delivered,
        })
    }

    /// Transform, re-hash and store one payload.
    ///
    /// Content already on file is reused as is; `put` then only runs to move
    /// the record's requester.
    async fn commit(
        &self,
        payload: MediaPayload,
        trim: Option<&TrimSpec>,
        metadata: &PutMetadata,
    ) -> ReliquaryResult<Committed> {
        let MediaPayload {
            bytes,
            kind,
            extension,
        } = payload;
        let output = self.transform.apply(bytes, kind, &extension, trim).await?;
        let already_existed = output.already_existed();

        let record = match output.existing {
            Some(record) if record.last_requester_id == *metadata.requester_id() => record,
            _ => {
                self.collaborators
                    .store
                    .put(&output.hash, kind, &extension, &output.bytes, metadata)
                    .await?
                    .record
            }
        };
        debug!(
            hash = %output.hash.short(),
            already_existed,
            transformed = output.transformed,
            "Committed content"
        );

        let location = record
            .public_location
            .as_ref()
            .map(|public| DeliveredLocation {
                location: public.clone(),
                channel: ChannelKind::Unlimited,
                content_hash: output.hash.clone(),
                kind,
                extension: extension.clone(),
                size_bytes: record.size_bytes,
            });

        Ok(Committed {
            bytes: output.bytes,
            hash: output.hash,
            kind,
            extension,
            location,
        })
    }

    /// Deliver every committed payload without a durable location yet.
    async fn deliver(
        &self,
        committed: Vec<Committed>,
        metadata: &PutMetadata,
    ) -> ReliquaryResult<Vec<DeliveredLocation>> {
        let total = committed.len();
        let mut slots: Vec<Option<DeliveredLocation>> = Vec::with_capacity(total);
        let mut pending = Vec::new();
        let mut items = Vec::new();

        for (index, entry) in committed.into_iter().enumerate() {
            match entry.location {
                Some(location) => {
                    debug!(hash = %location.content_hash.short(), "Reusing durable location");
                    slots.push(Some(location));
                }
                None => {
                    pending.push(index);
                    items.push(DeliveryItem::new(
                        entry.bytes,
                        entry.hash,
                        entry.kind,
                        entry.extension,
                        metadata.clone(),
                    ));
                    slots.push(None);
                }
            }
        }

        if !items.is_empty() {
            let plan = self.executor.planner().plan(items);
            let results = self.executor.execute(plan).await;

            let mut failures = Vec::new();
            for (index, result) in pending.into_iter().zip(results) {
                match result {
                    Ok(location) => {
                        if location.channel.is_durable() {
                            self.remember_location(&location).await;
                        }
                        slots[index] = Some(location);
                    }
                    Err(undelivered) => failures.push(format!(
                        "{}: {}",
                        undelivered.item.content_hash.short(),
                        undelivered.error.kind
                    )),
                }
            }

            if !failures.is_empty() {
                return Err(DeliveryError::new(DeliveryErrorKind::Incomplete {
                    delivered: total - failures.len(),
                    total,
                    detail: failures.join("; "),
                })
                .into());
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    async fn remember_location(&self, location: &DeliveredLocation) {
        if let Err(e) = self
            .collaborators
            .store
            .refresh_location(&location.content_hash, location.kind, &location.location)
            .await
        {
            warn!(hash = %location.content_hash.short(), error = %e, "Could not record durable location");
        }
    }
}
