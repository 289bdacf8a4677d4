//! Append-only lifecycle log and sinks.

use reliquary_core::{LifecyclePhase, LifecycleRecord, RequestId};
use reliquary_error::{LifecycleError, LifecycleErrorKind};
use reliquary_interface::LifecycleSink;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Finished histories kept by [`LifecycleLog::new`].
pub const DEFAULT_RETAINED_HISTORIES: usize = 1024;

/// Per-orchestrator transition log.
///
/// Enforces the request state machine: the first record of a request is
/// `pending`, every later record must be an allowed transition from the
/// current phase, and terminal phases accept nothing. Accepted records are
/// forwarded to the sink; sink failures are logged and dropped.
///
/// In-flight histories are always kept. Only the most recent finished
/// histories are, oldest evicted first; the sink has already seen every
/// record of an evicted history.
pub struct LifecycleLog {
    entries: RwLock<Entries>,
    sink: Arc<dyn LifecycleSink>,
}

#[derive(Default)]
struct Entries {
    histories: HashMap<RequestId, Vec<LifecycleRecord>>,
    finished: VecDeque<RequestId>,
    retained: usize,
}

impl Entries {
    fn finish(&mut self, request_id: RequestId) {
        self.finished.push_back(request_id);
        while self.finished.len() > self.retained {
            if let Some(evicted) = self.finished.pop_front() {
                self.histories.remove(&evicted);
            }
        }
    }
}

impl std::fmt::Debug for LifecycleLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleLog").finish_non_exhaustive()
    }
}

impl LifecycleLog {
    /// Empty log forwarding to `sink`.
    pub fn new(sink: Arc<dyn LifecycleSink>) -> Self {
        Self::with_retention(sink, DEFAULT_RETAINED_HISTORIES)
    }

    /// Empty log keeping at most `retained` finished histories.
    pub fn with_retention(sink: Arc<dyn LifecycleSink>, retained: usize) -> Self {
        Self {
            entries: RwLock::new(Entries {
                retained,
                ..Entries::default()
            }),
            sink,
        }
    }

    /// Append `record` if the transition is allowed.
    ///
    /// # Errors
    ///
    /// - `UnknownRequest` if the request has no records (or its finished
    ///   history was evicted) and `record` is not `pending`
    /// - `InvalidTransition` if the current phase does not allow `record.phase`
    pub async fn append(&self, record: LifecycleRecord) -> Result<(), LifecycleError> {
        {
            let mut entries = self.entries.write().await;
            match entries.histories.get_mut(&record.request_id) {
                None if record.phase == LifecyclePhase::Pending => {
                    entries
                        .histories
                        .insert(record.request_id, vec![record.clone()]);
                }
                None => {
                    return Err(LifecycleError::new(LifecycleErrorKind::UnknownRequest(
                        record.request_id.to_string(),
                    )));
                }
                Some(history) => {
                    let current = history
                        .last()
                        .map(|r| r.phase)
                        .unwrap_or(LifecyclePhase::Pending);
                    if !current.can_transition_to(record.phase) {
                        return Err(LifecycleError::new(LifecycleErrorKind::InvalidTransition {
                            request_id: record.request_id.to_string(),
                            from: current.to_string(),
                            to: record.phase.to_string(),
                        }));
                    }
                    history.push(record.clone());
                    if record.phase.is_terminal() {
                        entries.finish(record.request_id);
                    }
                }
            }
        }

        if let Err(e) = self.sink.emit(&record).await {
            warn!(request_id = %record.request_id, error = %e, "Lifecycle sink failed");
        }
        Ok(())
    }

    /// Current phase of a request.
    pub async fn phase_of(&self, request_id: &RequestId) -> Option<LifecyclePhase> {
        self.entries
            .read()
            .await
            .histories
            .get(request_id)
            .and_then(|h| h.last())
            .map(|r| r.phase)
    }

    /// Every record of a request, oldest first.
    pub async fn history(&self, request_id: &RequestId) -> Vec<LifecycleRecord> {
        self.entries
            .read()
            .await
            .histories
            .get(request_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of requests with a history on file.
    pub async fn len(&self) -> usize {
        self.entries.read().await.histories.len()
    }

    /// Whether no history is on file.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.histories.is_empty()
    }
}

/// Sink that writes each record to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLifecycleSink;

#[async_trait::async_trait]
impl LifecycleSink for TracingLifecycleSink {
    async fn emit(&self, record: &LifecycleRecord) -> Result<(), LifecycleError> {
        info!(
            request_id = %record.request_id,
            phase = %record.phase,
            size_bytes = record.size_bytes,
            error_detail = record.error_detail.as_deref(),
            "Lifecycle transition"
        );
        Ok(())
    }
}

/// Sink that keeps every record in memory.
#[derive(Debug, Default)]
pub struct CollectingLifecycleSink {
    records: Mutex<Vec<LifecycleRecord>>,
}

impl CollectingLifecycleSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far, in arrival order.
    pub fn records(&self) -> Vec<LifecycleRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl LifecycleSink for CollectingLifecycleSink {
    async fn emit(&self, record: &LifecycleRecord) -> Result<(), LifecycleError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
