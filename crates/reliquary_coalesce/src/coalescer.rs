//! Pending-operation table and subscriber bookkeeping.

use futures::FutureExt;
use reliquary_core::RequestKey;
use reliquary_error::{CoalesceError, CoalesceErrorKind};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, instrument, warn};

type Slot<T, E> = Option<Result<T, E>>;

/// One running operation and the callers waiting on it.
struct Flight<T, E> {
    /// Distinguishes this flight from a later one under the same key
    generation: u64,
    result: watch::Receiver<Slot<T, E>>,
    /// Changed only while the table lock is held
    subscribers: AtomicUsize,
    abort: AbortHandle,
}

impl<T, E> Flight<T, E> {
    fn is_settled(&self) -> bool {
        self.result.borrow().is_some()
    }
}

struct Table<T, E> {
    flights: Mutex<HashMap<RequestKey, Arc<Flight<T, E>>>>,
    next_generation: AtomicU64,
    closed: AtomicBool,
}

impl<T, E> Table<T, E> {
    fn lock(&self) -> MutexGuard<'_, HashMap<RequestKey, Arc<Flight<T, E>>>> {
        // The lock is never held across user code, so a poisoned map is intact.
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove `key` only if it still maps to `generation`.
    fn remove_if_current(
        flights: &mut HashMap<RequestKey, Arc<Flight<T, E>>>,
        key: &RequestKey,
        generation: u64,
    ) -> bool {
        if flights.get(key).is_some_and(|f| f.generation == generation) {
            flights.remove(key);
            true
        } else {
            false
        }
    }
}

/// Detaches one caller from a flight when its wait ends for any reason:
/// completion, cancellation (future dropped) or its own timeout.
struct Subscription<T, E> {
    table: Arc<Table<T, E>>,
    key: RequestKey,
    flight: Arc<Flight<T, E>>,
}

impl<T, E> Drop for Subscription<T, E> {
    fn drop(&mut self) {
        let mut flights = self.table.lock();
        let remaining = self.flight.subscribers.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && !self.flight.is_settled() {
            // Last interested caller left before the result arrived.
            Table::remove_if_current(&mut flights, &self.key, self.flight.generation);
            self.flight.abort.abort();
            debug!(key = %self.key, "Last subscriber left, cancelled shared operation");
        }
    }
}

/// Single-flight coalescer keyed by [`RequestKey`].
///
/// - At most one operation runs per key at any instant.
/// - Every subscriber of a key, including late joiners, receives the same
///   result or the same error.
/// - The entry is removed as soon as the operation settles, so a later
///   `acquire` for the key starts fresh. Nothing is cached here.
/// - Different keys never block each other; the table lock is only held to
///   register or remove an entry, never while an operation runs.
/// - A caller that stops waiting (dropped future or its own timeout) only
///   detaches itself. When the last subscriber detaches before the result
///   arrives, the operation is aborted.
/// - Nothing is retried. A rate-limit failure is fanned out like any other.
///
/// Operations run on their own Tokio task, so a panicking operation is
/// reported to every subscriber as `CoalesceErrorKind::Panicked` instead of
/// unwinding through one caller.
pub struct RequestCoalescer<T, E> {
    table: Arc<Table<T, E>>,
}

impl<T, E> Clone for RequestCoalescer<T, E> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<T, E> Default for RequestCoalescer<T, E> {
    fn default() -> Self {
        Self {
            table: Arc::new(Table {
                flights: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

impl<T, E> std::fmt::Debug for RequestCoalescer<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoalescer")
            .field("in_flight", &self.table.lock().len())
            .field("closed", &self.table.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl<T, E> RequestCoalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<CoalesceError> + 'static,
{
    /// Create an empty coalescer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fetch_fn` for `key`, or join the run already in progress.
    ///
    /// `fetch_fn` is invoked at most once per flight; a caller that joins an
    /// existing flight drops its own `fetch_fn` unused.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error, or an error built from
    /// [`CoalesceError`] when the operation panicked, was aborted, or the
    /// coalescer has been shut down.
    #[instrument(skip(self, key, fetch_fn), fields(key = %key))]
    pub async fn acquire<F, Fut>(&self, key: RequestKey, fetch_fn: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let subscription = self.subscribe(key, fetch_fn)?;
        let mut receiver = subscription.flight.result.clone();

        let settled = match receiver.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };

        drop(subscription);
        settled.unwrap_or_else(|| {
            Err(CoalesceError::new(CoalesceErrorKind::Abandoned(
                "shared operation ended without a result".to_string(),
            ))
            .into())
        })
    }

    /// Like [`acquire`](Self::acquire), but this caller stops waiting after
    /// `timeout`.
    ///
    /// The timeout bounds only this caller's wait. The shared operation keeps
    /// running for any other subscriber.
    pub async fn acquire_with_timeout<F, Fut>(
        &self,
        key: RequestKey,
        timeout: Duration,
        fetch_fn: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        match tokio::time::timeout(timeout, self.acquire(key.clone(), fetch_fn)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(key = %key, timeout_ms = timeout.as_millis() as u64, "Gave up waiting for shared operation");
                Err(CoalesceError::new(CoalesceErrorKind::TimedOut(timeout)).into())
            }
        }
    }

    /// Number of operations currently running.
    pub fn in_flight(&self) -> usize {
        self.table.lock().len()
    }

    /// Callers waiting on `key`, or `None` when nothing runs for it.
    pub fn subscribers(&self, key: &RequestKey) -> Option<usize> {
        self.table
            .lock()
            .get(key)
            .map(|f| f.subscribers.load(Ordering::SeqCst))
    }

    /// Abort every running operation and refuse new ones.
    ///
    /// Current subscribers receive `CoalesceErrorKind::Abandoned`.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        self.table.closed.store(true, Ordering::SeqCst);
        let drained: Vec<_> = self.table.lock().drain().collect();
        for (key, flight) in &drained {
            flight.abort.abort();
            debug!(key = %key, "Aborted shared operation on shutdown");
        }
        debug!(aborted = drained.len(), "Coalescer shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.table.closed.load(Ordering::SeqCst)
    }

    /// Register as a subscriber of `key`, starting a flight if none runs.
    fn subscribe<F, Fut>(&self, key: RequestKey, fetch_fn: F) -> Result<Subscription<T, E>, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut flights = self.table.lock();

        if self.table.closed.load(Ordering::SeqCst) {
            return Err(CoalesceError::new(CoalesceErrorKind::Abandoned(
                "coalescer is shut down".to_string(),
            ))
            .into());
        }

        if let Some(flight) = flights.get(&key) {
            let joined = flight.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(subscribers = joined, "Joined in-flight operation");
            return Ok(Subscription {
                table: self.table.clone(),
                key,
                flight: flight.clone(),
            });
        }

        let generation = self.table.next_generation.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = watch::channel(None);
        let table = self.table.clone();
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            let result = match AssertUnwindSafe(async move { fetch_fn().await })
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(_) => {
                    warn!(key = %task_key, "Shared operation panicked");
                    Err(CoalesceError::new(CoalesceErrorKind::Panicked).into())
                }
            };

            // Remove and publish under one lock so a detaching subscriber
            // never sees an unsettled flight that is already gone.
            let mut flights = table.lock();
            Table::remove_if_current(&mut flights, &task_key, generation);
            sender.send_replace(Some(result));
        });

        let flight = Arc::new(Flight {
            generation,
            result: receiver,
            subscribers: AtomicUsize::new(1),
            abort: handle.abort_handle(),
        });
        flights.insert(key.clone(), flight.clone());
        debug!(generation, "Started shared operation");

        Ok(Subscription {
            table: self.table.clone(),
            key,
            flight,
        })
    }
}
