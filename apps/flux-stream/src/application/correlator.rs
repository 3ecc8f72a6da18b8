//! Request Correlator
//!
//! Turns the multiplexed frame stream into request/response calls. Each call
//! gets a fresh correlation ID, registers a pending entry, sends its request
//! frame and waits for the first frame echoing that ID or for its deadline.
//!
//! # Cache Hits
//!
//! If the target subtree is stamped with the most recently issued ID for the
//! call's signature, the cached value is returned without a round trip. The
//! check runs under the same lock that issues generations, so a hit can never
//! return data older than a call that was already issued.
//!
//! # Pending Entries
//!
//! Entries are owned by the call that created them: a drop guard removes
//! them on success, timeout, send failure or cancellation. Deliveries never
//! block; a frame arriving after its call gave up finds no entry and is
//! ignored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::ports::{FrameSender, SendError};
use crate::domain::cache::{CacheDocument, PatchCache, Stamped, Subtree};
use crate::domain::frame::{RequestEnvelope, RequestFrame};
use crate::domain::query::Query;
use crate::domain::signature::{CorrelationId, Generations};
use crate::infrastructure::metrics;

// =============================================================================
// Error Types
// =============================================================================

/// Errors returned by a call.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// No matching frame arrived before the deadline.
    #[error("request {id} timed out after {after:?}")]
    Timeout {
        /// Correlation ID of the request.
        id: CorrelationId,
        /// Deadline that elapsed.
        after: Duration,
    },

    /// The gateway answered with an error frame.
    #[error("server error: {0}")]
    ServerReported(String),

    /// The request frame could not be sent.
    #[error("send failed: {0}")]
    Send(#[from] SendError),

    /// The pending entry was dropped without a delivery (session reset).
    #[error("request abandoned")]
    Abandoned,
}

// =============================================================================
// Deliveries
// =============================================================================

/// What the dispatcher hands to a waiting call.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Frame was applied; the document as of that frame.
    Applied(Arc<CacheDocument>),
    /// Frame was an error with this message.
    Rejected(String),
}

enum Completion {
    Single(oneshot::Sender<Delivery>),
    Batch(mpsc::UnboundedSender<(CorrelationId, Delivery)>),
}

type PendingTable = Mutex<HashMap<CorrelationId, Completion>>;

/// Removes a call's pending entries when the call ends, however it ends.
struct PendingGuard<'a> {
    pending: &'a PendingTable,
    ids: Vec<CorrelationId>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        for id in &self.ids {
            pending.remove(id);
        }
    }
}

/// Result of a batched call.
///
/// Member indices refer to the slice of queries passed to `call_batch`.
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    /// Members that received data, with their subtree value.
    pub succeeded: Vec<(usize, Stamped<T>)>,
    /// Members that failed, with the reason.
    pub failed: Vec<(usize, CallError)>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

// =============================================================================
// Correlator
// =============================================================================

/// Issues correlation IDs and matches inbound frames to waiting calls.
pub struct RequestCorrelator {
    sender: Arc<dyn FrameSender>,
    cache: Arc<PatchCache>,
    generations: Mutex<Generations>,
    pending: PendingTable,
}

impl std::fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCorrelator")
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl RequestCorrelator {
    /// Create a correlator sending through `sender` and reading `cache`.
    #[must_use]
    pub fn new(sender: Arc<dyn FrameSender>, cache: Arc<PatchCache>) -> Self {
        Self {
            sender,
            cache,
            generations: Mutex::new(Generations::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Number of calls currently waiting for a frame.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Issue one request and wait for its frame.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if no frame arrives within `timeout`,
    /// `ServerReported` for an error frame, `Send` if the request could not
    /// be written and `Abandoned` if the session was reset meanwhile.
    pub async fn call<Q: Query>(
        &self,
        query: &Q,
        timeout: Duration,
    ) -> Result<Stamped<Q::Output>, CallError> {
        let service = <Q::Output as Subtree>::SERVICE;
        let signature = query.signature();

        let (id, generation, rx) = {
            let mut generations = self.generations.lock();
            if let Some(hit) = self.cached(&generations, query) {
                metrics::record_cache_hit(service);
                tracing::debug!(signature = %signature, "Served from cache");
                return Ok(hit);
            }

            let generation = generations.issue(&signature);
            let id = signature.correlation_id(generation);
            let (tx, rx) = oneshot::channel();
            self.pending
                .lock()
                .insert(id.clone(), Completion::Single(tx));
            (id, generation, rx)
        };
        let _guard = PendingGuard {
            pending: &self.pending,
            ids: vec![id.clone()],
        };

        let frame = RequestFrame::new(service, &id, generation, query.params());
        self.sender.send(&RequestEnvelope::single(frame)).await?;
        metrics::record_request(service);
        tracing::debug!(service = %service, id = %id, "Request sent");

        let started = Instant::now();
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Delivery::Applied(document))) => {
                metrics::record_request_duration(service, started.elapsed());
                Ok(Q::Output::slot(&document).clone())
            }
            Ok(Ok(Delivery::Rejected(message))) => Err(CallError::ServerReported(message)),
            Ok(Err(_)) => Err(CallError::Abandoned),
            Err(_) => {
                metrics::record_request_timeout(service);
                tracing::warn!(service = %service, id = %id, ?timeout, "Request timed out");
                Err(CallError::Timeout { id, after: timeout })
            }
        }
    }

    /// Issue several requests for one service in a single envelope.
    ///
    /// Members answered from the cache succeed immediately. The rest share
    /// one deadline; members still outstanding when it elapses fail with
    /// `Timeout` while collected successes are kept.
    ///
    /// # Errors
    ///
    /// Returns `Send` if the envelope could not be written; per-member
    /// failures are reported in the outcome.
    pub async fn call_batch<Q: Query>(
        &self,
        queries: &[Q],
        timeout: Duration,
    ) -> Result<BatchOutcome<Q::Output>, CallError> {
        let service = <Q::Output as Subtree>::SERVICE;
        let mut outcome = BatchOutcome::default();
        let mut frames = Vec::new();
        let mut outstanding: HashMap<CorrelationId, usize> = HashMap::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        {
            let mut generations = self.generations.lock();
            let mut pending = self.pending.lock();
            for (index, query) in queries.iter().enumerate() {
                if let Some(hit) = self.cached(&generations, query) {
                    metrics::record_cache_hit(service);
                    outcome.succeeded.push((index, hit));
                    continue;
                }

                let signature = query.signature();
                let generation = generations.issue(&signature);
                let id = signature.correlation_id(generation);
                pending.insert(id.clone(), Completion::Batch(tx.clone()));
                frames.push(RequestFrame::new(service, &id, generation, query.params()));
                outstanding.insert(id, index);
            }
        }
        drop(tx);

        if frames.is_empty() {
            return Ok(outcome);
        }

        let _guard = PendingGuard {
            pending: &self.pending,
            ids: outstanding.keys().cloned().collect(),
        };

        let count = frames.len();
        self.sender.send(&RequestEnvelope::batch(frames)).await?;
        for _ in 0..count {
            metrics::record_request(service);
        }
        tracing::debug!(service = %service, members = count, "Batch request sent");

        let started = Instant::now();
        let deadline = started + timeout;
        while !outstanding.is_empty() {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some((id, delivery))) => {
                    let Some(index) = outstanding.remove(&id) else {
                        continue;
                    };
                    match delivery {
                        Delivery::Applied(document) => {
                            metrics::record_request_duration(service, started.elapsed());
                            outcome
                                .succeeded
                                .push((index, Q::Output::slot(&document).clone()));
                        }
                        Delivery::Rejected(message) => {
                            outcome
                                .failed
                                .push((index, CallError::ServerReported(message)));
                        }
                    }
                }
                Ok(None) => {
                    for (_, index) in outstanding.drain() {
                        outcome.failed.push((index, CallError::Abandoned));
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        service = %service,
                        outstanding = outstanding.len(),
                        ?timeout,
                        "Batch request timed out"
                    );
                    for (id, index) in outstanding.drain() {
                        metrics::record_request_timeout(service);
                        outcome.failed.push((index, CallError::Timeout { id, after: timeout }));
                    }
                }
            }
        }

        outcome.succeeded.sort_by_key(|(index, _)| *index);
        outcome.failed.sort_by_key(|(index, _)| *index);
        Ok(outcome)
    }

    /// Hand a delivery to the call waiting on `id`.
    ///
    /// Returns `false` if no call is waiting (timed out, never issued or
    /// already answered).
    pub fn resolve(&self, id: &CorrelationId, delivery: Delivery) -> bool {
        let Some(completion) = self.pending.lock().remove(id) else {
            return false;
        };
        match completion {
            Completion::Single(tx) => tx.send(delivery).is_ok(),
            Completion::Batch(tx) => tx.send((id.clone(), delivery)).is_ok(),
        }
    }

    /// Forget generation counters and abandon every waiting call.
    ///
    /// Correlation IDs issued before the reset are never issued again.
    pub fn reset(&self) {
        self.generations.lock().clear();
        let abandoned = {
            let mut pending = self.pending.lock();
            let count = pending.len();
            pending.clear();
            count
        };
        if abandoned > 0 {
            tracing::info!(abandoned, "Pending requests abandoned by reset");
        }
    }

    /// Cached value for `query` if the subtree holds its latest generation.
    fn cached<Q: Query>(&self, generations: &Generations, query: &Q) -> Option<Stamped<Q::Output>> {
        let signature = query.signature();
        let last = generations.last(&signature)?;
        let document = self.cache.snapshot();
        let slot = Q::Output::slot(&document);
        slot.is_stamped(&signature.correlation_id(last))
            .then(|| slot.clone())
    }
}
