//! Session lifecycle orchestration.
//!
//! One spawned task per active key owns that key's transport stream, feeds
//! the decoder, and applies events through the store. Cancellation is
//! cooperative via a token; the store's session-identity check drops
//! anything a stale transport delivers after cancellation, so a restart can
//! never observe bleed-through from its predecessor.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use studylink_core::config::ServiceConfig;
use studylink_core::{Config, EvaluateRequest, Result, SessionKey};
use studylink_stream::{EvaluationTransport, HttpTransport, StreamDecoder};

use crate::admission::AdmissionController;
use crate::store::{BeginOutcome, ClassificationStore, SessionOutcome};

// ============================================================================
// Start Outcome
// ============================================================================

/// Result of a start request.
///
/// Rejection at capacity is an expected outcome returned synchronously so
/// the caller can surface the running count - it is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session is streaming.
    Started,
    /// All concurrency slots are in use; nothing changed.
    AtCapacity {
        /// Sessions currently holding the slots.
        running: usize,
        /// The fixed capacity.
        cap: usize,
    },
}

impl StartOutcome {
    /// Whether a session was started.
    pub fn is_started(self) -> bool {
        matches!(self, StartOutcome::Started)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Handle to one active session's transport task.
struct SessionTask {
    session_id: Uuid,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

type TaskMap = Arc<Mutex<HashMap<SessionKey, SessionTask>>>;

/// Drives classification sessions against the external pipeline.
///
/// Must be used from within a tokio runtime; `start` spawns the session's
/// streaming task onto it.
pub struct Orchestrator {
    store: Arc<ClassificationStore>,
    transport: Arc<dyn EvaluationTransport>,
    admission: AdmissionController,
    defaults: ServiceConfig,
    tasks: TaskMap,
}

impl Orchestrator {
    /// Create an orchestrator over an explicit transport and store.
    pub fn new(
        transport: Arc<dyn EvaluationTransport>,
        store: Arc<ClassificationStore>,
        admission: AdmissionController,
    ) -> Self {
        Self {
            store,
            transport,
            admission,
            defaults: ServiceConfig::default(),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create an orchestrator wired to the configured HTTP service.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::from_config(config)?);
        let admission = AdmissionController::new(config.limits.max_concurrent_sessions);
        Ok(Self::new(transport, Arc::new(ClassificationStore::new()), admission)
            .with_defaults(config.service.clone()))
    }

    /// Replace the service defaults applied to outgoing requests.
    pub fn with_defaults(mut self, defaults: ServiceConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// The read model for this orchestrator's sessions.
    pub fn store(&self) -> Arc<ClassificationStore> {
        Arc::clone(&self.store)
    }

    /// Number of sessions currently streaming.
    pub fn running_count(&self) -> usize {
        self.store.streaming_count()
    }

    // ========================================================================
    // Lifecycle operations
    // ========================================================================

    /// Start (or restart) the session for `key`.
    ///
    /// Any session already active for the key is cancelled first and its
    /// accumulated state discarded; the new session begins with an empty
    /// map and log. At capacity the request is rejected and existing state
    /// is left untouched.
    pub fn start(&self, key: SessionKey, mut request: EvaluateRequest) -> StartOutcome {
        if request.model.is_none() {
            request.model = self.defaults.default_model.clone();
        }
        if request.include_pdf.is_none() && self.defaults.include_pdf {
            request.include_pdf = Some(true);
        }

        let mut tasks = self.tasks.lock();

        let session_id = match self.store.begin_session(&key, &self.admission) {
            BeginOutcome::Started { session_id } => session_id,
            BeginOutcome::AtCapacity { running, cap } => {
                debug!(%key, running, "start rejected at capacity");
                return StartOutcome::AtCapacity { running, cap };
            }
        };

        // The store has already discarded any previous session for the key;
        // stop its transport so no further bytes are read.
        if let Some(old) = tasks.remove(&key) {
            old.cancel.cancel();
            old.join.abort();
        }

        let cancel = CancellationToken::new();
        let join = tokio::spawn(run_session(
            Arc::clone(&self.store),
            Arc::clone(&self.transport),
            Arc::clone(&self.tasks),
            key.clone(),
            session_id,
            request,
            cancel.clone(),
        ));
        tasks.insert(
            key.clone(),
            SessionTask {
                session_id,
                cancel,
                join,
            },
        );

        info!(%key, %session_id, "evaluation session started");
        StartOutcome::Started
    }

    /// Cancel the streaming session for `key`, if any.
    ///
    /// Partial results and the event log stay inspectable; only a later
    /// `start` discards them. Returns whether a streaming session was
    /// cancelled.
    pub fn cancel(&self, key: &SessionKey) -> bool {
        let mut tasks = self.tasks.lock();
        let Some(task) = tasks.remove(key) else {
            return false;
        };

        // Status transition and slot release happen before the transport
        // task observes the token; the identity check in the apply path
        // covers any bytes already in flight.
        let cancelled = self
            .store
            .finish(key, task.session_id, SessionOutcome::Cancelled);
        task.cancel.cancel();
        task.join.abort();

        if cancelled {
            info!(%key, "evaluation session cancelled");
        }
        cancelled
    }

    /// Cancel every streaming session (full teardown).
    pub fn cancel_all(&self) {
        let keys: Vec<SessionKey> = self.tasks.lock().keys().cloned().collect();
        for key in keys {
            self.cancel(&key);
        }
    }
}

// ============================================================================
// Session task
// ============================================================================

/// Drive one session: open the transport, decode, reduce, finish.
async fn run_session(
    store: Arc<ClassificationStore>,
    transport: Arc<dyn EvaluationTransport>,
    tasks: TaskMap,
    key: SessionKey,
    session_id: Uuid,
    request: EvaluateRequest,
    cancel: CancellationToken,
) {
    let mut stream = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = transport.open_stream(&request) => match opened {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%key, %err, "failed to open evaluation stream");
                store.finish(&key, session_id, SessionOutcome::Failed(err.to_string()));
                detach(&tasks, &key, session_id);
                return;
            }
        },
    };

    let mut decoder = StreamDecoder::new();
    loop {
        let chunk = tokio::select! {
            // The cancelling side already moved the session to `cancelled`;
            // this task only has to stop reading.
            _ = cancel.cancelled() => return,
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for event in decoder.feed(&bytes) {
                    if event.is_terminal() {
                        store.finish(&key, session_id, SessionOutcome::Completed);
                        detach(&tasks, &key, session_id);
                        return;
                    }
                    store.apply_event(&key, session_id, event);
                }
            }
            Some(Err(err)) => {
                warn!(%key, %err, "evaluation stream failed");
                store.finish(&key, session_id, SessionOutcome::Failed(err.to_string()));
                detach(&tasks, &key, session_id);
                return;
            }
            // Upstream closing cleanly without the marker signals done.
            None => {
                store.finish(&key, session_id, SessionOutcome::Completed);
                detach(&tasks, &key, session_id);
                return;
            }
        }
    }
}

/// Drop this task's handle entry unless a restart already replaced it.
fn detach(tasks: &TaskMap, key: &SessionKey, session_id: Uuid) {
    let mut tasks = tasks.lock();
    if tasks
        .get(key)
        .is_some_and(|task| task.session_id == session_id)
    {
        tasks.remove(key);
    }
}
