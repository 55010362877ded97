//! Read-model store for classification sessions.
//!
//! One process-wide instance owns every session's observable state behind a
//! small method surface - no ambient singletons. The interior mutex guards
//! only synchronous map updates and is never held across an await, so
//! per-session events apply strictly in arrival order.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use studylink_core::{
    CandidateId, Classification, ClassificationMap, EvaluationSession, SessionKey, SessionStatus,
    StreamEvent,
};

use crate::admission::{AdmissionController, AdmissionDecision};
use crate::reducer;

/// Outcome of an attempt to begin a session.
#[derive(Debug)]
pub(crate) enum BeginOutcome {
    /// A fresh session is registered and streaming.
    Started { session_id: Uuid },
    /// Admission rejected the start; nothing changed.
    AtCapacity { running: usize, cap: usize },
}

/// Terminal outcome reported by the lifecycle layer.
#[derive(Debug)]
pub(crate) enum SessionOutcome {
    /// Terminal marker observed, or the stream ended cleanly.
    Completed,
    /// The caller cancelled the session.
    Cancelled,
    /// Transport or unrecoverable decode failure.
    Failed(String),
}

#[derive(Default)]
struct StoreInner {
    /// Latest session per key, terminal ones included.
    sessions: HashMap<SessionKey, EvaluationSession>,
    /// Keys currently in `streaming` status; cardinality is the enforced
    /// concurrency bound.
    streaming: HashSet<SessionKey>,
    /// Suggestion keys the user has dismissed. Independent of session
    /// lifecycle: survives restarts for the same key until cleared.
    dismissed_suggestions: HashSet<String>,
}

/// The externally observable state of all classification sessions.
#[derive(Default)]
pub struct ClassificationStore {
    inner: Mutex<StoreInner>,
}

impl ClassificationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Mutations (driven by the lifecycle layer)
    // ========================================================================

    /// Register a brand-new streaming session for `key`.
    ///
    /// Admission, teardown of the key's previous session, and the new
    /// session's `streaming` transition happen in one critical section. A
    /// key that is already streaming does not count against the cap - its
    /// old session is discarded in the same step.
    pub(crate) fn begin_session(
        &self,
        key: &SessionKey,
        admission: &AdmissionController,
    ) -> BeginOutcome {
        let mut inner = self.inner.lock();

        let running = inner.streaming.len() - usize::from(inner.streaming.contains(key));
        if let AdmissionDecision::AtCapacity { running, cap } = admission.check(running) {
            return BeginOutcome::AtCapacity { running, cap };
        }

        let session = EvaluationSession::new();
        let session_id = session.id;
        if inner.sessions.insert(key.clone(), session).is_some() {
            debug!(%key, "replaced previous session for key");
        }
        inner.streaming.insert(key.clone());

        BeginOutcome::Started { session_id }
    }

    /// Apply one decoded event to the session it belongs to.
    ///
    /// The event is dropped unless `session_id` matches the key's current
    /// session and that session is still streaming - late bytes from a
    /// cancelled or replaced transport can never corrupt a successor.
    /// Returns whether the event was applied.
    pub(crate) fn apply_event(
        &self,
        key: &SessionKey,
        session_id: Uuid,
        event: StreamEvent,
    ) -> bool {
        let mut inner = self.inner.lock();

        let Some(session) = inner.sessions.get_mut(key) else {
            debug!(%key, "dropping event for unknown session");
            return false;
        };
        if session.id != session_id || session.status != SessionStatus::Streaming {
            debug!(%key, %session_id, "dropping stale event");
            return false;
        }

        session.current_message = event.message.clone();
        reducer::apply(&mut session.classifications, &event);
        session.events.push(event);
        true
    }

    /// Move a session to its terminal status and free its slot.
    ///
    /// Slot release and the status transition share one critical section,
    /// so the observable concurrency never exceeds the cap. Ignored when
    /// `session_id` is stale or the session already terminated. Returns
    /// whether the transition happened.
    pub(crate) fn finish(
        &self,
        key: &SessionKey,
        session_id: Uuid,
        outcome: SessionOutcome,
    ) -> bool {
        let mut inner = self.inner.lock();

        let Some(session) = inner.sessions.get_mut(key) else {
            return false;
        };
        if session.id != session_id || session.status != SessionStatus::Streaming {
            return false;
        }

        match outcome {
            SessionOutcome::Completed => session.status = SessionStatus::Completed,
            SessionOutcome::Cancelled => session.status = SessionStatus::Cancelled,
            SessionOutcome::Failed(message) => {
                session.status = SessionStatus::Error;
                session.error = Some(message);
            }
        }
        session.finished_at = Some(Utc::now());
        inner.streaming.remove(key);
        true
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current status for `key`; `idle` when no session was ever started.
    pub fn status(&self, key: &SessionKey) -> SessionStatus {
        self.inner
            .lock()
            .sessions
            .get(key)
            .map(|s| s.status)
            .unwrap_or(SessionStatus::Idle)
    }

    /// Last progress message for `key`.
    pub fn current_message(&self, key: &SessionKey) -> Option<String> {
        self.inner
            .lock()
            .sessions
            .get(key)
            .and_then(|s| s.current_message.clone())
    }

    /// Failure description for `key`, present only in `error` status.
    pub fn error(&self, key: &SessionKey) -> Option<String> {
        self.inner
            .lock()
            .sessions
            .get(key)
            .and_then(|s| s.error.clone())
    }

    /// Full ordered event log for `key`.
    pub fn events(&self, key: &SessionKey) -> Vec<StreamEvent> {
        self.inner
            .lock()
            .sessions
            .get(key)
            .map(|s| s.events.clone())
            .unwrap_or_default()
    }

    /// Classification map for `key`.
    pub fn classifications(&self, key: &SessionKey) -> ClassificationMap {
        self.inner
            .lock()
            .sessions
            .get(key)
            .map(|s| s.classifications.clone())
            .unwrap_or_default()
    }

    /// Classification of one candidate within `key`'s session.
    pub fn classification(
        &self,
        key: &SessionKey,
        candidate_id: CandidateId,
    ) -> Option<Classification> {
        self.inner
            .lock()
            .sessions
            .get(key)
            .and_then(|s| s.classifications.get(&candidate_id).cloned())
    }

    /// Snapshot of the whole session for `key`.
    pub fn session(&self, key: &SessionKey) -> Option<EvaluationSession> {
        self.inner.lock().sessions.get(key).cloned()
    }

    /// Number of sessions currently streaming.
    pub fn streaming_count(&self) -> usize {
        self.inner.lock().streaming.len()
    }

    /// Whether `key` has a streaming session.
    pub fn is_streaming(&self, key: &SessionKey) -> bool {
        self.inner.lock().streaming.contains(key)
    }

    // ========================================================================
    // Suggestion acknowledgements
    // ========================================================================

    /// Mark a suggestion as dismissed by the user.
    pub fn dismiss_suggestion(&self, suggestion_key: impl Into<String>) {
        self.inner
            .lock()
            .dismissed_suggestions
            .insert(suggestion_key.into());
    }

    /// Whether the user has dismissed the given suggestion.
    pub fn is_suggestion_dismissed(&self, suggestion_key: &str) -> bool {
        self.inner
            .lock()
            .dismissed_suggestions
            .contains(suggestion_key)
    }

    /// Forget every dismissed suggestion.
    pub fn clear_dismissed_suggestions(&self) {
        self.inner.lock().dismissed_suggestions.clear();
    }
}
