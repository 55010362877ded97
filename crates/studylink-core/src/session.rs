//! Session identity and lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::classification::ClassificationMap;
use crate::event::StreamEvent;

/// Key identifying one report within a batch.
///
/// At most one *active* classification session exists per key at any
/// instant; a restart replaces the previous session wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    /// Batch the report belongs to.
    pub batch_id: String,
    /// Position of the report within the batch.
    pub report_index: u32,
}

impl SessionKey {
    /// Create a key for a report within a batch.
    pub fn new(batch_id: impl Into<String>, report_index: u32) -> Self {
        Self {
            batch_id: batch_id.into(),
            report_index,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.batch_id, self.report_index)
    }
}

/// Session status in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No session has been started for the key.
    Idle,
    /// Events are being consumed from an open transport.
    Streaming,
    /// The pipeline finished and signalled the terminal marker.
    Completed,
    /// The transport or decoder failed; see the session's error message.
    Error,
    /// The caller cancelled the session.
    Cancelled,
}

impl SessionStatus {
    /// Whether this status ends the session.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Error | SessionStatus::Cancelled
        )
    }
}

/// One run of the classification pipeline for a key.
///
/// Events are appended only while `streaming`; the session reaches a
/// terminal status exactly once. A restart for the same key creates a
/// brand-new session object and discards this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSession {
    /// Identity of this run; late events from a replaced run are rejected
    /// by comparing against it.
    pub id: Uuid,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Append-only receipt log of every decoded event, for replay/audit.
    pub events: Vec<StreamEvent>,
    /// Last human-readable progress string from the pipeline.
    pub current_message: Option<String>,
    /// Failure description, present only in `error` status.
    pub error: Option<String>,
    /// Per-candidate classification results so far.
    pub classifications: ClassificationMap,
    /// When the session was admitted.
    pub started_at: DateTime<Utc>,
    /// When the session reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl EvaluationSession {
    /// Create a fresh session, already in `streaming` status.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: SessionStatus::Streaming,
            events: Vec::new(),
            current_message: None,
            error: None,
            classifications: ClassificationMap::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

impl Default for EvaluationSession {
    fn default() -> Self {
        Self::new()
    }
}
