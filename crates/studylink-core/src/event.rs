//! Stream event envelope and stage-specific payloads.
//!
//! The event feed is the single source of truth for session state. Events
//! are kept verbatim in the session log - including stages the reducer does
//! not recognize - so a log replay always reconstructs what the live
//! session held.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

use crate::classification::CandidateId;

/// The distinguished `event` value signalling successful stream end.
pub const TERMINAL_EVENT: &str = "complete";

/// A single decoded record from the evaluation stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Event kind; anything other than `complete` is an ordinary record.
    pub event: String,
    /// Pipeline stage that produced this record, raw as received.
    ///
    /// Unknown stage tags are preserved here but ignored by the reducer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Human-readable progress message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Stage-specific structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// When this record was decoded, stamped locally.
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl StreamEvent {
    /// Build an ordinary progress record for a stage.
    pub fn progress(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            event: "node".to_string(),
            node: Some(stage.as_str().to_string()),
            message: Some(message.into()),
            details: None,
            received_at: Utc::now(),
        }
    }

    /// Attach a structured details payload.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// The terminal marker record.
    pub fn terminal() -> Self {
        Self {
            event: TERMINAL_EVENT.to_string(),
            node: None,
            message: None,
            details: None,
            received_at: Utc::now(),
        }
    }

    /// Whether this record is the terminal marker.
    pub fn is_terminal(&self) -> bool {
        self.event == TERMINAL_EVENT
    }

    /// Parse the stage tag, if present and recognized.
    pub fn stage(&self) -> Option<Stage> {
        self.node.as_deref().and_then(|node| node.parse().ok())
    }

    /// Deserialize the details payload into a typed shape.
    ///
    /// Returns `None` when details are absent or do not fit `T`; callers
    /// treat that as a skip, never a stream failure.
    pub fn details_as<T: DeserializeOwned>(&self) -> Option<T> {
        let details = self.details.clone()?;
        serde_json::from_value(details).ok()
    }
}

/// Closed set of pipeline stages announced over the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Report PDF attachment preparation.
    PrepareReportPdf,
    /// Next candidate queued for initial classification.
    LoadNextInitial,
    /// Initial verdict for one candidate.
    ClassifyInitial,
    /// Short-listing of very-likely candidates.
    SelectVeryLikely,
    /// Final comparison among the very-likely set.
    CompareVeryLikely,
    /// Unsure-review queue prepared.
    PrepareUnsureReview,
    /// Next unsure candidate queued for re-review.
    LoadNextUnsure,
    /// Re-review verdict for one unsure candidate.
    ClassifyUnsure,
    /// Closing summary of the whole evaluation.
    SummarizeEvaluation,
    /// The pipeline drafted a new study it could not match.
    SuggestNewStudy,
    /// No match was found after all reviews.
    MatchNotFoundEnd,
}

impl Stage {
    /// Wire representation of the stage tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::PrepareReportPdf => "prepare_report_pdf",
            Stage::LoadNextInitial => "load_next_initial",
            Stage::ClassifyInitial => "classify_initial",
            Stage::SelectVeryLikely => "select_very_likely",
            Stage::CompareVeryLikely => "compare_very_likely",
            Stage::PrepareUnsureReview => "prepare_unsure_review",
            Stage::LoadNextUnsure => "load_next_unsure",
            Stage::ClassifyUnsure => "classify_unsure",
            Stage::SummarizeEvaluation => "summarize_evaluation",
            Stage::SuggestNewStudy => "suggest_new_study",
            Stage::MatchNotFoundEnd => "match_not_found_end",
        }
    }
}

/// Error for stage tags outside the closed set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown pipeline stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prepare_report_pdf" => Ok(Stage::PrepareReportPdf),
            "load_next_initial" => Ok(Stage::LoadNextInitial),
            "classify_initial" => Ok(Stage::ClassifyInitial),
            "select_very_likely" => Ok(Stage::SelectVeryLikely),
            "compare_very_likely" => Ok(Stage::CompareVeryLikely),
            "prepare_unsure_review" => Ok(Stage::PrepareUnsureReview),
            "load_next_unsure" => Ok(Stage::LoadNextUnsure),
            "classify_unsure" => Ok(Stage::ClassifyUnsure),
            "summarize_evaluation" => Ok(Stage::SummarizeEvaluation),
            "suggest_new_study" => Ok(Stage::SuggestNewStudy),
            "match_not_found_end" => Ok(Stage::MatchNotFoundEnd),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// Candidate ids arrive as JSON numbers or numeric strings; both occur in
/// the wild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateRef {
    /// Already numeric.
    Id(CandidateId),
    /// Stringified number.
    Text(String),
}

impl CandidateRef {
    /// Resolve to a numeric candidate id, if the text form parses.
    pub fn resolve(&self) -> Option<CandidateId> {
        match self {
            CandidateRef::Id(id) => Some(*id),
            CandidateRef::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// Details carried by `classify_initial` and `classify_unsure`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyDetails {
    /// Candidate the verdict applies to.
    pub study_id: CandidateRef,
    /// Decision string; must parse into the closed label set.
    pub decision: String,
    /// Free-text justification.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Details carried by `select_very_likely`.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectVeryLikelyDetails {
    /// Candidates promoted to the very-likely short list.
    #[serde(default)]
    pub very_likely_ids: Vec<CandidateRef>,
}

/// Details carried by `compare_very_likely`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompareVeryLikelyDetails {
    /// The winning candidate, absent when no match was chosen.
    #[serde(default)]
    pub match_study_id: Option<CandidateRef>,
    /// Justification for the final decision.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Details carried by `suggest_new_study`.
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestNewStudyDetails {
    /// Draft study record proposed by the pipeline.
    #[serde(default)]
    pub new_study: Option<Value>,
}
