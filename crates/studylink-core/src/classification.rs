//! Per-candidate classification results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of a candidate study within a report's candidate set.
pub type CandidateId = i64;

/// Ordered map from candidate id to its current classification.
///
/// Absence of an entry means the candidate has not been classified yet -
/// it does NOT mean `not_match`.
pub type ClassificationMap = BTreeMap<CandidateId, Classification>;

/// Closed set of classification labels the pipeline can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// The candidate is not the study this report belongs to.
    NotMatch,
    /// The pipeline could not decide on first pass.
    Unsure,
    /// Plausible but unconfirmed.
    LikelyMatch,
    /// Short-listed for the final comparison.
    VeryLikely,
    /// The winning candidate.
    Match,
}

impl Label {
    /// Wire representation of the label.
    pub fn as_str(self) -> &'static str {
        match self {
            Label::NotMatch => "not_match",
            Label::Unsure => "unsure",
            Label::LikelyMatch => "likely_match",
            Label::VeryLikely => "very_likely",
            Label::Match => "match",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for decision strings outside the closed label set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized classification label: {0}")]
pub struct ParseLabelError(pub String);

impl FromStr for Label {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_match" => Ok(Label::NotMatch),
            "unsure" => Ok(Label::Unsure),
            "likely_match" => Ok(Label::LikelyMatch),
            "very_likely" => Ok(Label::VeryLikely),
            "match" => Ok(Label::Match),
            other => Err(ParseLabelError(other.to_string())),
        }
    }
}

/// Classification of one candidate within one session.
///
/// Created by the first `classify_*` event naming the candidate; later
/// events overwrite label and reason in place. Entries are never removed
/// within a session; the whole map is discarded on restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// The candidate this verdict applies to.
    pub candidate_id: CandidateId,
    /// Current label, last write wins.
    pub label: Label,
    /// Free-text justification, overwritten by later events.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for label in [
            Label::NotMatch,
            Label::Unsure,
            Label::LikelyMatch,
            Label::VeryLikely,
            Label::Match,
        ] {
            assert_eq!(label.as_str().parse::<Label>().unwrap(), label);
        }
    }

    #[test]
    fn test_label_rejects_unknown() {
        let err = "definitely_match".parse::<Label>().unwrap_err();
        assert_eq!(err.0, "definitely_match");
    }

    #[test]
    fn test_label_serde_snake_case() {
        let json = serde_json::to_string(&Label::VeryLikely).unwrap();
        assert_eq!(json, r#""very_likely""#);
        let back: Label = serde_json::from_str(r#""not_match""#).unwrap();
        assert_eq!(back, Label::NotMatch);
    }
}
