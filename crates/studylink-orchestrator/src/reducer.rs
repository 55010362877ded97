//! Pure reduction of stream events into the classification map.
//!
//! The reducer is a deterministic fold with no I/O and no clock: replaying
//! a session's full event log from an empty map reproduces the exact map
//! the live session held, regardless of how chunks arrived.

use studylink_core::event::{
    CandidateRef, ClassifyDetails, CompareVeryLikelyDetails, SelectVeryLikelyDetails,
};
use studylink_core::{Classification, ClassificationMap, Label, Stage, StreamEvent};
use tracing::warn;

/// Apply one event to the map.
///
/// Only the classification stages touch the map; every other recognized
/// stage, and every unknown stage tag, is a no-op here. Session-level
/// progress metadata is the store's concern, not the reducer's.
pub fn apply(map: &mut ClassificationMap, event: &StreamEvent) {
    let Some(stage) = event.stage() else { return };

    match stage {
        Stage::ClassifyInitial | Stage::ClassifyUnsure => classify(map, event),
        Stage::SelectVeryLikely => promote(map, event),
        Stage::CompareVeryLikely => settle_match(map, event),
        _ => {}
    }
}

/// Rebuild a classification map from an ordered event log.
pub fn replay<'a, I>(events: I) -> ClassificationMap
where
    I: IntoIterator<Item = &'a StreamEvent>,
{
    let mut map = ClassificationMap::new();
    for event in events {
        apply(&mut map, event);
    }
    map
}

/// `classify_initial` / `classify_unsure`: upsert, last write wins.
///
/// A later re-review overwrites both label and reason of an earlier
/// verdict for the same candidate.
fn classify(map: &mut ClassificationMap, event: &StreamEvent) {
    let Some(details) = event.details_as::<ClassifyDetails>() else {
        warn!(node = ?event.node, "classification event without usable details");
        return;
    };
    let Some(candidate_id) = details.study_id.resolve() else {
        warn!(node = ?event.node, "classification event with unresolvable study id");
        return;
    };
    let label = match details.decision.parse::<Label>() {
        Ok(label) => label,
        Err(err) => {
            warn!(%err, candidate_id, "skipping decision outside the label set");
            return;
        }
    };
    let reason = details
        .reason
        .unwrap_or_else(|| "No reason provided".to_string());

    map.insert(
        candidate_id,
        Classification {
            candidate_id,
            label,
            reason,
        },
    );
}

/// `select_very_likely`: promote already-classified candidates only,
/// preserving their reasons. Ids with no entry are ignored - a candidate
/// cannot be promoted before it has been classified.
fn promote(map: &mut ClassificationMap, event: &StreamEvent) {
    let Some(details) = event.details_as::<SelectVeryLikelyDetails>() else {
        return;
    };
    for candidate in &details.very_likely_ids {
        let Some(id) = candidate.resolve() else { continue };
        if let Some(entry) = map.get_mut(&id) {
            entry.label = Label::VeryLikely;
        }
    }
}

/// `compare_very_likely`: land the final match on an existing entry.
///
/// May fire more than once; each firing applies the same rule, so a second
/// winner gains `match` while the previous holder keeps its label. An id
/// with no prior entry is ignored.
fn settle_match(map: &mut ClassificationMap, event: &StreamEvent) {
    let Some(details) = event.details_as::<CompareVeryLikelyDetails>() else {
        return;
    };
    let Some(id) = details
        .match_study_id
        .as_ref()
        .and_then(CandidateRef::resolve)
    else {
        return;
    };
    if let Some(entry) = map.get_mut(&id) {
        entry.label = Label::Match;
        if let Some(reason) = details.reason {
            entry.reason = reason;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify_event(stage: Stage, id: i64, decision: &str, reason: &str) -> StreamEvent {
        StreamEvent::progress(stage, format!("{decision}: {reason}")).with_details(json!({
            "study_id": id,
            "decision": decision,
            "reason": reason,
        }))
    }

    fn select_event(ids: &[i64]) -> StreamEvent {
        StreamEvent::progress(Stage::SelectVeryLikely, "Selected very_likely candidates.")
            .with_details(json!({ "very_likely_ids": ids }))
    }

    fn compare_event(id: i64, reason: &str) -> StreamEvent {
        StreamEvent::progress(Stage::CompareVeryLikely, "Match found!").with_details(json!({
            "match_study_id": id,
            "reason": reason,
        }))
    }

    #[test]
    fn test_last_write_wins() {
        let mut map = ClassificationMap::new();
        apply(
            &mut map,
            &classify_event(Stage::ClassifyInitial, 101, "unsure", "r1"),
        );
        apply(
            &mut map,
            &classify_event(Stage::ClassifyUnsure, 101, "match", "r2"),
        );

        let entry = &map[&101];
        assert_eq!(entry.label, Label::Match);
        assert_eq!(entry.reason, "r2");
    }

    #[test]
    fn test_promotion_requires_prior_classification() {
        let mut map = ClassificationMap::new();
        apply(&mut map, &select_event(&[202]));
        assert!(!map.contains_key(&202));
    }

    #[test]
    fn test_promotion_preserves_reason() {
        let mut map = ClassificationMap::new();
        apply(
            &mut map,
            &classify_event(Stage::ClassifyInitial, 101, "likely_match", "close titles"),
        );
        apply(&mut map, &select_event(&[101]));

        let entry = &map[&101];
        assert_eq!(entry.label, Label::VeryLikely);
        assert_eq!(entry.reason, "close titles");
    }

    #[test]
    fn test_match_requires_prior_entry() {
        let mut map = ClassificationMap::new();
        apply(&mut map, &compare_event(303, "early fire"));
        assert!(!map.contains_key(&303));
    }

    #[test]
    fn test_match_overwrites_label_and_reason() {
        let mut map = ClassificationMap::new();
        apply(
            &mut map,
            &classify_event(Stage::ClassifyInitial, 101, "likely_match", "initial"),
        );
        apply(&mut map, &select_event(&[101]));
        apply(&mut map, &compare_event(101, "final reason"));

        let entry = &map[&101];
        assert_eq!(entry.label, Label::Match);
        assert_eq!(entry.reason, "final reason");
    }

    #[test]
    fn test_second_match_moves_label_without_reverting_first() {
        let mut map = ClassificationMap::new();
        apply(
            &mut map,
            &classify_event(Stage::ClassifyInitial, 101, "likely_match", "a"),
        );
        apply(
            &mut map,
            &classify_event(Stage::ClassifyInitial, 102, "likely_match", "b"),
        );
        apply(&mut map, &compare_event(101, "first winner"));
        apply(&mut map, &compare_event(102, "second winner"));

        // The reducer never removes labels: the first winner keeps `match`.
        assert_eq!(map[&101].label, Label::Match);
        assert_eq!(map[&101].reason, "first winner");
        assert_eq!(map[&102].label, Label::Match);
        assert_eq!(map[&102].reason, "second winner");
    }

    #[test]
    fn test_progress_stages_do_not_touch_map() {
        let mut map = ClassificationMap::new();
        for stage in [
            Stage::PrepareReportPdf,
            Stage::LoadNextInitial,
            Stage::PrepareUnsureReview,
            Stage::LoadNextUnsure,
            Stage::SummarizeEvaluation,
            Stage::SuggestNewStudy,
            Stage::MatchNotFoundEnd,
        ] {
            apply(&mut map, &StreamEvent::progress(stage, "progress"));
        }
        assert!(map.is_empty());
    }

    #[test]
    fn test_unknown_stage_ignored() {
        let mut map = ClassificationMap::new();
        let event: StreamEvent = serde_json::from_str(
            r#"{"event":"node","node":"brand_new_stage","details":{"study_id":1,"decision":"match"}}"#,
        )
        .unwrap();
        apply(&mut map, &event);
        assert!(map.is_empty());
    }

    #[test]
    fn test_decision_outside_label_set_skipped() {
        let mut map = ClassificationMap::new();
        apply(
            &mut map,
            &classify_event(Stage::ClassifyInitial, 101, "definitely", "bad value"),
        );
        assert!(map.is_empty());
    }

    #[test]
    fn test_missing_details_skipped() {
        let mut map = ClassificationMap::new();
        apply(
            &mut map,
            &StreamEvent::progress(Stage::ClassifyInitial, "no details attached"),
        );
        assert!(map.is_empty());
    }

    #[test]
    fn test_string_study_ids_accepted() {
        let mut map = ClassificationMap::new();
        let event = StreamEvent::progress(Stage::ClassifyInitial, "m").with_details(json!({
            "study_id": "101",
            "decision": "unsure",
            "reason": "stringly typed",
        }));
        apply(&mut map, &event);
        assert_eq!(map[&101].label, Label::Unsure);

        let select = StreamEvent::progress(Stage::SelectVeryLikely, "m")
            .with_details(json!({ "very_likely_ids": ["101"] }));
        apply(&mut map, &select);
        assert_eq!(map[&101].label, Label::VeryLikely);
    }

    #[test]
    fn test_missing_reason_gets_placeholder() {
        let mut map = ClassificationMap::new();
        let event = StreamEvent::progress(Stage::ClassifyInitial, "m")
            .with_details(json!({ "study_id": 5, "decision": "not_match" }));
        apply(&mut map, &event);
        assert_eq!(map[&5].reason, "No reason provided");
    }

    #[test]
    fn test_replay_matches_incremental() {
        let events = vec![
            classify_event(Stage::ClassifyInitial, 101, "unsure", "weak match"),
            classify_event(Stage::ClassifyInitial, 102, "match", "strong"),
            select_event(&[101]),
            compare_event(101, "best explanation"),
        ];

        let mut incremental = ClassificationMap::new();
        for event in &events {
            apply(&mut incremental, event);
        }
        let replayed = replay(&events);

        assert_eq!(incremental, replayed);
    }

    #[test]
    fn test_full_pipeline_scenario() {
        let events = vec![
            classify_event(Stage::ClassifyInitial, 101, "unsure", "weak match"),
            classify_event(Stage::ClassifyInitial, 102, "match", "strong"),
            select_event(&[101]),
            compare_event(101, "best explanation"),
        ];
        let map = replay(&events);

        assert_eq!(map.len(), 2);
        assert_eq!(map[&101].label, Label::Match);
        assert_eq!(map[&101].reason, "best explanation");
        assert_eq!(map[&102].label, Label::Match);
        assert_eq!(map[&102].reason, "strong");
    }
}
