//! Evaluation request payloads.
//!
//! Shapes mirror the upstream service's wire contract, PascalCase field
//! names included. The core checks shape only; domain semantics belong to
//! the data-fetching layer that supplies these values.

use serde::{Deserialize, Serialize};

/// The report being triaged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportPayload {
    #[serde(rename = "CRGReportID")]
    pub crg_report_id: i64,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Authors")]
    pub authors: Option<String>,
    #[serde(rename = "Year")]
    pub year: Option<i32>,
    #[serde(rename = "Abstract")]
    pub abstract_text: Option<String>,
    #[serde(rename = "ReportNumber")]
    pub report_number: Option<u32>,
    #[serde(rename = "TrialRegistrationID")]
    pub trial_registration_id: Option<String>,
}

/// A candidate study from the catalogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyPayload {
    #[serde(rename = "CRGStudyID")]
    pub crg_study_id: i64,
    #[serde(rename = "ShortName")]
    pub short_name: String,
    #[serde(rename = "StatusofStudy")]
    pub status_of_study: Option<String>,
    #[serde(rename = "NumberParticipants")]
    pub number_participants: Option<String>,
    #[serde(rename = "Duration")]
    pub duration: Option<String>,
    #[serde(rename = "Comparison")]
    pub comparison: Option<String>,
    #[serde(rename = "Countries")]
    pub countries: Option<String>,
    #[serde(rename = "Notes")]
    pub notes: Option<String>,
    #[serde(rename = "TrialRegistrationID")]
    pub trial_registration_id: Option<String>,
}

/// Optional per-stage prompt overrides, forwarded verbatim upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_eval_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likely_group_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likely_compare_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsure_review_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_prompt: Option<String>,
}

/// Body of a streaming evaluation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    /// The report under triage.
    pub report: ReportPayload,
    /// Candidate studies to classify against the report.
    pub studies: Vec<StudyPayload>,
    /// Model selection, service default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Whether the service should attach the report PDF.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_pdf: Option<bool>,
    /// Per-stage prompt overrides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_overrides: Option<PromptOverrides>,
}

impl EvaluateRequest {
    /// Create a request with service defaults for everything optional.
    pub fn new(report: ReportPayload, studies: Vec<StudyPayload>) -> Self {
        Self {
            report,
            studies,
            model: None,
            include_pdf: None,
            prompt_overrides: None,
        }
    }

    /// Select a model explicitly.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Ask the service to attach the report PDF.
    pub fn with_pdf(mut self, include_pdf: bool) -> Self {
        self.include_pdf = Some(include_pdf);
        self
    }

    /// Override pipeline prompts.
    pub fn with_prompt_overrides(mut self, overrides: PromptOverrides) -> Self {
        self.prompt_overrides = Some(overrides);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let request = EvaluateRequest::new(
            ReportPayload {
                crg_report_id: 9001,
                title: "Effects of X on Y".to_string(),
                ..Default::default()
            },
            vec![StudyPayload {
                crg_study_id: 101,
                short_name: "SMITH 2019".to_string(),
                ..Default::default()
            }],
        );

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""CRGReportID":9001"#));
        assert!(json.contains(r#""CRGStudyID":101"#));
        assert!(json.contains(r#""ShortName":"SMITH 2019""#));
        // Unset optionals stay off the wire entirely.
        assert!(!json.contains("model"));
        assert!(!json.contains("prompt_overrides"));
    }

    #[test]
    fn test_builder_options() {
        let request = EvaluateRequest::new(ReportPayload::default(), vec![])
            .with_model("gpt-5")
            .with_pdf(true)
            .with_prompt_overrides(PromptOverrides {
                summary_prompt: Some("Summarize briefly.".to_string()),
                ..Default::default()
            });

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""model":"gpt-5""#));
        assert!(json.contains(r#""include_pdf":true"#));
        assert!(json.contains(r#""summary_prompt":"Summarize briefly.""#));
        assert!(!json.contains("pdf_prompt"));
    }
}
