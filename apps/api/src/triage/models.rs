//! Data model for one triage run: inputs, per-stage candidate records, run report, errors.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::llm_client::LlmError;

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// Immutable input to one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub job_title: Option<String>,
    pub job_description: String,
    pub expected_salary: String,
    pub num_to_shortlist: u32,
}

impl JobRequest {
    /// Rejects requests that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), TriageError> {
        if self.job_description.trim().is_empty() {
            return Err(TriageError::precondition(None, "job_description cannot be empty"));
        }
        if self.num_to_shortlist == 0 {
            return Err(TriageError::precondition(
                None,
                "num_to_shortlist must be a positive integer",
            ));
        }
        Ok(())
    }
}

/// One submitted resume. Identified by its position in the batch.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub media_type: String,
    pub content: Bytes,
}

impl ResumeDocument {
    pub fn new(media_type: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.into(),
            content: content.into(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Oracle wire schema
// ────────────────────────────────────────────────────────────────────────────

/// Structured object returned by the analysis oracle for a single resume.
///
/// `matchScore` is deliberately loose: a missing or non-numeric score is a
/// ranking warning, not a schema failure. Every other listed field is required.
/// Unknown fields (e.g. the model's own `resumeRank`) are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleAssessment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub match_score: Option<Value>,
    pub top_skills: Vec<String>,
    #[serde(deserialize_with = "text_or_list")]
    pub highlights: String,
    #[serde(deserialize_with = "text_or_list")]
    pub weak_points: String,
    #[serde(deserialize_with = "text_or_list")]
    pub suggestions: String,
    pub interview_questions: Vec<String>,
    pub model_answers: Vec<String>,
    #[serde(default)]
    pub candidate_email: Option<String>,
}

/// Models sometimes answer a prose field with a bullet list; join it instead of failing.
fn text_or_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrList {
        Text(String),
        List(Vec<String>),
    }

    Ok(match TextOrList::deserialize(deserializer)? {
        TextOrList::Text(s) => s.trim().to_string(),
        TextOrList::List(items) => items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Candidate records
// ────────────────────────────────────────────────────────────────────────────

/// Normalized oracle output for one resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub source_index: usize,
    pub name: Option<String>,
    /// Exactly what the oracle reported when it was a number; `None` when missing
    /// or non-numeric. Never clamped.
    pub match_score: Option<f64>,
    pub top_skills: Vec<String>,
    pub highlights: String,
    pub weak_points: String,
    pub suggestions: String,
    pub interview_questions: Vec<String>,
    /// Index-aligned with `interview_questions` when the oracle behaves.
    pub model_answers: Vec<String>,
    pub candidate_email: Option<String>,
}

impl ScoredCandidate {
    /// Score used for ordering: the reported score when valid, otherwise 0.
    pub fn ordering_score(&self) -> f64 {
        match self.match_score {
            Some(score) if is_valid_score(score) => score,
            _ => 0.0,
        }
    }

    /// Describes why the reported score can't be trusted, if it can't.
    pub fn score_issue(&self) -> Option<String> {
        match self.match_score {
            None => Some("matchScore missing or not a number; ranked as 0".to_string()),
            Some(score) if !is_valid_score(score) => Some(format!(
                "matchScore {score} outside 0-100; ranked as 0"
            )),
            Some(_) => None,
        }
    }
}

fn is_valid_score(score: f64) -> bool {
    score.is_finite() && (0.0..=100.0).contains(&score)
}

/// A scored candidate with its position in the run's ordering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    #[serde(flatten)]
    pub candidate: ScoredCandidate,
    /// 1-based, unique and contiguous within a run.
    pub rank: u32,
}

/// Branch-specific annotation attached by the triage policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriageOutcome {
    Shortlisted {
        #[serde(skip_serializing_if = "Option::is_none")]
        salary_suggestion: Option<String>,
    },
    Rejected {
        rejection_reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriagedCandidate {
    #[serde(flatten)]
    pub candidate: ScoredCandidate,
    pub rank: u32,
    #[serde(flatten)]
    pub outcome: TriageOutcome,
}

impl TriagedCandidate {
    pub fn is_shortlisted(&self) -> bool {
        matches!(self.outcome, TriageOutcome::Shortlisted { .. })
    }

    /// Drops the triage annotation, keeping the (possibly cleared) candidate and rank.
    pub fn into_ranked(self) -> RankedCandidate {
        RankedCandidate {
            candidate: self.candidate,
            rank: self.rank,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Side-effect outcomes and run report
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotifyOutcome {
    Sent,
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompensationOutcome {
    Suggested,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DispatchAction {
    Notification(NotifyOutcome),
    Compensation(CompensationOutcome),
}

/// The one side effect attempted for a candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRecord {
    pub source_index: usize,
    pub rank: u32,
    #[serde(flatten)]
    pub action: DispatchAction,
}

/// Non-fatal problems collected over a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    MalformedScore { source_index: usize, detail: String },
    NotifyFailure { source_index: usize, reason: String },
    EstimationFailure { source_index: usize, reason: String },
}

/// Everything a successful run returns. Candidates are in ascending rank order.
#[derive(Debug, Clone, Serialize)]
pub struct TriageReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub candidates: Vec<TriagedCandidate>,
    pub dispatches: Vec<DispatchRecord>,
    pub warnings: Vec<RunWarning>,
}

impl TriageReport {
    pub fn shortlisted_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.is_shortlisted()).count()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Failure of the external analysis capability for one resume.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("response does not match the assessment schema: {0}")]
    Schema(String),

    #[error("analysis task ended abnormally: {0}")]
    Aborted(String),
}

/// Structural failures. Either one aborts the whole run.
#[derive(Debug, Error)]
pub enum TriageError {
    #[error("Invalid input for {}: {reason}", describe_target(.index))]
    Precondition { index: Option<usize>, reason: String },

    #[error("Analysis failed for resume #{index}: {source}")]
    Oracle {
        index: usize,
        #[source]
        source: OracleError,
    },
}

impl TriageError {
    pub fn precondition(index: Option<usize>, reason: impl Into<String>) -> Self {
        TriageError::Precondition {
            index,
            reason: reason.into(),
        }
    }
}

fn describe_target(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!("resume #{i}"),
        None => "job request".to_string(),
    }
}
