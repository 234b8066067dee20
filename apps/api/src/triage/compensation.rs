//! Compensation Advisor: salary suggestions for shortlisted candidates.
//!
//! Default: `ExpectedRangeEstimator` (echoes the budgeted range, no external call).
//! `LlmSalaryEstimator` is enabled with ENABLE_LLM_SALARY_ESTIMATION.

use async_trait::async_trait;
use thiserror::Error;

use crate::llm_client::prompts::EVIDENCE_INSTRUCTION;
use crate::llm_client::{LlmClient, LlmError};
use crate::triage::models::{JobRequest, TriageOutcome, TriagedCandidate};
use crate::triage::prompts::{SALARY_PROMPT_TEMPLATE, SALARY_SYSTEM};

/// Resume text beyond this many characters is cut before prompting.
const MAX_RESUME_CHARS: usize = 12_000;

#[derive(Debug, Error)]
pub enum EstimationError {
    #[error("candidate is not shortlisted")]
    NotShortlisted,

    #[error("estimator failed: {0}")]
    Estimator(#[from] LlmError),

    #[error("estimator returned an empty suggestion")]
    Empty,
}

/// Context handed to the external estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryEstimateRequest {
    pub job_description: String,
    pub expected_salary: String,
    pub resume_text: String,
    pub top_skills: String,
    pub highlights: String,
}

#[async_trait]
pub trait SalaryEstimator: Send + Sync {
    async fn estimate(&self, request: &SalaryEstimateRequest) -> Result<String, EstimationError>;
}

/// Requests a salary suggestion for one shortlisted candidate.
pub async fn suggest_salary(
    estimator: &dyn SalaryEstimator,
    job: &JobRequest,
    candidate: &TriagedCandidate,
    resume_text: &str,
) -> Result<String, EstimationError> {
    if !matches!(candidate.outcome, TriageOutcome::Shortlisted { .. }) {
        return Err(EstimationError::NotShortlisted);
    }

    let request = SalaryEstimateRequest {
        job_description: job.job_description.clone(),
        expected_salary: job.expected_salary.clone(),
        resume_text: resume_text.to_string(),
        top_skills: candidate.candidate.top_skills.join(", "),
        highlights: candidate.candidate.highlights.clone(),
    };

    let suggestion = estimator.estimate(&request).await?;
    let suggestion = suggestion.trim();
    if suggestion.is_empty() {
        return Err(EstimationError::Empty);
    }
    Ok(suggestion.to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Estimators
// ────────────────────────────────────────────────────────────────────────────

/// Suggests the budgeted range as-is.
pub struct ExpectedRangeEstimator;

#[async_trait]
impl SalaryEstimator for ExpectedRangeEstimator {
    async fn estimate(&self, request: &SalaryEstimateRequest) -> Result<String, EstimationError> {
        Ok(format!(
            "Based on your qualifications, a suggested salary is in the range of {}",
            request.expected_salary.trim()
        ))
    }
}

/// Salary suggestion written by Claude from the job, budget and resume.
pub struct LlmSalaryEstimator(pub LlmClient);

#[async_trait]
impl SalaryEstimator for LlmSalaryEstimator {
    async fn estimate(&self, request: &SalaryEstimateRequest) -> Result<String, EstimationError> {
        let prompt = build_salary_prompt(request);
        Ok(self.0.call_text(&prompt, SALARY_SYSTEM).await?)
    }
}

fn build_salary_prompt(request: &SalaryEstimateRequest) -> String {
    let resume_text: String = request.resume_text.chars().take(MAX_RESUME_CHARS).collect();
    let top_skills = if request.top_skills.is_empty() {
        "not listed"
    } else {
        request.top_skills.as_str()
    };

    SALARY_PROMPT_TEMPLATE
        .replace("{job_description}", &request.job_description)
        .replace("{expected_salary}", &request.expected_salary)
        .replace("{top_skills}", top_skills)
        .replace("{highlights}", &request.highlights)
        .replace("{resume_text}", &resume_text)
        .replace("{evidence_instruction}", EVIDENCE_INSTRUCTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::models::ScoredCandidate;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingEstimator {
        seen: Mutex<Vec<SalaryEstimateRequest>>,
        reply: String,
    }

    #[async_trait]
    impl SalaryEstimator for CapturingEstimator {
        async fn estimate(
            &self,
            request: &SalaryEstimateRequest,
        ) -> Result<String, EstimationError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }
    }

    fn job() -> JobRequest {
        JobRequest {
            job_title: None,
            job_description: "Senior Rust engineer".to_string(),
            expected_salary: "$160k-$180k".to_string(),
            num_to_shortlist: 1,
        }
    }

    fn shortlisted() -> TriagedCandidate {
        TriagedCandidate {
            candidate: ScoredCandidate {
                source_index: 0,
                name: None,
                match_score: Some(91.0),
                top_skills: vec!["Rust".to_string(), "Tokio".to_string()],
                highlights: "Led a storage rewrite".to_string(),
                weak_points: String::new(),
                suggestions: String::new(),
                interview_questions: vec![],
                model_answers: vec![],
                candidate_email: None,
            },
            rank: 1,
            outcome: TriageOutcome::Shortlisted {
                salary_suggestion: None,
            },
        }
    }

    #[tokio::test]
    async fn test_estimator_receives_full_context() {
        let estimator = CapturingEstimator {
            reply: "  $175k  ".to_string(),
            ..Default::default()
        };
        let suggestion = suggest_salary(&estimator, &job(), &shortlisted(), "resume body")
            .await
            .unwrap();
        assert_eq!(suggestion, "$175k");

        let seen = estimator.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            SalaryEstimateRequest {
                job_description: "Senior Rust engineer".to_string(),
                expected_salary: "$160k-$180k".to_string(),
                resume_text: "resume body".to_string(),
                top_skills: "Rust, Tokio".to_string(),
                highlights: "Led a storage rewrite".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_blank_suggestion_is_failure() {
        let estimator = CapturingEstimator::default();
        let err = suggest_salary(&estimator, &job(), &shortlisted(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, EstimationError::Empty));
    }

    #[tokio::test]
    async fn test_rejected_candidate_is_not_estimated() {
        let estimator = CapturingEstimator::default();
        let mut candidate = shortlisted();
        candidate.outcome = TriageOutcome::Rejected {
            rejection_reason: "no".to_string(),
        };
        let err = suggest_salary(&estimator, &job(), &candidate, "")
            .await
            .unwrap_err();
        assert!(matches!(err, EstimationError::NotShortlisted));
        assert!(estimator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expected_range_estimator_echoes_budget() {
        let suggestion = suggest_salary(&ExpectedRangeEstimator, &job(), &shortlisted(), "")
            .await
            .unwrap();
        assert_eq!(
            suggestion,
            "Based on your qualifications, a suggested salary is in the range of $160k-$180k"
        );
    }

    #[test]
    fn test_salary_prompt_fills_every_placeholder() {
        let prompt = build_salary_prompt(&SalaryEstimateRequest {
            job_description: "JD".to_string(),
            expected_salary: "$100k".to_string(),
            resume_text: "x".repeat(MAX_RESUME_CHARS + 50),
            top_skills: String::new(),
            highlights: "H".to_string(),
        });
        assert!(!prompt.contains('{'));
        assert!(prompt.contains("not listed"));
        assert!(!prompt.contains(&"x".repeat(MAX_RESUME_CHARS + 1)));
    }
}
