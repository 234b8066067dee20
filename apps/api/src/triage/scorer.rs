//! Resume Scorer: one oracle call per resume, normalized into a `ScoredCandidate`.
//!
//! The oracle sits behind `AnalysisClient` so the pipeline can run against a
//! test double. `LlmAnalysisClient` is the production backend.

use async_trait::async_trait;
use tracing::debug;

use crate::llm_client::prompts::EVIDENCE_INSTRUCTION;
use crate::llm_client::{self, DocumentInput, LlmClient, LlmError};
use crate::triage::models::{
    JobRequest, OracleAssessment, OracleError, ResumeDocument, ScoredCandidate, TriageError,
};
use crate::triage::prompts::{ANALYSIS_PROMPT_TEMPLATE, ANALYSIS_SYSTEM};

/// The external analysis capability. Stateless per call.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Whether this backend can read documents of `media_type` at all.
    fn accepts_media_type(&self, _media_type: &str) -> bool {
        true
    }

    async fn analyze(
        &self,
        job_description: &str,
        doc: &ResumeDocument,
    ) -> Result<OracleAssessment, OracleError>;
}

/// Oracle backed by Claude. The resume is attached as a document block.
pub struct LlmAnalysisClient(pub LlmClient);

#[async_trait]
impl AnalysisClient for LlmAnalysisClient {
    fn accepts_media_type(&self, media_type: &str) -> bool {
        llm_client::supports_media_type(media_type)
    }

    async fn analyze(
        &self,
        job_description: &str,
        doc: &ResumeDocument,
    ) -> Result<OracleAssessment, OracleError> {
        let prompt = ANALYSIS_PROMPT_TEMPLATE
            .replace("{job_description}", job_description)
            .replace("{evidence_instruction}", EVIDENCE_INSTRUCTION);

        let document = DocumentInput {
            media_type: &doc.media_type,
            data: &doc.content,
        };

        self.0
            .call_json_with_document_once::<OracleAssessment>(&prompt, ANALYSIS_SYSTEM, document)
            .await
            .map_err(|e| match e {
                LlmError::Parse(parse) => OracleError::Schema(parse.to_string()),
                other => OracleError::Llm(other),
            })
    }
}

/// Precondition checks for one document. Runs before any oracle call.
pub fn check_document(
    oracle: &dyn AnalysisClient,
    index: usize,
    doc: &ResumeDocument,
) -> Result<(), TriageError> {
    if doc.content.is_empty() {
        return Err(TriageError::precondition(Some(index), "resume is empty"));
    }
    if doc.media_type.trim().is_empty() {
        return Err(TriageError::precondition(Some(index), "resume media type is not set"));
    }
    if !oracle.accepts_media_type(&doc.media_type) {
        return Err(TriageError::precondition(
            Some(index),
            format!("unsupported media type '{}'", doc.media_type),
        ));
    }
    Ok(())
}

/// Scores the resume at batch position `index` against the job description.
/// No retry: oracle failures propagate to the caller.
pub async fn score(
    oracle: &dyn AnalysisClient,
    job: &JobRequest,
    index: usize,
    doc: &ResumeDocument,
) -> Result<ScoredCandidate, TriageError> {
    check_document(oracle, index, doc)?;

    let assessment = oracle
        .analyze(&job.job_description, doc)
        .await
        .map_err(|source| TriageError::Oracle { index, source })?;

    Ok(normalize(index, assessment))
}

fn normalize(index: usize, assessment: OracleAssessment) -> ScoredCandidate {
    let match_score = assessment.match_score.as_ref().and_then(|v| v.as_f64());
    if match_score.is_none() {
        debug!(
            "Resume #{index}: oracle score {:?} is not numeric",
            assessment.match_score
        );
    }

    ScoredCandidate {
        source_index: index,
        name: non_blank(assessment.name),
        match_score,
        top_skills: assessment.top_skills,
        highlights: assessment.highlights,
        weak_points: assessment.weak_points,
        suggestions: assessment.suggestions,
        interview_questions: assessment.interview_questions,
        model_answers: assessment.model_answers,
        candidate_email: non_blank(assessment.candidate_email).filter(|e| e.contains('@')),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
}
