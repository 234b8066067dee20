//! Axum route handlers for the Triage API.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::triage::documents::{decode_data_uri, media_type_for_filename};
use crate::triage::models::{JobRequest, ResumeDocument, TriageReport};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(flatten)]
    pub job: JobRequest,
    /// `data:<mime>;base64,<payload>` per resume, in batch order.
    pub resume_data_uris: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub job_title: Option<String>,
    #[serde(flatten)]
    pub report: TriageReport,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyze
///
/// Scores, ranks and triages a batch of resumes sent as data URIs.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let docs = request
        .resume_data_uris
        .iter()
        .enumerate()
        .map(|(index, uri)| decode_data_uri(index, uri))
        .collect::<Result<Vec<_>, _>>()?;

    run_triage(&state, request.job, docs).await
}

/// POST /api/v1/analyze/upload
///
/// Multipart variant: text fields `job_title`, `job_description`, `expected_salary`,
/// `num_to_shortlist`, and one `resumes` file part per resume.
pub async fn handle_analyze_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let mut job_title = None;
    let mut job_description = None;
    let mut expected_salary = None;
    let mut num_to_shortlist = None;
    let mut docs = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(invalid_body)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resumes" | "resume" => {
                let media_type = resolve_media_type(field.content_type(), field.file_name());
                let content = field.bytes().await.map_err(invalid_body)?;
                docs.push(ResumeDocument::new(media_type, content));
            }
            "job_title" => job_title = Some(field.text().await.map_err(invalid_body)?),
            "job_description" => job_description = Some(field.text().await.map_err(invalid_body)?),
            "expected_salary" => expected_salary = Some(field.text().await.map_err(invalid_body)?),
            "num_to_shortlist" => {
                let raw = field.text().await.map_err(invalid_body)?;
                num_to_shortlist = Some(raw.trim().parse::<u32>().map_err(|_| {
                    AppError::Validation(format!(
                        "num_to_shortlist must be a positive integer, got '{raw}'"
                    ))
                })?);
            }
            other => tracing::debug!("Ignoring unknown multipart field '{other}'"),
        }
    }

    let job = JobRequest {
        job_title: job_title.filter(|t| !t.trim().is_empty()),
        job_description: job_description.unwrap_or_default(),
        expected_salary: expected_salary.unwrap_or_default(),
        num_to_shortlist: num_to_shortlist
            .ok_or_else(|| AppError::Validation("num_to_shortlist is required".to_string()))?,
    };

    run_triage(&state, job, docs).await
}

/// Runs the pipeline under the configured whole-run timeout.
/// On timeout the run future is dropped, which abandons its in-flight calls.
async fn run_triage(
    state: &AppState,
    job: JobRequest,
    docs: Vec<ResumeDocument>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let run_timeout = state.config.run_timeout;
    let report = tokio::time::timeout(run_timeout, state.pipeline.run(&job, docs))
        .await
        .map_err(|_| {
            AppError::Timeout(format!(
                "triage run exceeded {}s",
                run_timeout.as_secs_f64()
            ))
        })??;

    tracing::info!(
        "Run {}: returning {} candidates ({} shortlisted, {} warnings)",
        report.run_id,
        report.candidates.len(),
        report.shortlisted_count(),
        report.warnings.len()
    );

    Ok(Json(AnalyzeResponse {
        job_title: job.job_title,
        report,
    }))
}

fn invalid_body(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("invalid multipart body: {err}"))
}

/// Declared part content type, unless absent or generic; then the file extension.
fn resolve_media_type(declared: Option<&str>, filename: Option<&str>) -> String {
    declared
        .map(str::trim)
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .or_else(|| filename.and_then(media_type_for_filename))
        .unwrap_or_default()
        .to_string()
}
