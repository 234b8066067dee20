//! Triage Pipeline: orchestrates one run end to end.
//!
//! Flow: validate inputs → score every resume (bounded fan-out, joined at a barrier)
//!       → rank → triage → one side effect per candidate (bounded fan-out, each with
//!       its own timeout) → report.
//!
//! Only input validation and scoring can fail a run. Notification and salary
//! estimation failures are recorded per candidate in the report.
//!
//! Dropping the future returned by `run` abandons the run: both stages keep their
//! tasks in a `JoinSet`, which aborts whatever is still in flight when dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::triage::compensation::{suggest_salary, SalaryEstimator};
use crate::triage::documents::extract_text;
use crate::triage::models::{
    CompensationOutcome, DispatchAction, DispatchRecord, JobRequest, NotifyOutcome, OracleError,
    ResumeDocument, RunWarning, ScoredCandidate, TriageError, TriageOutcome, TriageReport,
    TriagedCandidate,
};
use crate::triage::notifier::{notify, RejectionNotifier};
use crate::triage::policy::{triage, DEFAULT_REJECTION_TEMPLATE};
use crate::triage::ranker::{rank, Ranking};
use crate::triage::scorer::{check_document, score, AnalysisClient};

/// Tunables for a pipeline. Shared by every run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Max in-flight oracle calls within one run.
    pub max_concurrent_analyses: usize,
    /// Max in-flight notify/estimate calls within one run.
    pub max_concurrent_dispatches: usize,
    pub dispatch_timeout: Duration,
    pub rejection_reason_template: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_analyses: 4,
            max_concurrent_dispatches: 8,
            dispatch_timeout: Duration::from_secs(30),
            rejection_reason_template: DEFAULT_REJECTION_TEMPLATE.to_string(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_analyses: config.max_concurrent_analyses,
            max_concurrent_dispatches: config.max_concurrent_dispatches,
            dispatch_timeout: config.dispatch_timeout,
            rejection_reason_template: config.rejection_reason_template.clone(),
        }
    }
}

/// Result of one candidate's dispatch task.
struct DispatchResult {
    action: DispatchAction,
    salary_suggestion: Option<String>,
}

/// The resume triage pipeline. Holds no per-run state, so runs are independent.
pub struct TriagePipeline {
    analysis: Arc<dyn AnalysisClient>,
    notifier: Arc<dyn RejectionNotifier>,
    estimator: Arc<dyn SalaryEstimator>,
    settings: PipelineSettings,
}

impl TriagePipeline {
    pub fn new(
        analysis: Arc<dyn AnalysisClient>,
        notifier: Arc<dyn RejectionNotifier>,
        estimator: Arc<dyn SalaryEstimator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            analysis,
            notifier,
            estimator,
            settings,
        }
    }

    /// Runs the full pipeline for one batch. Candidates come back in ascending rank order.
    pub async fn run(
        &self,
        job: &JobRequest,
        docs: Vec<ResumeDocument>,
    ) -> Result<TriageReport, TriageError> {
        let run_id = Uuid::new_v4();

        // Step 1: Preconditions, before any external call
        job.validate()?;
        if docs.is_empty() {
            return Err(TriageError::precondition(None, "at least one resume is required"));
        }
        for (index, doc) in docs.iter().enumerate() {
            check_document(self.analysis.as_ref(), index, doc)?;
        }

        let job = Arc::new(job.clone());
        info!("Run {run_id}: scoring {} resumes", docs.len());

        // Step 2: Score (barrier: every resume must be scored before ranking)
        let scored = self.score_all(run_id, &job, &docs).await?;

        // Step 3: Rank
        let Ranking {
            candidates: ranked,
            mut warnings,
        } = rank(scored);
        for warning in &warnings {
            warn!("Run {run_id}: {warning:?}");
        }

        // Step 4: Triage
        let triaged = triage(
            ranked,
            job.num_to_shortlist,
            &self.settings.rejection_reason_template,
        );
        let shortlisted = triaged.iter().filter(|c| c.is_shortlisted()).count();
        info!(
            "Run {run_id}: {shortlisted} shortlisted, {} rejected",
            triaged.len() - shortlisted
        );

        // Step 5: One side effect per candidate
        let (candidates, dispatches) = self.dispatch_all(run_id, &job, &docs, triaged).await;
        warnings.extend(dispatches.iter().filter_map(dispatch_warning));

        info!(
            "Run {run_id}: complete with {} warnings",
            warnings.len()
        );

        Ok(TriageReport {
            run_id,
            generated_at: Utc::now(),
            candidates,
            dispatches,
            warnings,
        })
    }

    /// Scores every document with at most `max_concurrent_analyses` oracle calls in flight.
    /// The first oracle failure aborts the remaining calls.
    async fn score_all(
        &self,
        run_id: Uuid,
        job: &Arc<JobRequest>,
        docs: &[ResumeDocument],
    ) -> Result<Vec<ScoredCandidate>, TriageError> {
        let limiter = Arc::new(Semaphore::new(self.settings.max_concurrent_analyses.max(1)));
        let mut tasks = JoinSet::new();

        for (index, doc) in docs.iter().cloned().enumerate() {
            let oracle = Arc::clone(&self.analysis);
            let job = Arc::clone(job);
            let limiter = Arc::clone(&limiter);
            tasks.spawn(async move {
                // Never closed, so acquisition cannot fail.
                let _permit = limiter.acquire_owned().await.ok();
                score(oracle.as_ref(), &job, index, &doc).await
            });
        }

        let mut slots: Vec<Option<ScoredCandidate>> = vec![None; docs.len()];
        let mut abnormal_exit: Option<String> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(candidate)) => {
                    let index = candidate.source_index;
                    slots[index] = Some(candidate);
                }
                Ok(Err(err)) => {
                    warn!("Run {run_id}: {err}");
                    return Err(err);
                }
                Err(join_err) => {
                    warn!("Run {run_id}: analysis task ended abnormally: {join_err}");
                    abnormal_exit.get_or_insert_with(|| join_err.to_string());
                }
            }
        }

        let mut scored = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(candidate) => scored.push(candidate),
                None => {
                    let reason = abnormal_exit
                        .clone()
                        .unwrap_or_else(|| "analysis task did not finish".to_string());
                    return Err(TriageError::Oracle {
                        index,
                        source: OracleError::Aborted(reason),
                    });
                }
            }
        }

        info!("Run {run_id}: scored {} resumes", scored.len());
        Ok(scored)
    }

    /// Fires exactly one side effect per candidate: a rejection notice or a salary request.
    /// Each call gets its own timeout; one candidate's failure never affects another's.
    async fn dispatch_all(
        &self,
        run_id: Uuid,
        job: &Arc<JobRequest>,
        docs: &[ResumeDocument],
        triaged: Vec<TriagedCandidate>,
    ) -> (Vec<TriagedCandidate>, Vec<DispatchRecord>) {
        let limiter = Arc::new(Semaphore::new(self.settings.max_concurrent_dispatches.max(1)));
        let timeout = self.settings.dispatch_timeout;
        let mut tasks = JoinSet::new();

        for (position, candidate) in triaged.iter().cloned().enumerate() {
            let doc = docs[candidate.candidate.source_index].clone();
            let job = Arc::clone(job);
            let limiter = Arc::clone(&limiter);
            let notifier = Arc::clone(&self.notifier);
            let estimator = Arc::clone(&self.estimator);

            tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await.ok();
                let shortlisted = candidate.is_shortlisted();
                let work = async {
                    if shortlisted {
                        compensate(estimator.as_ref(), &job, &candidate, doc).await
                    } else {
                        let outcome =
                            notify(notifier.as_ref(), &candidate, job.job_title.as_deref()).await;
                        DispatchResult {
                            action: DispatchAction::Notification(outcome),
                            salary_suggestion: None,
                        }
                    }
                };

                let result = match tokio::time::timeout(timeout, work).await {
                    Ok(result) => result,
                    Err(_) => timed_out(shortlisted, timeout),
                };
                (position, result)
            });
        }

        let mut results: Vec<Option<DispatchResult>> = triaged.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, result)) => results[position] = Some(result),
                Err(join_err) => {
                    warn!("Run {run_id}: dispatch task ended abnormally: {join_err}");
                }
            }
        }

        let mut candidates = Vec::with_capacity(triaged.len());
        let mut dispatches = Vec::with_capacity(triaged.len());
        for (mut candidate, result) in triaged.into_iter().zip(results) {
            let shortlisted = candidate.is_shortlisted();
            let result = result.unwrap_or_else(|| {
                abnormal(shortlisted, "dispatch task ended abnormally".to_string())
            });

            if let TriageOutcome::Shortlisted { salary_suggestion } = &mut candidate.outcome {
                *salary_suggestion = result.salary_suggestion;
            }

            dispatches.push(DispatchRecord {
                source_index: candidate.candidate.source_index,
                rank: candidate.rank,
                action: result.action,
            });
            candidates.push(candidate);
        }

        (candidates, dispatches)
    }
}

async fn compensate(
    estimator: &dyn SalaryEstimator,
    job: &JobRequest,
    candidate: &TriagedCandidate,
    doc: ResumeDocument,
) -> DispatchResult {
    let resume_text = tokio::task::spawn_blocking(move || extract_text(&doc))
        .await
        .unwrap_or_default();

    match suggest_salary(estimator, job, candidate, &resume_text).await {
        Ok(suggestion) => DispatchResult {
            action: DispatchAction::Compensation(CompensationOutcome::Suggested),
            salary_suggestion: Some(suggestion),
        },
        Err(e) => {
            warn!(
                "Resume #{}: salary estimation failed: {e}",
                candidate.candidate.source_index
            );
            abnormal(true, e.to_string())
        }
    }
}

fn timed_out(shortlisted: bool, timeout: Duration) -> DispatchResult {
    abnormal(
        shortlisted,
        format!("timed out after {}s", timeout.as_secs_f64()),
    )
}

fn abnormal(shortlisted: bool, reason: String) -> DispatchResult {
    let action = if shortlisted {
        DispatchAction::Compensation(CompensationOutcome::Failed { reason })
    } else {
        DispatchAction::Notification(NotifyOutcome::Failed { reason })
    };
    DispatchResult {
        action,
        salary_suggestion: None,
    }
}

fn dispatch_warning(record: &DispatchRecord) -> Option<RunWarning> {
    match &record.action {
        DispatchAction::Notification(NotifyOutcome::Failed { reason }) => {
            Some(RunWarning::NotifyFailure {
                source_index: record.source_index,
                reason: reason.clone(),
            })
        }
        DispatchAction::Compensation(CompensationOutcome::Failed { reason }) => {
            Some(RunWarning::EstimationFailure {
                source_index: record.source_index,
                reason: reason.clone(),
            })
        }
        _ => None,
    }
}
