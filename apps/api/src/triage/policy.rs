//! Triage Policy: splits ranked candidates into shortlisted and rejected.
//!
//! The decision depends only on rank versus shortlist size, never on the raw score.
//! Rejected candidates lose their detailed feedback but keep name, email and weak points.

use crate::triage::models::{RankedCandidate, ScoredCandidate, TriageOutcome, TriagedCandidate};

/// Rejection reason used when `REJECTION_REASON_TEMPLATE` is not set.
/// Placeholders: `{score}`, `{weak_points}`.
pub const DEFAULT_REJECTION_TEMPLATE: &str = "After careful review we will not be moving \
    forward with this application (match score {score}/100). Main gaps identified: {weak_points}";

/// Applies the shortlist cut. Input order is preserved.
pub fn triage(
    ranked: Vec<RankedCandidate>,
    shortlist_size: u32,
    reason_template: &str,
) -> Vec<TriagedCandidate> {
    ranked
        .into_iter()
        .map(|RankedCandidate { candidate, rank }| {
            if rank <= shortlist_size {
                TriagedCandidate {
                    candidate,
                    rank,
                    outcome: TriageOutcome::Shortlisted {
                        salary_suggestion: None,
                    },
                }
            } else {
                let rejection_reason = render_rejection_reason(reason_template, &candidate);
                TriagedCandidate {
                    candidate: clear_feedback(candidate),
                    rank,
                    outcome: TriageOutcome::Rejected { rejection_reason },
                }
            }
        })
        .collect()
}

/// Fills the reason template for one candidate. Deterministic.
pub fn render_rejection_reason(template: &str, candidate: &ScoredCandidate) -> String {
    let weak_points = candidate.weak_points.trim();
    let weak_points = if weak_points.is_empty() {
        "none recorded"
    } else {
        weak_points
    };

    template
        .replace("{score}", &format_score(candidate.match_score))
        .replace("{weak_points}", weak_points)
}

fn format_score(score: Option<f64>) -> String {
    match score {
        Some(s) if s.is_finite() && s.fract() == 0.0 => format!("{s:.0}"),
        Some(s) if s.is_finite() => format!("{s:.1}"),
        _ => "unscored".to_string(),
    }
}

fn clear_feedback(candidate: ScoredCandidate) -> ScoredCandidate {
    ScoredCandidate {
        top_skills: Vec::new(),
        highlights: String::new(),
        suggestions: String::new(),
        interview_questions: Vec::new(),
        model_answers: Vec::new(),
        ..candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::ranker::rank;

    fn scored(index: usize, score: Option<f64>) -> ScoredCandidate {
        ScoredCandidate {
            source_index: index,
            name: Some(format!("Candidate {index}")),
            match_score: score,
            top_skills: vec!["Rust".to_string()],
            highlights: "Shipped things".to_string(),
            weak_points: "Limited Kubernetes exposure".to_string(),
            suggestions: "Add metrics".to_string(),
            interview_questions: vec!["Q1".to_string()],
            model_answers: vec!["A1".to_string()],
            candidate_email: Some(format!("c{index}@example.com")),
        }
    }

    fn ranked(scores: &[f64]) -> Vec<RankedCandidate> {
        rank(
            scores
                .iter()
                .enumerate()
                .map(|(i, s)| scored(i, Some(*s)))
                .collect(),
        )
        .candidates
    }

    fn partition(triaged: &[TriagedCandidate]) -> Vec<(usize, bool)> {
        triaged
            .iter()
            .map(|t| (t.candidate.source_index, t.is_shortlisted()))
            .collect()
    }

    #[test]
    fn test_shortlist_by_rank() {
        let triaged = triage(ranked(&[40.0, 90.0, 70.0]), 2, DEFAULT_REJECTION_TEMPLATE);
        assert_eq!(
            partition(&triaged),
            vec![(1, true), (2, true), (0, false)]
        );
    }

    #[test]
    fn test_rejected_feedback_cleared_but_email_kept() {
        let triaged = triage(ranked(&[40.0, 90.0]), 1, DEFAULT_REJECTION_TEMPLATE);
        let rejected = &triaged[1];
        assert!(!rejected.is_shortlisted());
        assert!(rejected.candidate.top_skills.is_empty());
        assert!(rejected.candidate.highlights.is_empty());
        assert!(rejected.candidate.suggestions.is_empty());
        assert!(rejected.candidate.interview_questions.is_empty());
        assert!(rejected.candidate.model_answers.is_empty());
        assert_eq!(
            rejected.candidate.candidate_email.as_deref(),
            Some("c0@example.com")
        );
        assert_eq!(rejected.candidate.match_score, Some(40.0));
    }

    #[test]
    fn test_shortlisted_passes_through_unchanged() {
        let input = ranked(&[88.0]);
        let original = input[0].candidate.clone();
        let triaged = triage(input, 1, DEFAULT_REJECTION_TEMPLATE);
        assert_eq!(triaged[0].candidate, original);
        assert_eq!(
            triaged[0].outcome,
            TriageOutcome::Shortlisted {
                salary_suggestion: None
            }
        );
    }

    #[test]
    fn test_shortlist_larger_than_batch_shortlists_everyone() {
        let triaged = triage(ranked(&[10.0, 20.0, 30.0]), 5, DEFAULT_REJECTION_TEMPLATE);
        assert!(triaged.iter().all(|t| t.is_shortlisted()));
    }

    #[test]
    fn test_boundary_score_at_rank_one_is_shortlisted() {
        let triaged = triage(ranked(&[50.0]), 1, DEFAULT_REJECTION_TEMPLATE);
        assert!(triaged[0].is_shortlisted());
    }

    #[test]
    fn test_high_score_below_cut_is_rejected() {
        let triaged = triage(ranked(&[99.0, 98.0]), 1, DEFAULT_REJECTION_TEMPLATE);
        assert!(!triaged[1].is_shortlisted());
    }

    #[test]
    fn test_triage_is_idempotent() {
        let first = triage(ranked(&[40.0, 90.0, 70.0, 70.0]), 2, DEFAULT_REJECTION_TEMPLATE);
        let second = triage(
            first.iter().cloned().map(TriagedCandidate::into_ranked).collect(),
            2,
            DEFAULT_REJECTION_TEMPLATE,
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejection_reason_combines_template_score_and_weak_points() {
        let reason = render_rejection_reason(
            "Score {score}. Concerns: {weak_points}",
            &scored(0, Some(42.0)),
        );
        assert_eq!(reason, "Score 42. Concerns: Limited Kubernetes exposure");
    }

    #[test]
    fn test_rejection_reason_for_missing_score_and_weak_points() {
        let mut candidate = scored(0, None);
        candidate.weak_points = "  ".to_string();
        let reason = render_rejection_reason("{score} / {weak_points}", &candidate);
        assert_eq!(reason, "unscored / none recorded");
    }

    #[test]
    fn test_fractional_score_formats_one_decimal() {
        assert_eq!(format_score(Some(67.4)), "67.4");
        assert_eq!(format_score(Some(70.0)), "70");
    }
}
