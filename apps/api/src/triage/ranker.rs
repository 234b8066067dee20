//! Ranker: orders scored candidates by match score, dense 1-based ranks.

use crate::triage::models::{RankedCandidate, RunWarning, ScoredCandidate};

/// Output of [`rank`]: candidates in rank order plus any score warnings.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub candidates: Vec<RankedCandidate>,
    pub warnings: Vec<RunWarning>,
}

/// Sorts by match score descending, ties broken by input position ascending.
///
/// Candidates whose score is missing or outside 0–100 sort as 0 and produce a
/// `MalformedScore` warning; their recorded score is left untouched.
pub fn rank(candidates: Vec<ScoredCandidate>) -> Ranking {
    let warnings = candidates
        .iter()
        .filter_map(|c| {
            c.score_issue().map(|detail| RunWarning::MalformedScore {
                source_index: c.source_index,
                detail,
            })
        })
        .collect();

    let mut ordered: Vec<(usize, ScoredCandidate)> = candidates.into_iter().enumerate().collect();
    ordered.sort_by(|(pos_a, a), (pos_b, b)| {
        b.ordering_score()
            .total_cmp(&a.ordering_score())
            .then(pos_a.cmp(pos_b))
    });

    let candidates = ordered
        .into_iter()
        .zip(1u32..)
        .map(|((_, candidate), rank)| RankedCandidate { candidate, rank })
        .collect();

    Ranking {
        candidates,
        warnings,
    }
}
