//! Response ranking.
//!
//! Descending by score, then ascending latency, then ascending peer key.

use std::cmp::Ordering;

use crate::domain::ScoredResponse;

/// Total order used to rank a round.
pub fn compare_ranked(a: &ScoredResponse, b: &ScoredResponse) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.latency().cmp(&b.latency()))
        .then_with(|| a.peer().cmp(b.peer()))
}

/// Sort a round in rank order.
pub fn rank_responses(responses: &mut [ScoredResponse]) {
    responses.sort_by(compare_ranked);
}
