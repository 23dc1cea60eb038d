//! Weight vector construction from accumulated epoch scores.

use std::collections::HashMap;

use crate::domain::{PeerId, WeightEntry};

/// Keep the `max_allowed` highest-scored peers.
///
/// Ties are broken by peer key so the cut is deterministic.
pub fn cut_to_max_allowed(
    totals: &HashMap<PeerId, f64>,
    max_allowed: usize,
) -> Vec<(PeerId, f64)> {
    let mut sorted: Vec<(PeerId, f64)> = totals
        .iter()
        .map(|(peer, score)| (peer.clone(), *score))
        .collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(max_allowed);
    sorted
}

/// Normalize scores so the weights sum to 1.0.
///
/// Peers with a zero (or negative, or non-finite) total are omitted unless
/// `include_zero` is set, in which case they are submitted with weight 0.
/// Returns an empty vector when no peer has a positive score.
pub fn normalize_weights(scores: &[(PeerId, f64)], include_zero: bool) -> Vec<WeightEntry> {
    let positive = |s: f64| s.is_finite() && s > 0.0;
    let sum: f64 = scores.iter().map(|(_, s)| *s).filter(|s| positive(*s)).sum();
    if sum <= 0.0 {
        return Vec::new();
    }

    scores
        .iter()
        .filter_map(|(peer, score)| {
            if positive(*score) {
                Some(WeightEntry {
                    peer: peer.clone(),
                    accumulated_score: *score,
                    weight: score / sum,
                })
            } else if include_zero {
                Some(WeightEntry {
                    peer: peer.clone(),
                    accumulated_score: 0.0,
                    weight: 0.0,
                })
            } else {
                None
            }
        })
        .collect()
}
