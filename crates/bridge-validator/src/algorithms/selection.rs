//! Peer selection for a dispatch round.
//!
//! Peers are ranked by stake, then by liveness recency. Peers sharing both
//! values form a tier; a tier is shuffled (or ordered by key in
//! lexicographic mode) before the top `k` are taken, which spreads load
//! across equally-qualified peers.

use std::cmp::Ordering;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::{PeerInfo, PeerSnapshot, SelectionMode};

fn rank_key(a: &PeerInfo, b: &PeerInfo) -> Ordering {
    b.stake
        .cmp(&a.stake)
        .then_with(|| b.last_seen.cmp(&a.last_seen))
}

/// Choose up to `k` peers from `snapshot`.
pub fn select_peers<R: Rng + ?Sized>(
    snapshot: &PeerSnapshot,
    k: usize,
    mode: SelectionMode,
    rng: &mut R,
) -> Vec<PeerInfo> {
    if k == 0 || snapshot.is_empty() {
        return Vec::new();
    }

    // Snapshot iterates in key order, so the sort is stable on key within a tier
    let mut ranked: Vec<PeerInfo> = snapshot.iter().cloned().collect();
    ranked.sort_by(rank_key);

    if mode == SelectionMode::Shuffled {
        let mut start = 0;
        while start < ranked.len() {
            let mut end = start + 1;
            while end < ranked.len() && rank_key(&ranked[start], &ranked[end]) == Ordering::Equal {
                end += 1;
            }
            ranked[start..end].shuffle(rng);
            start = end;
        }
    }

    ranked.truncate(k);
    ranked
}
