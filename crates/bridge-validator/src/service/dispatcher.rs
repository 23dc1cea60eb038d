//! # Dispatcher
//!
//! Fan-out/fan-in of one task to a selected set of peers.
//!
//! Every call is bounded by the per-call timeout and the whole round by a
//! single deadline. When the deadline passes the remaining futures are
//! dropped: their network calls are abandoned and whatever they would have
//! returned is never looked at.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::Instant;
use tracing::debug;

use crate::algorithms::select_peers;
use crate::domain::{PeerFailure, PeerId, PeerInfo, PeerResponse, PeerSnapshot, SelectionMode, Task};
use crate::metrics;
use crate::ports::PeerClient;

/// Concurrent peer caller.
pub struct Dispatcher {
    client: Arc<dyn PeerClient>,
    mode: SelectionMode,
    rng: Mutex<StdRng>,
}

impl Dispatcher {
    /// Create a dispatcher; `seed` makes shuffled selection reproducible.
    pub fn new(client: Arc<dyn PeerClient>, mode: SelectionMode, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            client,
            mode,
            rng: Mutex::new(rng),
        }
    }

    /// Choose up to `k` peers for a round.
    pub fn select(&self, snapshot: &PeerSnapshot, k: usize) -> Vec<PeerInfo> {
        let mut rng = self.rng.lock();
        select_peers(snapshot, k, self.mode, &mut *rng)
    }

    /// Send `task` to up to `k` peers and collect what arrives in time.
    ///
    /// The round ends at `round_deadline` from now or at the task's own
    /// deadline, whichever comes first. Every selected peer yields exactly
    /// one [`PeerResponse`]; peers still outstanding at the deadline are
    /// reported as [`PeerFailure::RoundDeadline`].
    pub async fn dispatch(
        &self,
        task: &Task,
        snapshot: &PeerSnapshot,
        k: usize,
        per_call_timeout: Duration,
        round_deadline: Duration,
    ) -> Vec<PeerResponse> {
        let selected = self.select(snapshot, k);
        if selected.is_empty() {
            debug!(task_id = %task.id(), "[dispatch] No eligible peers");
            return Vec::new();
        }

        let started = Instant::now();
        let deadline = (started + round_deadline).min(task.deadline());
        debug!(
            task_id = %task.id(),
            peers = selected.len(),
            "[dispatch] Fanning out"
        );

        let mut responses = self
            .collect_until(task, &selected, per_call_timeout, deadline)
            .await;

        let stragglers: Vec<PeerResponse> = {
            let answered: HashSet<&PeerId> = responses.iter().map(|r| &r.peer).collect();
            selected
                .iter()
                .filter(|peer| !answered.contains(&peer.id))
                .map(|peer| {
                    PeerResponse::failure(
                        peer.id.clone(),
                        PeerFailure::RoundDeadline,
                        deadline.saturating_duration_since(started),
                    )
                })
                .collect()
        };

        for late in &stragglers {
            metrics::record_peer_call(PeerFailure::RoundDeadline.label());
            if let Some(error) = late.error() {
                debug!(task_id = %task.id(), error = %error, "[dispatch] Abandoned at round deadline");
            }
        }
        responses.extend(stragglers);
        responses
    }

    async fn collect_until(
        &self,
        task: &Task,
        selected: &[PeerInfo],
        per_call_timeout: Duration,
        deadline: Instant,
    ) -> Vec<PeerResponse> {
        let payload = task.payload();
        let client = &self.client;
        let mut in_flight: FuturesUnordered<_> = selected
            .iter()
            .map(|peer| async move {
                let call_started = Instant::now();
                let outcome = tokio::time::timeout(per_call_timeout, client.call(peer, payload)).await;
                let latency = call_started.elapsed();
                match outcome {
                    Ok(Ok(result)) => PeerResponse::success(peer.id.clone(), result, latency),
                    Ok(Err(e)) => PeerResponse::failure(
                        peer.id.clone(),
                        PeerFailure::Unreachable(e.to_string()),
                        latency,
                    ),
                    Err(_) => PeerResponse::failure(
                        peer.id.clone(),
                        PeerFailure::Timeout(per_call_timeout),
                        latency,
                    ),
                }
            })
            .collect();

        let mut responses = Vec::with_capacity(selected.len());
        let round_over = tokio::time::sleep_until(deadline);
        tokio::pin!(round_over);

        loop {
            tokio::select! {
                biased;
                next = in_flight.next() => match next {
                    Some(response) => {
                        let outcome = response.failure.as_ref().map_or("ok", PeerFailure::label);
                        metrics::record_peer_call(outcome);
                        if let Some(error) = response.error() {
                            debug!(task_id = %task.id(), error = %error, "[dispatch] Peer call failed");
                        }
                        responses.push(response);
                    }
                    None => break,
                },
                _ = &mut round_over => break,
            }
        }
        responses
    }
}
