//! # Response Aggregator
//!
//! Scores a round, ranks it and feeds the epoch ledger.

use std::sync::Arc;

use tracing::debug;

use crate::algorithms::{rank_responses, ScoringFunction, ScoringInput};
use crate::domain::{EpochLedger, PeerResponse, PeerSnapshot, RoundOutcome, ScoredResponse};

/// Score every response of a round and pick the best successful one.
///
/// Failed responses get `failure_floor`. Successful scores that are not
/// finite are replaced by the floor, and none may fall below it, so the
/// top successful response always outranks every failure.
pub fn score_and_select(
    responses: Vec<PeerResponse>,
    scorer: &dyn ScoringFunction,
    snapshot: &PeerSnapshot,
    failure_floor: f64,
) -> RoundOutcome {
    let (successes, failures): (Vec<PeerResponse>, Vec<PeerResponse>) =
        responses.into_iter().partition(PeerResponse::is_success);

    let scores = {
        let inputs: Vec<ScoringInput<'_>> = successes
            .iter()
            .filter_map(|r| {
                r.payload.as_ref().map(|payload| ScoringInput {
                    payload,
                    latency: r.latency,
                    peer_stake: snapshot.stake_of(&r.peer),
                })
            })
            .collect();
        scorer.score_round(&inputs)
    };

    let version = scorer.version();
    // A short score vector leaves the remaining successes at the floor
    let scores = scores.into_iter().chain(std::iter::repeat(f64::NAN));
    let mut ranked: Vec<ScoredResponse> = successes
        .into_iter()
        .zip(scores)
        .map(|(response, score)| ScoredResponse {
            response,
            score: if score.is_finite() {
                score.max(failure_floor)
            } else {
                failure_floor
            },
            scoring_version: version,
        })
        .chain(failures.into_iter().map(|response| ScoredResponse {
            response,
            score: failure_floor,
            scoring_version: version,
        }))
        .collect();
    rank_responses(&mut ranked);

    let top = ranked.iter().find(|s| s.response.is_success()).cloned();
    RoundOutcome { top, ranked }
}

/// Applies the configured scorer and records each round in the ledger.
pub struct Aggregator {
    scorer: Arc<dyn ScoringFunction>,
    failure_floor: f64,
    ledger: Arc<EpochLedger>,
}

impl Aggregator {
    /// Create an aggregator writing into `ledger`.
    pub fn new(scorer: Arc<dyn ScoringFunction>, failure_floor: f64, ledger: Arc<EpochLedger>) -> Self {
        Self {
            scorer,
            failure_floor,
            ledger,
        }
    }

    /// Name of the active scoring function.
    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    /// Score, rank and record one round.
    ///
    /// The whole batch lands in the ledger under one lock, including the
    /// failures at the floor score.
    pub fn aggregate(&self, responses: Vec<PeerResponse>, snapshot: &PeerSnapshot) -> RoundOutcome {
        let outcome = score_and_select(responses, self.scorer.as_ref(), snapshot, self.failure_floor);
        self.ledger.record_round(&outcome.ranked);
        debug!(
            responses = outcome.ranked.len(),
            successes = outcome.successes(),
            top = outcome.top.as_ref().map(|t| t.peer().as_str()).unwrap_or("-"),
            "[aggregate] Round scored"
        );
        outcome
    }
}
