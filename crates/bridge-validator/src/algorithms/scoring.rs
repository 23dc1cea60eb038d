//! # Scoring Functions
//!
//! Pluggable scorers applied to successful responses.
//!
//! A scorer sees the whole round through [`ScoringFunction::score_round`],
//! which lets agreement-based scorers compare answers with each other. The
//! default implementation scores each response on its own.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::similarity::{bigram_dice, jaro_winkler, ratcliff_obershelp};
use crate::domain::{BridgeError, BridgeResult};

/// One successful response as seen by a scorer.
#[derive(Clone, Copy, Debug)]
pub struct ScoringInput<'a> {
    /// Result payload.
    pub payload: &'a Value,
    /// Round-trip latency.
    pub latency: Duration,
    /// Stake of the responding peer.
    pub peer_stake: u64,
}

/// Pluggable scoring function.
pub trait ScoringFunction: Send + Sync {
    /// Name used in configuration.
    fn name(&self) -> &'static str;

    /// Scores from different versions are not comparable.
    fn version(&self) -> u32;

    /// Score a single response.
    fn score(&self, input: &ScoringInput<'_>) -> f64;

    /// Score every successful response of a round, in input order.
    fn score_round(&self, inputs: &[ScoringInput<'_>]) -> Vec<f64> {
        inputs.iter().map(|input| self.score(input)).collect()
    }
}

/// Faster answers score higher; optional bonus for stake.
///
/// `score = 1 / (1 + latency_secs) * (1 + stake_bonus * ln(1 + stake))`
#[derive(Clone, Debug, Default)]
pub struct LatencyScorer {
    /// Weight of the logarithmic stake bonus; 0 disables it.
    pub stake_bonus: f64,
}

impl ScoringFunction for LatencyScorer {
    fn name(&self) -> &'static str {
        "latency"
    }

    fn version(&self) -> u32 {
        1
    }

    fn score(&self, input: &ScoringInput<'_>) -> f64 {
        let speed = 1.0 / (1.0 + input.latency.as_secs_f64());
        let stake = (input.peer_stake as f64).ln_1p();
        speed * (1.0 + self.stake_bonus * stake)
    }
}

/// Agreement-based scorer for text answers.
///
/// Each answer earns 0.1 per other answer times the pairwise similarity,
/// averaged over Jaro-Winkler, bigram Dice and Ratcliff/Obershelp. The
/// agreement part weighs 0.8 and a latency term `1 / max(secs, 1)` weighs
/// 0.2. Answers that agree with the majority therefore outrank outliers.
#[derive(Clone, Debug, Default)]
pub struct ConsensusScorer;

impl ConsensusScorer {
    const AGREEMENT_WEIGHT: f64 = 0.8;
    const LATENCY_WEIGHT: f64 = 0.2;
    const PAIR_WEIGHT: f64 = 0.1;

    fn latency_term(latency: Duration) -> f64 {
        1.0 / latency.as_secs_f64().max(1.0)
    }
}

/// Text of an answer payload: a bare string, or the `response` field.
pub fn answer_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("response") {
            Some(Value::String(s)) => s.clone(),
            _ => payload.to_string(),
        },
        other => other.to_string(),
    }
}

impl ScoringFunction for ConsensusScorer {
    fn name(&self) -> &'static str {
        "consensus"
    }

    fn version(&self) -> u32 {
        1
    }

    fn score(&self, input: &ScoringInput<'_>) -> f64 {
        Self::LATENCY_WEIGHT * Self::latency_term(input.latency)
    }

    fn score_round(&self, inputs: &[ScoringInput<'_>]) -> Vec<f64> {
        let texts: Vec<String> = inputs.iter().map(|i| answer_text(i.payload)).collect();
        let n = texts.len();
        let mut agreement = vec![0.0f64; n];

        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&texts[i], &texts[j]);
                let pair =
                    (jaro_winkler(a, b) + bigram_dice(a, b) + ratcliff_obershelp(a, b)) / 3.0;
                agreement[i] += pair * Self::PAIR_WEIGHT;
                agreement[j] += pair * Self::PAIR_WEIGHT;
            }
        }

        inputs
            .iter()
            .zip(agreement)
            .map(|(input, agree)| {
                agree * Self::AGREEMENT_WEIGHT
                    + Self::LATENCY_WEIGHT * Self::latency_term(input.latency)
            })
            .collect()
    }
}

/// Resolve a configured scorer name.
pub fn scorer_from_name(name: &str, stake_bonus: f64) -> BridgeResult<Arc<dyn ScoringFunction>> {
    match name {
        "latency" => Ok(Arc::new(LatencyScorer { stake_bonus })),
        "consensus" => Ok(Arc::new(ConsensusScorer)),
        other => Err(BridgeError::Configuration(format!(
            "unknown scoring function '{other}' (expected 'latency' or 'consensus')"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(payload: &Value, latency_ms: u64) -> ScoringInput<'_> {
        ScoringInput {
            payload,
            latency: Duration::from_millis(latency_ms),
            peer_stake: 0,
        }
    }

    #[test]
    fn test_latency_scorer_prefers_fast() {
        let p = Value::Null;
        let s = LatencyScorer::default();
        assert!(s.score(&input(&p, 100)) > s.score(&input(&p, 2_000)));
        assert!((s.score(&input(&p, 0)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_latency_scorer_stake_bonus() {
        let p = Value::Null;
        let s = LatencyScorer { stake_bonus: 0.1 };
        let poor = ScoringInput {
            peer_stake: 0,
            ..input(&p, 500)
        };
        let rich = ScoringInput {
            peer_stake: 1_000_000,
            ..input(&p, 500)
        };
        assert!(s.score(&rich) > s.score(&poor));
    }

    #[test]
    fn test_consensus_scorer_penalizes_outlier() {
        let a = json!("The capital of France is Paris.");
        let b = json!({"response": "The capital of France is Paris"});
        let c = json!("Bananas are yellow and rich in potassium!");
        let scores = ConsensusScorer.score_round(&[input(&a, 500), input(&b, 500), input(&c, 500)]);
        assert!(scores[0] > scores[2]);
        assert!(scores[1] > scores[2]);
    }

    #[test]
    fn test_consensus_single_answer_gets_latency_only() {
        let a = json!("alone");
        let scores = ConsensusScorer.score_round(&[input(&a, 4_000)]);
        assert!((scores[0] - 0.2 / 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_answer_text_extraction() {
        assert_eq!(answer_text(&json!("x")), "x");
        assert_eq!(answer_text(&json!({"response": "y", "other": 1})), "y");
        assert_eq!(answer_text(&json!(42)), "42");
    }

    #[test]
    fn test_scorer_from_name() {
        assert_eq!(scorer_from_name("latency", 0.0).unwrap().name(), "latency");
        assert_eq!(scorer_from_name("consensus", 0.0).unwrap().name(), "consensus");
        assert!(scorer_from_name("vibes", 0.0).is_err());
    }
}
