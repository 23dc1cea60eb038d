//! # Algorithms Module
//!
//! Pure functions: peer selection, ranking, weight normalization and the
//! pluggable scoring functions.

pub mod normalization;
pub mod ranking;
pub mod scoring;
pub mod selection;
pub mod similarity;

pub use normalization::{cut_to_max_allowed, normalize_weights};
pub use ranking::{compare_ranked, rank_responses};
pub use scoring::{scorer_from_name, ConsensusScorer, LatencyScorer, ScoringFunction, ScoringInput};
pub use selection::select_peers;
