//! # Bridge Metrics
//!
//! Prometheus metrics for monitoring the bridge validator.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! bridge-validator = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `bridge_rounds_total` - Counter of completed rounds (by outcome)
//! - `bridge_peer_calls_total` - Counter of peer calls (by outcome)
//! - `bridge_round_duration_seconds` - Histogram of round wall time
//! - `bridge_commits_total` - Counter of weight commit attempts (by result)
//! - `bridge_snapshot_peers` - Gauge of eligible peers in the live snapshot
//! - `bridge_relay_requests_total` - Counter of relay requests (by outcome)

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Rounds, labeled `answered` or `empty`
    pub static ref ROUNDS: IntCounterVec = register_int_counter_vec!(
        "bridge_rounds_total",
        "Total number of dispatch rounds",
        &["outcome"]
    )
    .expect("Failed to create ROUNDS metric");

    /// Peer calls, labeled `ok`, `timeout`, `unreachable` or `round_deadline`
    pub static ref PEER_CALLS: IntCounterVec = register_int_counter_vec!(
        "bridge_peer_calls_total",
        "Total number of provider peer calls",
        &["outcome"]
    )
    .expect("Failed to create PEER_CALLS metric");

    /// Round wall time
    pub static ref ROUND_DURATION: Histogram = register_histogram!(
        "bridge_round_duration_seconds",
        "Time from dispatch to last collected response in seconds",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]
    )
    .expect("Failed to create ROUND_DURATION metric");

    /// Weight commit attempts by result
    pub static ref COMMITS: IntCounterVec = register_int_counter_vec!(
        "bridge_commits_total",
        "Total number of weight commit attempts",
        &["result"]
    )
    .expect("Failed to create COMMITS metric");

    /// Eligible peers in the live snapshot
    pub static ref SNAPSHOT_PEERS: IntGauge = register_int_gauge!(
        "bridge_snapshot_peers",
        "Number of eligible peers in the current registry snapshot"
    )
    .expect("Failed to create SNAPSHOT_PEERS metric");

    /// Relay requests by outcome
    pub static ref RELAY_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "bridge_relay_requests_total",
        "Total number of inbound relay requests",
        &["outcome"]
    )
    .expect("Failed to create RELAY_REQUESTS metric");
}

/// Record a finished round
#[cfg(feature = "metrics")]
pub fn record_round(outcome: &str, seconds: f64) {
    ROUNDS.with_label_values(&[outcome]).inc();
    ROUND_DURATION.observe(seconds);
}

/// Record one peer call result
#[cfg(feature = "metrics")]
pub fn record_peer_call(outcome: &str) {
    PEER_CALLS.with_label_values(&[outcome]).inc();
}

/// Record a commit attempt
#[cfg(feature = "metrics")]
pub fn record_commit(result: &str) {
    COMMITS.with_label_values(&[result]).inc();
}

/// Set the live snapshot size
#[cfg(feature = "metrics")]
pub fn set_snapshot_peers(count: usize) {
    SNAPSHOT_PEERS.set(count as i64);
}

/// Record a relay request
#[cfg(feature = "metrics")]
pub fn record_relay_request(outcome: &str) {
    RELAY_REQUESTS.with_label_values(&[outcome]).inc();
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_round(_outcome: &str, _seconds: f64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_peer_call(_outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_commit(_result: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn set_snapshot_peers(_count: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn record_relay_request(_outcome: &str) {}
