//! # Component Configuration
//!
//! Runtime parameters for each bridge component. Built once at startup and
//! never mutated during a run.

use std::time::Duration;

use super::errors::{BridgeError, BridgeResult};
use super::value_objects::SelectionMode;

/// Peer registry sync parameters.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How often the validator loop refreshes the snapshot.
    pub refresh_interval: Duration,
    /// Upper bound on a single registry query.
    pub fetch_timeout: Duration,
    /// Snapshot age after which a failed refresh is logged as a warning.
    pub staleness_warn_after: Duration,
    /// Peers below this stake are not eligible.
    pub min_stake: u64,
    /// Only peers holding validator permission are eligible.
    pub require_validator_permit: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
            staleness_warn_after: Duration::from_secs(300),
            min_stake: 0,
            require_validator_permit: false,
        }
    }
}

/// Dispatch parameters.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Maximum peers per round (k).
    pub sample_size: usize,
    /// Bound on each individual peer call.
    pub per_call_timeout: Duration,
    /// Bound on a whole self-originated round.
    pub round_deadline: Duration,
    /// Ordering of equally-ranked peers.
    pub selection: SelectionMode,
    /// Seed for shuffled selection; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sample_size: 16,
            per_call_timeout: Duration::from_secs(20),
            round_deadline: Duration::from_secs(30),
            selection: SelectionMode::Shuffled,
            seed: None,
        }
    }
}

/// Weight commit parameters.
#[derive(Debug, Clone)]
pub struct WeightConfig {
    /// Epoch window.
    pub epoch_length: Duration,
    /// Unix seconds at which epoch 0 starts.
    pub genesis_time: u64,
    /// Keep only this many highest-scored peers in a vector.
    pub max_allowed_weights: usize,
    /// Submit explicit zero entries for peers with no score.
    pub submit_zero_weights: bool,
    /// Submission attempts per epoch before the commit is abandoned.
    pub max_commit_retries: u32,
    /// Bound on a single submission call.
    pub commit_timeout: Duration,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            epoch_length: Duration::from_secs(3600),
            genesis_time: 0,
            max_allowed_weights: 420,
            submit_zero_weights: false,
            max_commit_retries: 3,
            commit_timeout: Duration::from_secs(30),
        }
    }
}

impl WeightConfig {
    /// Epoch index containing `now` (unix seconds).
    pub fn epoch_at(&self, now: u64) -> u64 {
        let len = self.epoch_length.as_secs().max(1);
        now.saturating_sub(self.genesis_time) / len
    }
}

/// Relay budget parameters.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Budget used when the caller gives none.
    pub default_budget: Duration,
    /// Caller overrides are clamped to this.
    pub max_budget: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_budget: Duration::from_secs(30),
            max_budget: Duration::from_secs(60),
        }
    }
}

impl RelayConfig {
    /// Effective budget for a request.
    pub fn budget_for(&self, requested: Option<Duration>) -> Duration {
        requested
            .unwrap_or(self.default_budget)
            .min(self.max_budget)
    }
}

/// Validator loop parameters.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Time between iterations.
    pub tick_interval: Duration,
    /// Run a self-originated sampling round every tick.
    pub self_rounds: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            self_rounds: true,
        }
    }
}

/// Check cross-component constraints that individual defaults cannot.
pub fn validate_components(
    dispatch: &DispatchConfig,
    weights: &WeightConfig,
    relay: &RelayConfig,
    failure_floor: f64,
) -> BridgeResult<()> {
    if dispatch.sample_size == 0 {
        return Err(BridgeError::Configuration(
            "dispatch.sample_size must be at least 1".to_string(),
        ));
    }
    if dispatch.per_call_timeout > dispatch.round_deadline {
        return Err(BridgeError::Configuration(format!(
            "per-call timeout {:?} exceeds round deadline {:?}",
            dispatch.per_call_timeout, dispatch.round_deadline
        )));
    }
    if dispatch.round_deadline > relay.max_budget {
        return Err(BridgeError::Configuration(format!(
            "round deadline {:?} exceeds maximum caller budget {:?}",
            dispatch.round_deadline, relay.max_budget
        )));
    }
    if relay.default_budget > relay.max_budget {
        return Err(BridgeError::Configuration(
            "relay default budget exceeds max budget".to_string(),
        ));
    }
    if weights.epoch_length.as_secs() == 0 {
        return Err(BridgeError::Configuration(
            "epoch length must be at least one second".to_string(),
        ));
    }
    if weights.max_commit_retries == 0 {
        return Err(BridgeError::Configuration(
            "max_commit_retries must be at least 1".to_string(),
        ));
    }
    if weights.max_allowed_weights == 0 {
        return Err(BridgeError::Configuration(
            "max_allowed_weights must be at least 1".to_string(),
        ));
    }
    if !failure_floor.is_finite() || failure_floor < 0.0 {
        return Err(BridgeError::Configuration(format!(
            "failure floor must be a non-negative number, got {failure_floor}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_components(
            &DispatchConfig::default(),
            &WeightConfig::default(),
            &RelayConfig::default(),
            0.0
        )
        .is_ok());
    }

    #[test]
    fn test_per_call_timeout_beyond_deadline_rejected() {
        let dispatch = DispatchConfig {
            per_call_timeout: Duration::from_secs(40),
            ..Default::default()
        };
        let err = validate_components(
            &dispatch,
            &WeightConfig::default(),
            &RelayConfig::default(),
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }

    #[test]
    fn test_negative_floor_rejected() {
        assert!(validate_components(
            &DispatchConfig::default(),
            &WeightConfig::default(),
            &RelayConfig::default(),
            -1.0
        )
        .is_err());
    }

    #[test]
    fn test_epoch_at() {
        let cfg = WeightConfig {
            epoch_length: Duration::from_secs(100),
            genesis_time: 1_000,
            ..Default::default()
        };
        assert_eq!(cfg.epoch_at(500), 0);
        assert_eq!(cfg.epoch_at(1_099), 0);
        assert_eq!(cfg.epoch_at(1_100), 1);
        assert_eq!(cfg.epoch_at(1_350), 3);
    }

    #[test]
    fn test_budget_clamped() {
        let relay = RelayConfig {
            default_budget: Duration::from_secs(5),
            max_budget: Duration::from_secs(10),
        };
        assert_eq!(relay.budget_for(None), Duration::from_secs(5));
        assert_eq!(
            relay.budget_for(Some(Duration::from_secs(99))),
            Duration::from_secs(10)
        );
    }
}
