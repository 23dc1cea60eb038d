//! # Bridge Configuration
//!
//! TOML file plus environment overrides, resolved once at startup.
//!
//! ## File Format
//!
//! ```toml
//! [subnet]
//! netuid = 21
//! relay_hotkey = "5Relay..."
//! relay_secret = "<64 hex chars>"
//!
//! [registry]
//! source = "http"
//! url = "http://registry.internal:9944"
//!
//! [dispatch]
//! sample_size = 16
//! per_call_timeout_ms = 20000
//! round_deadline_ms = 30000
//!
//! [scoring]
//! function = "consensus"
//!
//! [weights]
//! epoch_length_secs = 3600
//! submitter = "http"
//! url = "http://registry.internal:9944"
//!
//! [relay]
//! listen_addr = "0.0.0.0:8080"
//! allowed_callers = ["5Caller..."]
//!
//! [loop]
//! tick_interval_ms = 60000
//! prompts = ["Summarize the following text"]
//! ```
//!
//! Every section and field is optional; missing values take the defaults
//! below. Environment variables win over the file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bridge_telemetry::TelemetryConfig;
use bridge_validator::algorithms::scorer_from_name;
use bridge_validator::domain::validate_components;
use bridge_validator::{
    BridgeError, BridgeResult, DispatchConfig, LoopConfig, Netuid, PeerId, RegistryConfig,
    RegistryRecord, RelayConfig, RelayCredentials, SelectionMode, WeightConfig,
};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SB_CONFIG";

/// Config file used when `SB_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "bridge.toml";

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Provider subnet and relay identity.
    pub subnet: SubnetSection,
    /// Peer registry sync.
    pub registry: RegistrySection,
    /// Round fan-out.
    pub dispatch: DispatchSection,
    /// Scoring function.
    pub scoring: ScoringSection,
    /// Weight commits.
    pub weights: WeightsSection,
    /// Inbound relay surface.
    pub relay: RelaySection,
    /// Validator loop cadence.
    #[serde(rename = "loop")]
    pub validator_loop: LoopSection,
    /// Logging.
    pub telemetry: TelemetrySection,
}

/// `[subnet]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubnetSection {
    /// Provider subnet id.
    pub netuid: Netuid,
    /// Relay hotkey on the provider network.
    pub relay_hotkey: String,
    /// Hex-encoded 32-byte signing secret.
    pub relay_secret: String,
}

impl Default for SubnetSection {
    fn default() -> Self {
        Self {
            netuid: 1,
            relay_hotkey: String::new(),
            relay_secret: String::new(),
        }
    }
}

/// Where registry records come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrySourceKind {
    /// Peers listed in the config file.
    #[default]
    Static,
    /// Registry service over HTTP.
    Http,
}

/// `[registry]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    /// Record source.
    pub source: RegistrySourceKind,
    /// Base URL for the HTTP source.
    pub url: Option<String>,
    /// Seconds between refreshes.
    pub refresh_interval_secs: u64,
    /// Bound on a registry query.
    pub timeout_ms: u64,
    /// Snapshot age that turns a failed refresh into a warning.
    pub staleness_warn_secs: u64,
    /// Minimum stake for eligibility.
    pub min_stake: u64,
    /// Only peers with validator permission are eligible.
    pub require_validator_permit: bool,
    /// Records for the static source.
    pub peers: Vec<RegistryRecord>,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            source: RegistrySourceKind::Static,
            url: None,
            refresh_interval_secs: 60,
            timeout_ms: 10_000,
            staleness_warn_secs: 300,
            min_stake: 0,
            require_validator_permit: false,
            peers: Vec::new(),
        }
    }
}

/// `[dispatch]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    /// Peers per round (k).
    pub sample_size: usize,
    /// Bound on each peer call.
    pub per_call_timeout_ms: u64,
    /// Bound on a self-originated round.
    pub round_deadline_ms: u64,
    /// Tie ordering for equally-ranked peers.
    pub selection: SelectionMode,
    /// Seed for shuffled selection.
    pub seed: Option<u64>,
    /// Method invoked on every peer.
    pub method: String,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            sample_size: 16,
            per_call_timeout_ms: 20_000,
            round_deadline_ms: 30_000,
            selection: SelectionMode::Shuffled,
            seed: None,
            method: "generate".to_string(),
        }
    }
}

/// `[scoring]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    /// `latency` or `consensus`.
    pub function: String,
    /// Score given to failed responses.
    pub failure_floor: f64,
    /// Stake bonus of the latency scorer.
    pub stake_bonus: f64,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            function: "latency".to_string(),
            failure_floor: 0.0,
            stake_bonus: 0.0,
        }
    }
}

/// Where weight vectors go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitterKind {
    /// Keep vectors in memory (dry run).
    #[default]
    Memory,
    /// Provider weights endpoint over HTTP.
    Http,
}

/// `[weights]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsSection {
    /// Epoch window in seconds.
    pub epoch_length_secs: u64,
    /// Unix seconds at which epoch 0 starts.
    pub genesis_time: u64,
    /// Highest-scored peers kept per vector.
    pub max_allowed_weights: usize,
    /// Submit explicit zero entries.
    pub submit_zero_weights: bool,
    /// Attempts per epoch before giving up.
    pub max_commit_retries: u32,
    /// Bound on one submission.
    pub commit_timeout_ms: u64,
    /// Submission backend.
    pub submitter: SubmitterKind,
    /// Base URL for the HTTP submitter.
    pub url: Option<String>,
}

impl Default for WeightsSection {
    fn default() -> Self {
        Self {
            epoch_length_secs: 3_600,
            genesis_time: 0,
            max_allowed_weights: 420,
            submit_zero_weights: false,
            max_commit_retries: 3,
            commit_timeout_ms: 30_000,
            submitter: SubmitterKind::Memory,
            url: None,
        }
    }
}

/// `[relay]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    /// Bind address of the HTTP surface.
    pub listen_addr: String,
    /// Budget when the caller sends none.
    pub default_budget_ms: u64,
    /// Upper bound on caller budgets.
    pub max_budget_ms: u64,
    /// Caller keys allowed to use the relay.
    pub allowed_callers: Vec<String>,
    /// Requesting subnets allowed to use the relay.
    pub allowed_subnets: Vec<Netuid>,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            default_budget_ms: 30_000,
            max_budget_ms: 60_000,
            allowed_callers: Vec::new(),
            allowed_subnets: Vec::new(),
        }
    }
}

/// `[loop]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSection {
    /// Milliseconds between iterations.
    pub tick_interval_ms: u64,
    /// Run a self-originated round every tick.
    pub self_rounds: bool,
    /// Prompts for self rounds.
    pub prompts: Vec<String>,
}

impl Default for LoopSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: 60_000,
            self_rounds: true,
            prompts: Vec::new(),
        }
    }
}

/// `[telemetry]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    /// Log filter.
    pub log_level: String,
    /// JSON log lines.
    pub json_logs: bool,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        let base = TelemetryConfig::default();
        Self {
            log_level: base.log_level,
            json_logs: base.json_logs,
        }
    }
}

impl BridgeConfig {
    /// Config file to read: `SB_CONFIG`, else `bridge.toml` when present.
    pub fn config_path(lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
        match lookup(CONFIG_ENV) {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                default.exists().then_some(default)
            }
        }
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// Parse TOML text.
    pub fn parse(content: &str) -> BridgeResult<Self> {
        toml::from_str(content).map_err(|e| BridgeError::Configuration(e.to_string()))
    }

    /// File (if any) plus process environment.
    pub fn from_env() -> BridgeResult<Self> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// File (if any) plus overrides from `lookup`.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> BridgeResult<Self> {
        let mut config = match Self::config_path(&lookup) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(&lookup)?;
        Ok(config)
    }

    /// Apply `SB_*` overrides.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> BridgeResult<()> {
        if let Some(raw) = lookup("SB_NETUID") {
            self.subnet.netuid = raw.trim().parse().map_err(|_| {
                BridgeError::Configuration(format!("SB_NETUID is not a subnet id: {raw}"))
            })?;
        }
        if let Some(addr) = lookup("SB_LISTEN_ADDR") {
            self.relay.listen_addr = addr;
        }
        if let Some(secret) = lookup("SB_RELAY_SECRET") {
            self.subnet.relay_secret = secret;
        }
        if let Some(callers) = lookup("SB_ALLOWED_CALLERS") {
            self.relay.allowed_callers = callers
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }

        let level_set = lookup("SB_LOG_LEVEL").is_some() || lookup("RUST_LOG").is_some();
        let env = TelemetryConfig::from_lookup(&lookup, self.telemetry.json_logs);
        if level_set {
            self.telemetry.log_level = env.log_level;
        }
        self.telemetry.json_logs = env.json_logs;
        Ok(())
    }

    /// Check every startup constraint.
    ///
    /// An empty allow-list is legal but rejects every caller, so it is only
    /// reported through [`Self::warnings`].
    pub fn validate(&self) -> BridgeResult<()> {
        validate_components(
            &self.dispatch_config(),
            &self.weight_config(),
            &self.relay_config(),
            self.scoring.failure_floor,
        )?;
        scorer_from_name(&self.scoring.function, self.scoring.stake_bonus)?;
        if !self.scoring.stake_bonus.is_finite() || self.scoring.stake_bonus < 0.0 {
            return Err(BridgeError::Configuration(
                "scoring.stake_bonus must be a non-negative number".to_string(),
            ));
        }
        self.credentials()?;
        self.listen_addr()?;
        if self.registry.source == RegistrySourceKind::Http && self.registry.url.is_none() {
            return Err(BridgeError::Configuration(
                "registry.url is required for the http source".to_string(),
            ));
        }
        if self.weights.submitter == SubmitterKind::Http && self.weights.url.is_none() {
            return Err(BridgeError::Configuration(
                "weights.url is required for the http submitter".to_string(),
            ));
        }
        if self.registry.refresh_interval_secs == 0 {
            return Err(BridgeError::Configuration(
                "registry.refresh_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.validator_loop.tick_interval_ms == 0 {
            return Err(BridgeError::Configuration(
                "loop.tick_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Non-fatal findings to log at startup.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.relay.allowed_callers.is_empty() && self.relay.allowed_subnets.is_empty() {
            warnings.push("relay allow-list is empty; every caller will be rejected".to_string());
        }
        if self.validator_loop.self_rounds && self.validator_loop.prompts.is_empty() {
            warnings.push("self rounds enabled but loop.prompts is empty".to_string());
        }
        if self.weights.submitter == SubmitterKind::Memory {
            warnings.push("weights.submitter is memory; vectors are not published".to_string());
        }
        warnings
    }

    /// Relay signing credentials.
    pub fn credentials(&self) -> BridgeResult<RelayCredentials> {
        if self.subnet.relay_hotkey.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "subnet.relay_hotkey is required".to_string(),
            ));
        }
        RelayCredentials::from_hex(
            PeerId::new(self.subnet.relay_hotkey.trim()),
            &self.subnet.relay_secret,
        )
    }

    /// Parsed bind address.
    pub fn listen_addr(&self) -> BridgeResult<SocketAddr> {
        self.relay.listen_addr.parse().map_err(|e| {
            BridgeError::Configuration(format!(
                "relay.listen_addr '{}' is invalid: {e}",
                self.relay.listen_addr
            ))
        })
    }

    /// Registry component parameters.
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            refresh_interval: Duration::from_secs(self.registry.refresh_interval_secs),
            fetch_timeout: Duration::from_millis(self.registry.timeout_ms),
            staleness_warn_after: Duration::from_secs(self.registry.staleness_warn_secs),
            min_stake: self.registry.min_stake,
            require_validator_permit: self.registry.require_validator_permit,
        }
    }

    /// Dispatch component parameters.
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            sample_size: self.dispatch.sample_size,
            per_call_timeout: Duration::from_millis(self.dispatch.per_call_timeout_ms),
            round_deadline: Duration::from_millis(self.dispatch.round_deadline_ms),
            selection: self.dispatch.selection,
            seed: self.dispatch.seed,
        }
    }

    /// Weight committer parameters.
    pub fn weight_config(&self) -> WeightConfig {
        WeightConfig {
            epoch_length: Duration::from_secs(self.weights.epoch_length_secs),
            genesis_time: self.weights.genesis_time,
            max_allowed_weights: self.weights.max_allowed_weights,
            submit_zero_weights: self.weights.submit_zero_weights,
            max_commit_retries: self.weights.max_commit_retries,
            commit_timeout: Duration::from_millis(self.weights.commit_timeout_ms),
        }
    }

    /// Relay budget parameters.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            default_budget: Duration::from_millis(self.relay.default_budget_ms),
            max_budget: Duration::from_millis(self.relay.max_budget_ms),
        }
    }

    /// Validator loop parameters.
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            tick_interval: Duration::from_millis(self.validator_loop.tick_interval_ms),
            self_rounds: self.validator_loop.self_rounds,
        }
    }

    /// Logging parameters.
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            log_level: self.telemetry.log_level.clone(),
            json_logs: self.telemetry.json_logs,
            with_source: self.telemetry.json_logs,
            ..TelemetryConfig::default()
        }
    }
}
