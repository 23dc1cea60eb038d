//! # Bridge Container
//!
//! Builds every adapter and service from a validated [`BridgeConfig`] and
//! holds them for the lifetime of the process.
//!
//! ## Wiring
//!
//! ```text
//! RegistrySource ─→ PeerRegistry ─┬─→ BridgeRelay ←── AllowList
//! PeerClient ─→ Dispatcher ──┐    │
//! Scorer ─→ Aggregator ──────┴─→ RoundExecutor ─→ ValidatorLoop
//!                 └─→ EpochLedger ─→ WeightCommitter ←── WeightSubmitter
//! ```

use std::sync::Arc;
use std::time::Duration;

use bridge_validator::algorithms::scorer_from_name;
use bridge_validator::ports::{PromptSource, RegistrySource, WeightSubmitter};
use bridge_validator::{
    Aggregator, AllowList, BridgeError, BridgeRelay, BridgeResult, Dispatcher, EpochLedger,
    HttpPeerClient, HttpRegistrySource, HttpWeightSubmitter, InMemoryWeightLedger,
    LoopDependencies, PeerRegistry, RoundExecutor, StaticPromptSource, StaticRegistrySource,
    SystemTimeSource, TimeSource, ValidatorLoop, WeightCommitter,
};
use tracing::info;

use crate::api::AppState;
use crate::config::{BridgeConfig, RegistrySourceKind, SubmitterKind};

/// Connection setup bound for outbound peer calls.
const PEER_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// All long-lived components of a running bridge.
pub struct BridgeContainer {
    /// Provider subnet.
    pub netuid: u16,
    /// Peer registry.
    pub registry: Arc<PeerRegistry>,
    /// Epoch score totals.
    pub ledger: Arc<EpochLedger>,
    /// Inbound relay.
    pub relay: Arc<BridgeRelay>,
    /// Weight committer.
    pub committer: Arc<WeightCommitter>,
    /// Periodic driver.
    pub validator: Arc<ValidatorLoop>,
}

impl BridgeContainer {
    /// Build with the system clock.
    pub fn build(config: &BridgeConfig) -> BridgeResult<Self> {
        Self::build_with_clock(config, Arc::new(SystemTimeSource))
    }

    /// Build with an explicit clock.
    pub fn build_with_clock(
        config: &BridgeConfig,
        time_source: Arc<dyn TimeSource>,
    ) -> BridgeResult<Self> {
        let netuid = config.subnet.netuid;
        let credentials = config.credentials()?;
        let relay_key = credentials.hotkey().clone();

        let source: Arc<dyn RegistrySource> = match config.registry.source {
            RegistrySourceKind::Static => {
                Arc::new(StaticRegistrySource::new(config.registry.peers.clone()))
            }
            RegistrySourceKind::Http => Arc::new(HttpRegistrySource::new(
                required_url(config.registry.url.as_deref(), "registry.url")?,
                Duration::from_millis(config.registry.timeout_ms),
            )?),
        };
        let registry = Arc::new(
            PeerRegistry::new(
                source,
                netuid,
                config.registry_config(),
                Arc::clone(&time_source),
            )
            .excluding(relay_key.clone()),
        );

        let weight_config = config.weight_config();
        let ledger = Arc::new(EpochLedger::new(weight_config.epoch_at(time_source.now())));

        let dispatch = config.dispatch_config();
        let client = Arc::new(HttpPeerClient::new(
            config.dispatch.method.clone(),
            credentials.clone(),
            PEER_CONNECT_TIMEOUT,
        )?);
        let scorer = scorer_from_name(&config.scoring.function, config.scoring.stake_bonus)?;
        let rounds = Arc::new(RoundExecutor::new(
            Dispatcher::new(client, dispatch.selection, dispatch.seed),
            Aggregator::new(scorer, config.scoring.failure_floor, Arc::clone(&ledger)),
            dispatch,
        ));

        let allow_list = Arc::new(AllowList::new(
            config.relay.allowed_callers.clone(),
            config.relay.allowed_subnets.clone(),
        ));
        let relay = Arc::new(BridgeRelay::new(
            allow_list,
            Arc::clone(&registry),
            Arc::clone(&rounds),
            config.relay_config(),
        ));

        let submitter: Arc<dyn WeightSubmitter> = match config.weights.submitter {
            SubmitterKind::Memory => Arc::new(InMemoryWeightLedger::new()),
            SubmitterKind::Http => Arc::new(HttpWeightSubmitter::new(
                required_url(config.weights.url.as_deref(), "weights.url")?,
                Duration::from_millis(config.weights.commit_timeout_ms),
            )?),
        };
        let committer = Arc::new(WeightCommitter::new(
            netuid,
            weight_config,
            Arc::clone(&ledger),
            Arc::clone(&registry),
            submitter,
            credentials,
        ));

        let prompts: Arc<dyn PromptSource> = Arc::new(StaticPromptSource::new(
            config.validator_loop.prompts.clone(),
            netuid,
        ));
        let validator = Arc::new(ValidatorLoop::new(
            LoopDependencies {
                registry: Arc::clone(&registry),
                rounds,
                committer: Arc::clone(&committer),
                prompts,
                time_source,
            },
            config.loop_config(),
            netuid,
            relay_key,
        ));

        info!(
            netuid,
            registry = ?config.registry.source,
            submitter = ?config.weights.submitter,
            scoring = %config.scoring.function,
            "Bridge components wired"
        );

        Ok(Self {
            netuid,
            registry,
            ledger,
            relay,
            committer,
            validator,
        })
    }

    /// Shared state for the HTTP surface.
    pub fn app_state(&self) -> AppState {
        AppState {
            netuid: self.netuid,
            relay: self.relay.clone(),
            registry: Arc::clone(&self.registry),
            ledger: Arc::clone(&self.ledger),
        }
    }
}

fn required_url(url: Option<&str>, field: &str) -> BridgeResult<String> {
    url.map(str::to_string)
        .ok_or_else(|| BridgeError::Configuration(format!("{field} is required")))
}
