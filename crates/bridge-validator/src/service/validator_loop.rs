//! # Validator Loop
//!
//! Top-level driver: registry refresh on its own interval, plus
//! self-originated sampling rounds and the weight committer's cadence check
//! once per tick, until shutdown.
//!
//! Nothing inside an iteration is fatal. Every failure is logged and the
//! loop carries on at the next tick.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::committer::{CommitResult, WeightCommitter};
use super::registry::{PeerRegistry, RefreshReport};
use super::round::RoundExecutor;
use crate::domain::{CallerId, LoopConfig, Netuid, PeerId, Task};
use crate::ports::{PromptSource, TimeSource};

/// What happened to the self-originated round of an iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelfRound {
    /// Self rounds are switched off.
    Disabled,
    /// The prompt source had nothing to send.
    NoPrompt,
    /// The relay hotkey is missing from the registry.
    NotRegistered,
    /// A round ran.
    Ran {
        /// Peers that took part
        peers: usize,
        /// Peers that answered in time
        successes: usize,
    },
}

/// Summary of one loop iteration.
#[derive(Clone, Debug)]
pub struct IterationReport {
    /// Registry refresh, when one was due.
    pub refresh: Option<RefreshReport>,
    /// Self-originated round.
    pub self_round: SelfRound,
    /// Committer cadence check.
    pub commit: CommitResult,
}

/// Collaborators of the loop.
pub struct LoopDependencies {
    /// Peer registry.
    pub registry: Arc<PeerRegistry>,
    /// Shared round executor.
    pub rounds: Arc<RoundExecutor>,
    /// Weight committer.
    pub committer: Arc<WeightCommitter>,
    /// Payloads for self rounds.
    pub prompts: Arc<dyn PromptSource>,
    /// Wall clock for epoch math.
    pub time_source: Arc<dyn TimeSource>,
}

/// Periodic driver of the bridge.
pub struct ValidatorLoop {
    deps: LoopDependencies,
    config: LoopConfig,
    netuid: Netuid,
    relay_key: PeerId,
    last_refresh: Mutex<Option<Instant>>,
}

impl ValidatorLoop {
    /// Create a loop acting as `relay_key` on `netuid`.
    pub fn new(deps: LoopDependencies, config: LoopConfig, netuid: Netuid, relay_key: PeerId) -> Self {
        Self {
            deps,
            config,
            netuid,
            relay_key,
            last_refresh: Mutex::new(None),
        }
    }

    /// Run one iteration by hand: refresh when due, then sample and commit.
    pub async fn run_iteration(&self) -> IterationReport {
        let refresh = self.refresh_if_due().await;
        let (self_round, commit) = self.sample_and_commit().await;
        IterationReport {
            refresh,
            self_round,
            commit,
        }
    }

    /// Run until `shutdown` flips to `true` or its sender goes away.
    ///
    /// The registry refreshes on its own interval, concurrently with the
    /// tick that drives self rounds and the commit check, so a slow round or
    /// submission never holds back a refresh. The first refresh and the first
    /// tick run immediately.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        info!(
            netuid = self.netuid,
            tick_ms = self.config.tick_interval.as_millis() as u64,
            refresh_ms = self.deps.registry.config().refresh_interval.as_millis() as u64,
            "[loop] Validator loop started"
        );
        self.refresh_now().await;
        tokio::join!(
            self.refresh_task(shutdown.clone()),
            self.tick_task(shutdown)
        );
        info!("[loop] Shutdown signal received, validator loop stopped");
    }

    async fn refresh_task(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.deps.registry.config().refresh_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_now().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    async fn tick_task(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let (self_round, commit) = self.sample_and_commit().await;
                    debug!(self_round = ?self_round, commit = ?commit, "[loop] Iteration finished");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    async fn sample_and_commit(&self) -> (SelfRound, CommitResult) {
        let self_round = self.self_round().await;
        let commit = self
            .deps
            .committer
            .maybe_commit(self.deps.time_source.now())
            .await;
        (self_round, commit)
    }

    async fn refresh_if_due(&self) -> Option<RefreshReport> {
        let interval = self.deps.registry.config().refresh_interval;
        let due = match *self.last_refresh.lock() {
            Some(at) => at.elapsed() >= interval,
            None => true,
        };
        if !due {
            return None;
        }
        Some(self.refresh_now().await)
    }

    async fn refresh_now(&self) -> RefreshReport {
        let report = self.deps.registry.refresh().await;
        *self.last_refresh.lock() = Some(Instant::now());
        report
    }

    async fn self_round(&self) -> SelfRound {
        if !self.config.self_rounds {
            return SelfRound::Disabled;
        }
        if let Err(e) = self.deps.registry.ensure_registered(&self.relay_key) {
            warn!(netuid = self.netuid, error = %e, "[loop] Skipping self round");
            return SelfRound::NotRegistered;
        }
        let Some(payload) = self.deps.prompts.next_payload() else {
            debug!("[loop] No prompt available");
            return SelfRound::NoPrompt;
        };

        let task = Task::new(
            payload,
            CallerId::new(self.relay_key.as_str(), Some(self.netuid)),
            self.deps.rounds.config().round_deadline,
        );
        let snapshot = self.deps.registry.current();
        let outcome = self.deps.rounds.run(&task, &snapshot).await;
        SelfRound::Ran {
            peers: outcome.ranked.len(),
            successes: outcome.successes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryWeightLedger, StaticPromptSource, StaticRegistrySource};
    use crate::algorithms::LatencyScorer;
    use crate::domain::{
        DispatchConfig, EpochLedger, RegistryConfig, RelayCredentials, SelectionMode, WeightConfig,
    };
    use crate::ports::RegistryRecord;
    use crate::service::{Aggregator, Dispatcher};
    use crate::testing::{FixedTimeSource, MockPeerClient};
    use serde_json::json;
    use std::time::Duration;

    fn record(key: &str) -> RegistryRecord {
        RegistryRecord {
            key: key.to_string(),
            uid: 0,
            stake: 1,
            address: "10.0.0.9:8091".to_string(),
            last_update: 0,
            validator_permit: true,
        }
    }

    struct Harness {
        source: Arc<StaticRegistrySource>,
        clock: Arc<FixedTimeSource>,
        provider: Arc<InMemoryWeightLedger>,
        client: Arc<MockPeerClient>,
        validator: ValidatorLoop,
    }

    fn harness(records: Vec<RegistryRecord>, prompts: Vec<String>) -> Harness {
        harness_ticking(
            records,
            prompts,
            Duration::from_secs(10),
            Duration::from_secs(60),
        )
    }

    fn harness_ticking(
        records: Vec<RegistryRecord>,
        prompts: Vec<String>,
        tick_interval: Duration,
        refresh_interval: Duration,
    ) -> Harness {
        let source = Arc::new(StaticRegistrySource::new(records));
        let clock = Arc::new(FixedTimeSource::new(0));
        let registry = Arc::new(
            PeerRegistry::new(
                source.clone(),
                5,
                RegistryConfig {
                    refresh_interval,
                    ..Default::default()
                },
                clock.clone(),
            )
            .excluding(PeerId::from("relay")),
        );
        let client = Arc::new(
            MockPeerClient::new()
                .respond("a", json!("fast"), Duration::from_millis(10))
                .respond("b", json!("slow"), Duration::from_millis(900))
                .respond("slow", json!("late"), Duration::from_secs(600)),
        );
        let ledger = Arc::new(EpochLedger::new(0));
        let dispatch = DispatchConfig {
            selection: SelectionMode::Lexicographic,
            ..Default::default()
        };
        let rounds = Arc::new(RoundExecutor::new(
            Dispatcher::new(client.clone(), dispatch.selection, None),
            Aggregator::new(Arc::new(LatencyScorer::default()), 0.0, Arc::clone(&ledger)),
            dispatch,
        ));
        let provider = Arc::new(InMemoryWeightLedger::new());
        let committer = Arc::new(WeightCommitter::new(
            5,
            WeightConfig {
                epoch_length: Duration::from_secs(100),
                ..Default::default()
            },
            ledger,
            Arc::clone(&registry),
            provider.clone(),
            RelayCredentials::new(PeerId::from("relay"), [9u8; 32]),
        ));
        let validator = ValidatorLoop::new(
            LoopDependencies {
                registry,
                rounds,
                committer,
                prompts: Arc::new(StaticPromptSource::new(prompts, 5)),
                time_source: clock.clone(),
            },
            LoopConfig {
                tick_interval,
                self_rounds: true,
            },
            5,
            PeerId::from("relay"),
        );
        Harness {
            source,
            clock,
            provider,
            client,
            validator,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_iteration_samples_then_commits_at_boundary() {
        let h = harness(
            vec![record("relay"), record("a"), record("b")],
            vec!["ping".to_string()],
        );

        let first = h.validator.run_iteration().await;
        assert!(first.refresh.unwrap().is_fresh());
        assert_eq!(first.self_round, SelfRound::Ran { peers: 2, successes: 2 });
        assert_eq!(first.commit, CommitResult::NotDue { open_epoch: 0 });
        assert_eq!(h.client.calls_to("relay"), 0);

        h.clock.set(100);
        let second = h.validator.run_iteration().await;
        assert!(second.refresh.is_none());
        assert!(matches!(second.commit, CommitResult::Committed { epoch: 0, .. }));
        assert_eq!(h.provider.committed_epochs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregistered_relay_skips_self_round() {
        let h = harness(vec![record("a")], vec!["ping".to_string()]);
        let report = h.validator.run_iteration().await;
        assert_eq!(report.self_round, SelfRound::NotRegistered);
        assert_eq!(h.client.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_outage_is_not_fatal() {
        let h = harness(vec![record("relay"), record("a")], vec!["ping".to_string()]);
        h.validator.run_iteration().await;

        h.source.set_available(false);
        tokio::time::advance(Duration::from_secs(61)).await;
        let report = h.validator.run_iteration().await;
        assert!(!report.refresh.unwrap().is_fresh());
        assert!(matches!(report.self_round, SelfRound::Ran { peers: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_prompts_means_no_self_round() {
        let h = harness(vec![record("relay"), record("a")], vec![]);
        let report = h.validator.run_iteration().await;
        assert_eq!(report.self_round, SelfRound::NoPrompt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let h = Arc::new(harness(
            vec![record("relay"), record("a")],
            vec!["ping".to_string()],
        ));
        let (tx, rx) = watch::channel(false);
        let runner = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.validator.run(rx).await })
        };

        tokio::time::sleep(Duration::from_secs(35)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .unwrap()
            .unwrap();
        assert!(h.client.calls_to("a") >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_runs_on_its_own_interval() {
        let h = Arc::new(harness_ticking(
            vec![record("relay"), record("a")],
            vec!["ping".to_string()],
            Duration::from_secs(1_000),
            Duration::from_secs(60),
        ));
        let (tx, rx) = watch::channel(false);
        let runner = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.validator.run(rx).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(h.validator.deps.registry.current().contains(&PeerId::from("a")));
        h.source
            .set_records(vec![record("relay"), record("a"), record("c")]);

        // Next tick is far away; only the refresh interval can pick up "c"
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(h.validator.deps.registry.current().contains(&PeerId::from("c")));
        assert_eq!(h.client.calls_to("a"), 1);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_round_does_not_hold_back_refresh() {
        let h = Arc::new(harness_ticking(
            vec![record("relay"), record("slow")],
            vec!["ping".to_string()],
            Duration::from_secs(10),
            Duration::from_secs(15),
        ));
        let (tx, rx) = watch::channel(false);
        let runner = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.validator.run(rx).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        h.source
            .set_records(vec![record("relay"), record("slow"), record("c")]);
        // Rounds wait 20s on "slow"; the 15s refresh lands mid-round
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(h.client.calls_to("slow"), 1);
        assert!(h.validator.deps.registry.current().contains(&PeerId::from("c")));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(120), runner)
            .await
            .unwrap()
            .unwrap();
    }
}
