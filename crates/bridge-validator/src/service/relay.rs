//! # Bridge Relay
//!
//! Requesting-network entry point. Authorizes the caller, then runs one
//! round within the caller's budget and returns the top result.
//!
//! Outbound calls are made with the relay's own credentials (held by the
//! peer client); the caller's identity is only used for authorization and
//! logging.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::registry::PeerRegistry;
use super::round::RoundExecutor;
use crate::domain::{
    Authorization, BridgeError, BridgeResult, CallerId, RelayConfig, RelayOutcome, Task,
};
use crate::metrics;
use crate::ports::{Authorizer, RelayApi};

/// Server side of the bridge.
pub struct BridgeRelay {
    authorizer: Arc<dyn Authorizer>,
    registry: Arc<PeerRegistry>,
    rounds: Arc<RoundExecutor>,
    config: RelayConfig,
}

impl BridgeRelay {
    /// Create a relay.
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        registry: Arc<PeerRegistry>,
        rounds: Arc<RoundExecutor>,
        config: RelayConfig,
    ) -> Self {
        Self {
            authorizer,
            registry,
            rounds,
            config,
        }
    }
}

#[async_trait]
impl RelayApi for BridgeRelay {
    async fn handle(
        &self,
        caller: CallerId,
        payload: Value,
        budget: Option<Duration>,
    ) -> BridgeResult<RelayOutcome> {
        if let Authorization::Denied { reason } = self.authorizer.authorize(&caller) {
            metrics::record_relay_request("permission_denied");
            warn!(caller = %caller, reason = %reason, "[relay] Caller rejected");
            return Err(BridgeError::PermissionDenied { caller, reason });
        }

        let budget = self.config.budget_for(budget);
        let task = Task::new(payload, caller, budget);
        let snapshot = self.registry.current();

        let round = self.rounds.run(&task, &snapshot);
        let outcome = match tokio::time::timeout_at(task.deadline(), round).await {
            Ok(outcome) => outcome,
            Err(_) => {
                metrics::record_relay_request("timeout");
                warn!(
                    task_id = %task.id(),
                    budget_ms = budget.as_millis() as u64,
                    "[relay] Budget exhausted"
                );
                return Ok(RelayOutcome::TimedOut);
            }
        };

        let result = match outcome.top {
            Some(top) => RelayOutcome::Answered(top),
            None if outcome.any_time_bound_failure() => RelayOutcome::TimedOut,
            None => RelayOutcome::NoResponse,
        };
        let label = match &result {
            RelayOutcome::Answered(_) => "ok",
            RelayOutcome::NoResponse => "empty",
            RelayOutcome::TimedOut => "timeout",
        };
        metrics::record_relay_request(label);
        info!(
            task_id = %task.id(),
            caller = %task.caller(),
            outcome = label,
            "[relay] Request served"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AllowList, StaticRegistrySource};
    use crate::algorithms::LatencyScorer;
    use crate::domain::{DispatchConfig, EpochLedger, PeerId, RegistryConfig, SelectionMode};
    use crate::ports::RegistryRecord;
    use crate::service::{Aggregator, Dispatcher};
    use crate::testing::{FixedTimeSource, MockPeerClient};
    use serde_json::json;

    fn record(key: &str, port: u16) -> RegistryRecord {
        RegistryRecord {
            key: key.to_string(),
            uid: 0,
            stake: 10,
            address: format!("10.0.0.1:{port}"),
            last_update: 0,
            validator_permit: true,
        }
    }

    async fn relay(client: Arc<MockPeerClient>, peers: Vec<RegistryRecord>) -> (BridgeRelay, Arc<EpochLedger>) {
        let registry = Arc::new(PeerRegistry::new(
            Arc::new(StaticRegistrySource::new(peers)),
            1,
            RegistryConfig::default(),
            Arc::new(FixedTimeSource::new(0)),
        ));
        registry.refresh().await;
        let ledger = Arc::new(EpochLedger::new(0));
        let dispatch = DispatchConfig {
            sample_size: 8,
            per_call_timeout: Duration::from_secs(2),
            round_deadline: Duration::from_secs(5),
            selection: SelectionMode::Lexicographic,
            seed: None,
        };
        let rounds = Arc::new(RoundExecutor::new(
            Dispatcher::new(client, dispatch.selection, None),
            Aggregator::new(Arc::new(LatencyScorer::default()), 0.0, Arc::clone(&ledger)),
            dispatch,
        ));
        let allow = Arc::new(AllowList::new(vec!["5Caller".to_string()], vec![]));
        let relay = BridgeRelay::new(allow, registry, rounds, RelayConfig::default());
        (relay, ledger)
    }

    #[tokio::test]
    async fn test_denied_caller_makes_no_calls() {
        let client = Arc::new(MockPeerClient::new().respond("a", json!("A"), Duration::ZERO));
        let (relay, ledger) = relay(client.clone(), vec![record("a", 1)]).await;

        let err = relay
            .handle(CallerId::new("5Stranger", None), json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::PermissionDenied { .. }));
        assert_eq!(client.call_count(), 0);
        assert!(ledger.totals().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_allowed_caller_gets_fastest_answer() {
        let client = Arc::new(
            MockPeerClient::new()
                .respond("a", json!("slow"), Duration::from_millis(800))
                .respond("b", json!("fast"), Duration::from_millis(50)),
        );
        let (relay, ledger) = relay(client, vec![record("a", 1), record("b", 2)]).await;

        let outcome = relay
            .handle(CallerId::new("5Caller", None), json!({"prompt": "x"}), None)
            .await
            .unwrap();
        match outcome {
            RelayOutcome::Answered(top) => {
                assert_eq!(top.peer(), &PeerId::from("b"));
                assert_eq!(top.payload(), Some(&json!("fast")));
            }
            other => panic!("expected answer, got {other:?}"),
        }
        assert_eq!(ledger.totals().len(), 2);
    }

    #[tokio::test]
    async fn test_no_peers_is_empty_result() {
        let client = Arc::new(MockPeerClient::new());
        let (relay, _) = relay(client, vec![]).await;
        let outcome = relay
            .handle(CallerId::new("5Caller", None), json!({}), None)
            .await
            .unwrap();
        assert!(matches!(outcome, RelayOutcome::NoResponse));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_is_timeout() {
        let client = Arc::new(MockPeerClient::new().respond("a", json!("A"), Duration::from_secs(10)));
        let (relay, _) = relay(client, vec![record("a", 1)]).await;

        let started = tokio::time::Instant::now();
        let outcome = relay
            .handle(
                CallerId::new("5Caller", None),
                json!({}),
                Some(Duration::from_millis(500)),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, RelayOutcome::TimedOut));
        assert!(started.elapsed() <= Duration::from_millis(500));
    }
}
