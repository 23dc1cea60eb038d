//! # Bridge Round-Trip Tests
//!
//! Drives the relay, the epoch ledger and the weight committer together
//! against scripted peers and an in-memory provider ledger.
//!
//! All tests run on a paused tokio clock, so peer delays and deadlines are
//! exact and the suite finishes instantly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_validator::testing::{FixedTimeSource, MockPeerClient};
use bridge_validator::{
    Aggregator, AllowList, BridgeError, BridgeRelay, BridgeResult, CallerId, CommitResult,
    DispatchConfig, Dispatcher, EpochLedger, InMemoryWeightLedger, LatencyScorer, PeerId,
    PeerRegistry, RegistryConfig, RegistryRecord, RelayApi, RelayConfig, RelayCredentials,
    RelayOutcome, RoundExecutor, ScoringFunction, ScoringInput, SelectionMode, SignedSubmission,
    StaticRegistrySource, WeightCommitter, WeightConfig, WeightSubmitter,
};
use serde_json::json;

const NETUID: u16 = 21;

/// Scores a response with the number it returned.
struct DeclaredScore;

impl ScoringFunction for DeclaredScore {
    fn name(&self) -> &'static str {
        "declared"
    }

    fn version(&self) -> u32 {
        1
    }

    fn score(&self, input: &ScoringInput<'_>) -> f64 {
        input.payload.as_f64().unwrap_or(0.0)
    }
}

/// Fails the first submission, then accepts; remembers every digest seen.
#[derive(Default)]
struct FlakySubmitter {
    digests: Mutex<Vec<String>>,
}

#[async_trait]
impl WeightSubmitter for FlakySubmitter {
    async fn submit(&self, signed: &SignedSubmission) -> BridgeResult<()> {
        let mut digests = self.digests.lock().unwrap();
        digests.push(signed.digest.clone());
        if digests.len() == 1 {
            return Err(BridgeError::CommitFailure {
                epoch: signed.submission.epoch,
                attempt: 0,
                reason: "provider busy".to_string(),
            });
        }
        Ok(())
    }
}

fn record(key: &str, port: u16) -> RegistryRecord {
    RegistryRecord {
        key: key.to_string(),
        uid: port,
        stake: 100,
        address: format!("10.0.0.1:{port}"),
        last_update: 0,
        validator_permit: true,
    }
}

struct Bridge {
    relay: BridgeRelay,
    committer: WeightCommitter,
    ledger: Arc<EpochLedger>,
}

async fn bridge(
    client: Arc<MockPeerClient>,
    scorer: Arc<dyn ScoringFunction>,
    records: Vec<RegistryRecord>,
    dispatch: DispatchConfig,
    submitter: Arc<dyn WeightSubmitter>,
) -> Bridge {
    let registry = Arc::new(PeerRegistry::new(
        Arc::new(StaticRegistrySource::new(records)),
        NETUID,
        RegistryConfig::default(),
        Arc::new(FixedTimeSource::new(0)),
    ));
    registry.refresh().await;

    let ledger = Arc::new(EpochLedger::new(0));
    let rounds = Arc::new(RoundExecutor::new(
        Dispatcher::new(client, dispatch.selection, dispatch.seed),
        Aggregator::new(scorer, 0.0, Arc::clone(&ledger)),
        dispatch,
    ));
    let allow = Arc::new(AllowList::new(vec!["5Caller".to_string()], vec![]));
    let relay = BridgeRelay::new(
        allow,
        Arc::clone(&registry),
        rounds,
        RelayConfig::default(),
    );
    let committer = WeightCommitter::new(
        NETUID,
        WeightConfig {
            epoch_length: Duration::from_secs(100),
            ..Default::default()
        },
        Arc::clone(&ledger),
        registry,
        submitter,
        RelayCredentials::new(PeerId::from("5Relay"), [7u8; 32]),
    );
    Bridge {
        relay,
        committer,
        ledger,
    }
}

fn dispatch() -> DispatchConfig {
    DispatchConfig {
        sample_size: 8,
        per_call_timeout: Duration::from_secs(1),
        round_deadline: Duration::from_secs(3),
        selection: SelectionMode::Lexicographic,
        seed: None,
    }
}

fn caller() -> CallerId {
    CallerId::new("5Caller", Some(NETUID))
}

#[tokio::test(start_paused = true)]
async fn test_fastest_answer_wins_and_failures_rank_last() {
    let client = Arc::new(
        MockPeerClient::new()
            .respond("a", json!("A"), Duration::from_millis(300))
            .respond("b", json!("B"), Duration::from_millis(100))
            .fail("c", "connection refused"),
    );
    let b = bridge(
        client,
        Arc::new(LatencyScorer::default()),
        vec![record("a", 1), record("b", 2), record("c", 3)],
        dispatch(),
        Arc::new(InMemoryWeightLedger::new()),
    )
    .await;

    let outcome = b.relay.handle(caller(), json!({"prompt": "hi"}), None).await.unwrap();
    match outcome {
        RelayOutcome::Answered(top) => {
            assert_eq!(top.peer(), &PeerId::from("b"));
            assert_eq!(top.payload(), Some(&json!("B")));
        }
        other => panic!("Expected answer, got {:?}", other),
    }

    let totals = b.ledger.totals();
    assert!(totals[&PeerId::from("b")] > totals[&PeerId::from("a")]);
    assert_eq!(totals[&PeerId::from("c")], 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_peer_times_out_while_others_are_scored() {
    // Arrange: B answers long after the per-call timeout
    let client = Arc::new(
        MockPeerClient::new()
            .respond("a", json!(1.0), Duration::from_millis(200))
            .respond("b", json!(9.0), Duration::from_secs(5))
            .respond("c", json!(2.0), Duration::from_millis(400)),
    );
    let b = bridge(
        client,
        Arc::new(DeclaredScore),
        vec![record("a", 1), record("b", 2), record("c", 3)],
        dispatch(),
        Arc::new(InMemoryWeightLedger::new()),
    )
    .await;

    // Act
    let started = tokio::time::Instant::now();
    let outcome = b.relay.handle(caller(), json!({}), None).await.unwrap();

    // Assert: the round ended at the per-call bound, B scored the floor
    assert!(started.elapsed() <= Duration::from_secs(1));
    match outcome {
        RelayOutcome::Answered(top) => assert_eq!(top.peer(), &PeerId::from("c")),
        other => panic!("Expected answer, got {:?}", other),
    }
    let totals = b.ledger.totals();
    assert_eq!(totals[&PeerId::from("a")], 1.0);
    assert_eq!(totals[&PeerId::from("b")], 0.0);
    assert_eq!(totals[&PeerId::from("c")], 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_every_peer_timing_out_is_reported_as_timeout() {
    let client = Arc::new(MockPeerClient::new().respond("a", json!(1.0), Duration::from_secs(5)));
    let b = bridge(
        client,
        Arc::new(DeclaredScore),
        vec![record("a", 1)],
        dispatch(),
        Arc::new(InMemoryWeightLedger::new()),
    )
    .await;

    let outcome = b.relay.handle(caller(), json!({}), None).await.unwrap();
    assert!(matches!(outcome, RelayOutcome::TimedOut));
}

#[tokio::test(start_paused = true)]
async fn test_epoch_weights_follow_accumulated_scores() {
    // Arrange: A=0, B=8, C=2 over one epoch
    let client = Arc::new(
        MockPeerClient::new()
            .respond("a", json!(0.0), Duration::from_millis(10))
            .respond("b", json!(8.0), Duration::from_millis(10))
            .respond("c", json!(2.0), Duration::from_millis(10)),
    );
    let provider = Arc::new(InMemoryWeightLedger::new());
    let b = bridge(
        client,
        Arc::new(DeclaredScore),
        vec![record("a", 1), record("b", 2), record("c", 3)],
        dispatch(),
        provider.clone(),
    )
    .await;
    b.relay.handle(caller(), json!({}), None).await.unwrap();

    // Act: not due inside the epoch, committed once it ends
    assert_eq!(
        b.committer.maybe_commit(99).await,
        CommitResult::NotDue { open_epoch: 0 }
    );
    let result = b.committer.maybe_commit(100).await;

    // Assert
    assert_eq!(result, CommitResult::Committed { epoch: 0, entries: 2 });
    let signed = provider.committed(NETUID, 0).expect("epoch 0 committed");
    let weights: Vec<(String, f64)> = signed
        .submission
        .entries
        .iter()
        .map(|e| (e.peer.as_str().to_string(), e.weight))
        .collect();
    assert_eq!(weights.len(), 2);
    assert_eq!(weights[0].0, "b");
    assert!((weights[0].1 - 0.8).abs() < 1e-9);
    assert_eq!(weights[1].0, "c");
    assert!((weights[1].1 - 0.2).abs() < 1e-9);
    assert!((signed.submission.weight_sum() - 1.0).abs() < 1e-9);
    assert_eq!(signed.signer, PeerId::from("5Relay"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_commit_resubmits_identical_vector() {
    let client = Arc::new(
        MockPeerClient::new()
            .respond("a", json!(3.0), Duration::from_millis(10))
            .respond("b", json!(1.0), Duration::from_millis(10)),
    );
    let submitter = Arc::new(FlakySubmitter::default());
    let b = bridge(
        client,
        Arc::new(DeclaredScore),
        vec![record("a", 1), record("b", 2)],
        dispatch(),
        submitter.clone(),
    )
    .await;
    b.relay.handle(caller(), json!({}), None).await.unwrap();

    let first = b.committer.maybe_commit(150).await;
    assert!(matches!(first, CommitResult::Failed { epoch: 0, attempts: 1, .. }));

    // A round in between belongs to the new epoch, not the retried vector
    b.relay.handle(caller(), json!({}), None).await.unwrap();

    let second = b.committer.maybe_commit(160).await;
    assert_eq!(second, CommitResult::Committed { epoch: 0, entries: 2 });

    let digests = submitter.digests.lock().unwrap().clone();
    assert_eq!(digests.len(), 2);
    assert_eq!(digests[0], digests[1]);
    assert_eq!(b.ledger.last_committed_epoch(), Some(0));
    assert_eq!(b.ledger.totals()[&PeerId::from("a")], 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_resubmitting_committed_vector_is_idempotent() {
    let client = Arc::new(MockPeerClient::new().respond("a", json!(1.0), Duration::ZERO));
    let provider = Arc::new(InMemoryWeightLedger::new());
    let b = bridge(
        client,
        Arc::new(DeclaredScore),
        vec![record("a", 1)],
        dispatch(),
        provider.clone(),
    )
    .await;
    b.relay.handle(caller(), json!({}), None).await.unwrap();
    b.committer.maybe_commit(100).await;

    let signed = provider.committed(NETUID, 0).unwrap();
    provider.submit(&signed).await.unwrap();

    assert_eq!(provider.committed_epochs(), 1);
    assert_eq!(provider.committed(NETUID, 0), Some(signed));
}

#[tokio::test(start_paused = true)]
async fn test_empty_registry_answers_nothing_and_skips_epoch() {
    let client = Arc::new(MockPeerClient::new());
    let provider = Arc::new(InMemoryWeightLedger::new());
    let b = bridge(
        client.clone(),
        Arc::new(LatencyScorer::default()),
        vec![],
        dispatch(),
        provider.clone(),
    )
    .await;

    let outcome = b.relay.handle(caller(), json!({}), None).await.unwrap();
    assert!(matches!(outcome, RelayOutcome::NoResponse));
    assert_eq!(client.call_count(), 0);

    assert_eq!(
        b.committer.maybe_commit(100).await,
        CommitResult::Skipped { epoch: 0 }
    );
    assert_eq!(provider.submission_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unlisted_caller_is_never_forwarded() {
    let client = Arc::new(MockPeerClient::new().respond("a", json!(1.0), Duration::ZERO));
    let b = bridge(
        client.clone(),
        Arc::new(LatencyScorer::default()),
        vec![record("a", 1)],
        dispatch(),
        Arc::new(InMemoryWeightLedger::new()),
    )
    .await;

    let err = b
        .relay
        .handle(CallerId::new("5Mallory", Some(3)), json!({}), None)
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::PermissionDenied { .. }));
    assert_eq!(client.call_count(), 0);
    assert!(b.ledger.totals().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_round_deadline_cuts_outstanding_calls() {
    // Arrange: per-call bound looser than the round deadline
    let dispatch = DispatchConfig {
        per_call_timeout: Duration::from_secs(3),
        round_deadline: Duration::from_secs(2),
        ..dispatch()
    };
    let client = Arc::new(
        MockPeerClient::new()
            .respond("a", json!(1.0), Duration::from_millis(100))
            .respond("b", json!(5.0), Duration::from_millis(2_500)),
    );
    let b = bridge(
        client,
        Arc::new(DeclaredScore),
        vec![record("a", 1), record("b", 2)],
        dispatch,
        Arc::new(InMemoryWeightLedger::new()),
    )
    .await;

    let outcome = b.relay.handle(caller(), json!({}), None).await.unwrap();

    match outcome {
        RelayOutcome::Answered(top) => assert_eq!(top.peer(), &PeerId::from("a")),
        other => panic!("Expected answer, got {:?}", other),
    }
    assert_eq!(b.ledger.totals()[&PeerId::from("b")], 0.0);
}
