//! # Domain Entities
//!
//! Peers, tasks, responses and weight vectors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use uuid::Uuid;

use super::errors::BridgeError;
use super::value_objects::{CallerId, Netuid, PeerEndpoint, PeerId};

/// A provider-network peer as seen by the last registry refresh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Peer key.
    pub id: PeerId,
    /// Slot index on the subnet.
    pub uid: u16,
    /// Stake backing the peer.
    pub stake: u64,
    /// Where the peer serves calls.
    pub endpoint: PeerEndpoint,
    /// Unix seconds of the last liveness signal.
    pub last_seen: u64,
    /// Peer holds validator permission on the subnet.
    pub validator_permit: bool,
}

/// Immutable view of eligible peers.
///
/// Shared behind an `Arc`; a refresh builds a new snapshot instead of
/// mutating the current one, so in-flight rounds keep a consistent view.
#[derive(Clone, Debug, Default)]
pub struct PeerSnapshot {
    peers: BTreeMap<PeerId, PeerInfo>,
    taken_at: u64,
}

impl PeerSnapshot {
    /// Build a snapshot from peers taken at `taken_at` (unix seconds).
    pub fn new(peers: impl IntoIterator<Item = PeerInfo>, taken_at: u64) -> Self {
        Self {
            peers: peers.into_iter().map(|p| (p.id.clone(), p)).collect(),
            taken_at,
        }
    }

    /// Snapshot with no peers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a peer.
    pub fn get(&self, id: &PeerId) -> Option<&PeerInfo> {
        self.peers.get(id)
    }

    /// Whether the peer is present.
    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.contains_key(id)
    }

    /// Stake of a peer, zero when unknown.
    pub fn stake_of(&self, id: &PeerId) -> u64 {
        self.peers.get(id).map(|p| p.stake).unwrap_or(0)
    }

    /// Peers in key order.
    pub fn iter(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.values()
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// No peers.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Unix seconds when the underlying data was fetched.
    pub fn taken_at(&self) -> u64 {
        self.taken_at
    }

    /// Seconds since the data was fetched.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.taken_at)
    }
}

/// A unit of work bridged to the provider network.
///
/// Fields are private: a task is immutable once created.
#[derive(Clone, Debug)]
pub struct Task {
    id: Uuid,
    payload: Arc<Value>,
    caller: CallerId,
    deadline: Instant,
}

impl Task {
    /// Create a task that must complete within `budget` from now.
    pub fn new(payload: Value, caller: CallerId, budget: Duration) -> Self {
        Self::with_deadline(payload, caller, Instant::now() + budget)
    }

    /// Create a task with an absolute deadline.
    pub fn with_deadline(payload: Value, caller: CallerId, deadline: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: Arc::new(payload),
            caller,
            deadline,
        }
    }

    /// Task identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Opaque payload forwarded to peers.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Who asked for it.
    pub fn caller(&self) -> &CallerId {
        &self.caller
    }

    /// Absolute deadline.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Why a peer produced no usable result in a round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerFailure {
    /// Per-call timeout elapsed.
    Timeout(Duration),
    /// Transport or protocol error.
    Unreachable(String),
    /// Round deadline hit while the call was still outstanding.
    RoundDeadline,
}

impl PeerFailure {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Unreachable(_) => "unreachable",
            Self::RoundDeadline => "round_deadline",
        }
    }

    /// Failure was caused by a time bound rather than an error.
    pub fn is_time_bound(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::RoundDeadline)
    }
}

impl fmt::Display for PeerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(t) => write!(f, "timed out after {:?}", t),
            Self::Unreachable(reason) => write!(f, "unreachable: {}", reason),
            Self::RoundDeadline => f.write_str("round deadline reached"),
        }
    }
}

/// Result of one peer call within a round.
#[derive(Clone, Debug)]
pub struct PeerResponse {
    /// Responding (or failing) peer.
    pub peer: PeerId,
    /// Result payload, present only on success.
    pub payload: Option<Value>,
    /// Round-trip time, or time until the failure was observed.
    pub latency: Duration,
    /// When the response was collected.
    pub received_at: Instant,
    /// Failure reason, absent on success.
    pub failure: Option<PeerFailure>,
}

impl PeerResponse {
    /// Successful response.
    pub fn success(peer: PeerId, payload: Value, latency: Duration) -> Self {
        Self {
            peer,
            payload: Some(payload),
            latency,
            received_at: Instant::now(),
            failure: None,
        }
    }

    /// Failed response.
    pub fn failure(peer: PeerId, failure: PeerFailure, latency: Duration) -> Self {
        Self {
            peer,
            payload: None,
            latency,
            received_at: Instant::now(),
            failure: Some(failure),
        }
    }

    /// Whether the peer returned a payload.
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.payload.is_some()
    }

    /// The failure as a [`BridgeError`], `None` on success.
    ///
    /// A call cut off by the round deadline is a timeout after its observed
    /// latency.
    pub fn error(&self) -> Option<BridgeError> {
        let failure = self.failure.as_ref()?;
        let peer = self.peer.clone();
        Some(match failure {
            PeerFailure::Timeout(timeout) => BridgeError::PeerTimeout {
                peer,
                timeout: *timeout,
            },
            PeerFailure::RoundDeadline => BridgeError::PeerTimeout {
                peer,
                timeout: self.latency,
            },
            PeerFailure::Unreachable(reason) => BridgeError::PeerUnreachable {
                peer,
                reason: reason.clone(),
            },
        })
    }
}

/// A response with its score for the round it was produced in.
///
/// Scores are only comparable with other scores from the same round and
/// the same `scoring_version`.
#[derive(Clone, Debug)]
pub struct ScoredResponse {
    /// Underlying response.
    pub response: PeerResponse,
    /// Score assigned by the scoring function (or the failure floor).
    pub score: f64,
    /// Version of the scoring function that produced `score`.
    pub scoring_version: u32,
}

impl ScoredResponse {
    /// Peer that produced the response.
    pub fn peer(&self) -> &PeerId {
        &self.response.peer
    }

    /// Round-trip latency.
    pub fn latency(&self) -> Duration {
        self.response.latency
    }

    /// Result payload.
    pub fn payload(&self) -> Option<&Value> {
        self.response.payload.as_ref()
    }
}

/// Outcome of scoring one round.
#[derive(Clone, Debug, Default)]
pub struct RoundOutcome {
    /// Best successful response, `None` when nobody answered in time.
    pub top: Option<ScoredResponse>,
    /// Every response (failures included) in rank order.
    pub ranked: Vec<ScoredResponse>,
}

impl RoundOutcome {
    /// Number of successful responses in the round.
    pub fn successes(&self) -> usize {
        self.ranked.iter().filter(|s| s.response.is_success()).count()
    }

    /// Whether any failure was caused by a time bound.
    pub fn any_time_bound_failure(&self) -> bool {
        self.ranked
            .iter()
            .filter_map(|s| s.response.failure.as_ref())
            .any(PeerFailure::is_time_bound)
    }
}

/// Result returned to a relay caller.
#[derive(Clone, Debug)]
pub enum RelayOutcome {
    /// Best response from the provider network.
    Answered(ScoredResponse),
    /// No peer produced a result; a normal outcome, not a fault.
    NoResponse,
    /// The caller's budget ran out before any peer answered.
    TimedOut,
}

/// One entry of a submitted weight vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    /// Peer being weighted.
    pub peer: PeerId,
    /// Score accumulated over the epoch.
    pub accumulated_score: f64,
    /// Normalized weight; entries of a submission sum to 1.0.
    pub weight: f64,
}

/// Weight vector for one epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightSubmission {
    /// Target subnet.
    pub netuid: Netuid,
    /// Epoch the vector belongs to; doubles as the idempotency nonce.
    pub epoch: u64,
    /// Entries ordered by peer key.
    pub entries: Vec<WeightEntry>,
}

impl WeightSubmission {
    /// Build a submission, ordering entries by peer key.
    pub fn new(netuid: Netuid, epoch: u64, mut entries: Vec<WeightEntry>) -> Self {
        entries.sort_by(|a, b| a.peer.cmp(&b.peer));
        Self {
            netuid,
            epoch,
            entries,
        }
    }

    /// Sum of weights.
    pub fn weight_sum(&self) -> f64 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// SHA-256 over `(netuid, epoch, entries)`.
    ///
    /// Two submissions with the same digest are the same intended vector.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.netuid.to_le_bytes());
        hasher.update(self.epoch.to_le_bytes());
        for entry in &self.entries {
            let key = entry.peer.as_str().as_bytes();
            hasher.update((key.len() as u32).to_le_bytes());
            hasher.update(key);
            hasher.update(entry.weight.to_bits().to_le_bytes());
        }
        hasher.finalize().into()
    }

    /// Integer weights on a `0..=scale` range.
    ///
    /// Entries that round to zero are dropped, as provider networks reject
    /// explicit zero votes.
    pub fn quantized(&self, scale: u16) -> Vec<(PeerId, u16)> {
        self.entries
            .iter()
            .filter_map(|e| {
                let w = (e.weight * f64::from(scale)).round();
                let w = w.clamp(0.0, f64::from(scale)) as u16;
                (w > 0).then(|| (e.peer.clone(), w))
            })
            .collect()
    }
}

/// A weight submission signed with the relay's credentials.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedSubmission {
    /// The vector.
    pub submission: WeightSubmission,
    /// Relay hotkey that signed it.
    pub signer: PeerId,
    /// Hex SHA-256 digest of the submission.
    pub digest: String,
    /// Hex HMAC-SHA256 over the digest.
    pub signature: String,
}
