//! # bridge-validator
//!
//! Bridge validator core for a staked, weighted subnet.
//!
//! ## Architecture
//!
//! A caller on the requesting network hands a task to the relay; the relay
//! fans it out to a sample of provider peers, scores what comes back within
//! the caller's budget and returns the best answer. Every scored round also
//! feeds the epoch ledger, which the weight committer turns into a signed,
//! normalized weight vector once per epoch.
//!
//! ```text
//! caller ──→ [BridgeRelay] ──┐
//!                            ├─→ [Dispatcher] ══→ provider peers
//! [ValidatorLoop] ───────────┘        │
//!        │                      [Aggregator] ──→ EpochLedger
//!        ├─→ [PeerRegistry] ←── registry source        │
//!        └─→ [WeightCommitter] ←───────────────────────┘ ──→ weight submission
//! ```
//!
//! ### Time bounds
//!
//! Every suspension point is bounded: registry queries by `fetch_timeout`,
//! peer calls by `per_call_timeout`, rounds by `round_deadline` and the
//! caller's budget, weight submissions by `commit_timeout`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bridge_validator::{BridgeRelay, RelayApi, CallerId};
//!
//! let outcome = relay
//!     .handle(CallerId::new("5Caller", Some(21)), payload, None)
//!     .await?;
//! ```

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod testing;

// Re-export main types
pub use adapters::{
    AllowList, HttpPeerClient, HttpRegistrySource, HttpWeightSubmitter, InMemoryWeightLedger,
    StaticPromptSource, StaticRegistrySource,
};
pub use algorithms::{
    scorer_from_name, ConsensusScorer, LatencyScorer, ScoringFunction, ScoringInput,
};
pub use domain::{
    Authorization, BridgeError, BridgeResult, CallerId, DispatchConfig, EpochLedger, LoopConfig,
    Netuid, PeerEndpoint, PeerFailure, PeerId, PeerInfo, PeerResponse, PeerSnapshot,
    RegistryConfig, RelayConfig, RelayCredentials, RelayOutcome, RoundOutcome, ScoredResponse,
    SelectionMode, SignedSubmission, Task, WeightConfig, WeightEntry, WeightSubmission,
};
pub use ports::{
    Authorizer, PeerClient, PromptSource, RegistryRecord, RegistrySource, RelayApi,
    SystemTimeSource, TimeSource, WeightSubmitter,
};
pub use service::{
    Aggregator, BridgeRelay, CommitResult, Dispatcher, IterationReport, LoopDependencies,
    OperatorEvent, PeerRegistry, RoundExecutor, SelfRound, ValidatorLoop, WeightCommitter,
};
