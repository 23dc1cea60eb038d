//! # Bridge Services
//!
//! Stateful components built on the ports:
//!
//! ```text
//! ValidatorLoop ──┬─→ PeerRegistry ──→ RegistrySource
//!                 ├─→ RoundExecutor ─→ Dispatcher ──→ PeerClient
//! BridgeRelay ────┘        │
//!                          └─→ Aggregator ──→ EpochLedger
//! ValidatorLoop ───→ WeightCommitter ──→ WeightSubmitter
//! ```

pub mod aggregator;
pub mod committer;
pub mod dispatcher;
pub mod registry;
pub mod relay;
pub mod round;
pub mod validator_loop;

pub use aggregator::{score_and_select, Aggregator};
pub use committer::{CommitResult, OperatorEvent, WeightCommitter};
pub use dispatcher::Dispatcher;
pub use registry::{PeerRegistry, RefreshReport, SnapshotStatus};
pub use relay::BridgeRelay;
pub use round::RoundExecutor;
pub use validator_loop::{IterationReport, LoopDependencies, SelfRound, ValidatorLoop};
