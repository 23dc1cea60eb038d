//! # Domain Errors
//!
//! Error taxonomy for the bridge validator.
//!
//! Per-peer failures never escape a round: the dispatcher folds them into
//! [`PeerFailure`](super::PeerFailure) values. An empty round is not an
//! error either, see [`RelayOutcome::NoResponse`](super::RelayOutcome).

use std::time::Duration;

use thiserror::Error;

use super::value_objects::{CallerId, PeerId};

/// Bridge validator error types.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Registry source failed or timed out; the previous snapshot stays live.
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// A peer did not answer within its per-call timeout.
    #[error("Peer {peer} timed out after {timeout:?}")]
    PeerTimeout {
        /// Peer that timed out
        peer: PeerId,
        /// Per-call timeout that elapsed
        timeout: Duration,
    },

    /// A peer call failed at the network or protocol level.
    #[error("Peer {peer} unreachable: {reason}")]
    PeerUnreachable {
        /// Peer that failed
        peer: PeerId,
        /// Transport-level reason
        reason: String,
    },

    /// Caller is not on the relay allow-list.
    #[error("Permission denied for caller {caller}: {reason}")]
    PermissionDenied {
        /// Rejected caller
        caller: CallerId,
        /// Why the authorizer rejected it
        reason: String,
    },

    /// A single weight submission attempt failed.
    #[error("Weight commit for epoch {epoch} failed (attempt {attempt}): {reason}")]
    CommitFailure {
        /// Epoch being committed
        epoch: u64,
        /// Attempt number, starting at 1
        attempt: u32,
        /// Submitter error
        reason: String,
    },

    /// The provider already holds a vector for this epoch.
    ///
    /// When `digest` matches the vector being sent, an earlier attempt landed
    /// and only its acknowledgement was lost.
    #[error("Epoch {epoch} already committed with digest {digest}")]
    EpochAlreadyCommitted {
        /// Epoch being committed
        epoch: u64,
        /// Digest of the stored vector
        digest: String,
    },

    /// Weight submission gave up after the retry budget.
    #[error("Weight commit for epoch {epoch} abandoned after {attempts} attempts")]
    CommitRetriesExhausted {
        /// Epoch that could not be committed
        epoch: u64,
        /// Attempts made
        attempts: u32,
    },

    /// Invalid startup configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The relay's own hotkey is missing from the subnet registry.
    #[error("Relay hotkey {0} is not registered in the subnet")]
    RelayNotRegistered(PeerId),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
