//! # Outbound Ports
//!
//! Traits for the provider network and other external collaborators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Authorization, BridgeResult, CallerId, Netuid, PeerInfo, SignedSubmission};

/// Raw peer record as published by the provider network's registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Peer key.
    pub key: String,
    /// Slot index on the subnet.
    #[serde(default)]
    pub uid: u16,
    /// Stake backing the peer.
    #[serde(default)]
    pub stake: u64,
    /// Free-form address string; only `ip:port` is extracted.
    #[serde(default)]
    pub address: String,
    /// Unix seconds of the peer's last update.
    #[serde(default)]
    pub last_update: u64,
    /// Peer holds validator permission.
    #[serde(default)]
    pub validator_permit: bool,
}

/// Provider network registry - outbound port.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// All peers registered on `netuid`.
    async fn fetch_peers(&self, netuid: Netuid) -> BridgeResult<Vec<RegistryRecord>>;
}

/// Provider network peer call - outbound port.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Send an opaque payload to a peer and return its opaque result.
    ///
    /// Implementations need not enforce timeouts; the dispatcher bounds
    /// every call.
    async fn call(&self, peer: &PeerInfo, payload: &Value) -> BridgeResult<Value>;
}

/// Provider network weight submission - outbound port.
///
/// Implementations must be idempotent per epoch: resubmitting the same
/// signed vector for an epoch leaves provider state unchanged. Failures are
/// reported as `CommitFailure`; the committer stamps the attempt number.
#[async_trait]
pub trait WeightSubmitter: Send + Sync {
    /// Submit a signed weight vector.
    async fn submit(&self, submission: &SignedSubmission) -> BridgeResult<()>;
}

/// Relay caller authorization - outbound port.
pub trait Authorizer: Send + Sync {
    /// Decide whether `caller` may use the relay.
    fn authorize(&self, caller: &CallerId) -> Authorization;
}

/// Source of payloads for self-originated sampling rounds.
pub trait PromptSource: Send + Sync {
    /// Next payload, or `None` when no prompt is available.
    fn next_payload(&self) -> Option<Value>;
}

/// Wall-clock source, unix seconds.
pub trait TimeSource: Send + Sync {
    /// Current unix timestamp in seconds.
    fn now(&self) -> u64;
}

/// Default time source using system time.
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_is_after_2020() {
        assert!(SystemTimeSource.now() > 1_577_836_800);
    }

    #[test]
    fn test_registry_record_defaults() {
        let rec: RegistryRecord = serde_json::from_str(r#"{"key":"5Abc"}"#).unwrap();
        assert_eq!(rec.stake, 0);
        assert!(!rec.validator_permit);
        assert!(rec.address.is_empty());
    }
}
