//! # Inbound Ports
//!
//! What the requesting network can ask of the bridge.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{BridgeResult, CallerId, RelayOutcome};

/// Relay API - inbound port.
///
/// Mirrors a module-serve style call: the caller hands over a payload and
/// receives the best provider-network result, an explicit empty result, a
/// timeout, or `PermissionDenied`, always within its budget.
#[async_trait]
pub trait RelayApi: Send + Sync {
    /// Bridge one task.
    async fn handle(
        &self,
        caller: CallerId,
        payload: Value,
        budget: Option<Duration>,
    ) -> BridgeResult<RelayOutcome>;
}
