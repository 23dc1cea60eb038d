//! Test doubles for the outbound ports.
//!
//! Public so integration tests and downstream crates can script a provider
//! network without sockets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::domain::{BridgeError, BridgeResult, PeerId, PeerInfo};
use crate::ports::{PeerClient, TimeSource};

#[derive(Clone, Debug)]
enum Script {
    Respond { value: Value, delay: Duration },
    Fail { reason: String, delay: Duration },
}

/// Scripted peer client that counts every call.
///
/// Peers without a script fail as unreachable.
#[derive(Debug, Default)]
pub struct MockPeerClient {
    scripts: HashMap<PeerId, Script>,
    calls: Mutex<Vec<PeerId>>,
}

impl MockPeerClient {
    /// Client with no scripted peers.
    pub fn new() -> Self {
        Self::default()
    }

    /// `peer` answers `value` after `delay`.
    pub fn respond(mut self, peer: &str, value: Value, delay: Duration) -> Self {
        self.scripts
            .insert(PeerId::from(peer), Script::Respond { value, delay });
        self
    }

    /// `peer` fails immediately.
    pub fn fail(self, peer: &str, reason: &str) -> Self {
        self.fail_after(peer, reason, Duration::ZERO)
    }

    /// `peer` fails after `delay`.
    pub fn fail_after(mut self, peer: &str, reason: &str, delay: Duration) -> Self {
        self.scripts.insert(
            PeerId::from(peer),
            Script::Fail {
                reason: reason.to_string(),
                delay,
            },
        );
        self
    }

    /// Total calls issued.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls issued to `peer`.
    pub fn calls_to(&self, peer: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|id| id.as_str() == peer)
            .count()
    }
}

#[async_trait]
impl PeerClient for MockPeerClient {
    async fn call(&self, peer: &PeerInfo, _payload: &Value) -> BridgeResult<Value> {
        self.calls.lock().push(peer.id.clone());
        match self.scripts.get(&peer.id).cloned() {
            Some(Script::Respond { value, delay }) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(Script::Fail { reason, delay }) => {
                tokio::time::sleep(delay).await;
                Err(BridgeError::PeerUnreachable {
                    peer: peer.id.clone(),
                    reason,
                })
            }
            None => Err(BridgeError::PeerUnreachable {
                peer: peer.id.clone(),
                reason: "no script for peer".to_string(),
            }),
        }
    }
}

/// Manually driven wall clock.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    now: AtomicU64,
}

impl FixedTimeSource {
    /// Clock reading `now` unix seconds.
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
