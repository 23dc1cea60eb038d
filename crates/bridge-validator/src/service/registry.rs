//! # Peer Registry Sync
//!
//! Keeps the live [`PeerSnapshot`] of eligible provider peers.
//!
//! A refresh that fails or times out leaves the previous snapshot in place;
//! readers always get a complete snapshot, never a partially-updated one.
//! The eligible snapshot and the registered key set are swapped together,
//! so a reader never pairs a new snapshot with an old registration.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{
    BridgeError, BridgeResult, Netuid, PeerEndpoint, PeerId, PeerInfo, PeerSnapshot,
    RegistryConfig,
};
use crate::metrics;
use crate::ports::{RegistryRecord, RegistrySource, TimeSource};

/// Freshness of the snapshot returned by [`PeerRegistry::refresh`].
#[derive(Clone, Debug, PartialEq)]
pub enum SnapshotStatus {
    /// The source answered; a new snapshot is live.
    Fresh {
        /// Eligible peers
        peers: usize,
        /// Records dropped by the eligibility filter
        filtered_out: usize,
    },
    /// The source failed; the previous snapshot is still live.
    Stale {
        /// Seconds since the live snapshot was fetched
        age_secs: u64,
        /// Age exceeded the staleness threshold
        warned: bool,
        /// Source error
        error: String,
    },
}

/// Result of one refresh.
#[derive(Clone, Debug)]
pub struct RefreshReport {
    /// Snapshot live after the refresh.
    pub snapshot: Arc<PeerSnapshot>,
    /// Whether it is new or carried over.
    pub status: SnapshotStatus,
}

impl RefreshReport {
    /// The source answered.
    pub fn is_fresh(&self) -> bool {
        matches!(self.status, SnapshotStatus::Fresh { .. })
    }
}

/// Eligible snapshot and full key set from the same refresh.
struct RegistryView {
    snapshot: Arc<PeerSnapshot>,
    registered: HashSet<PeerId>,
}

/// Owner of the peer snapshot.
pub struct PeerRegistry {
    source: Arc<dyn RegistrySource>,
    netuid: Netuid,
    config: RegistryConfig,
    time_source: Arc<dyn TimeSource>,
    excluded: Option<PeerId>,
    view: RwLock<Arc<RegistryView>>,
    loaded: AtomicBool,
}

impl PeerRegistry {
    /// Create a registry with an empty snapshot.
    pub fn new(
        source: Arc<dyn RegistrySource>,
        netuid: Netuid,
        config: RegistryConfig,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            source,
            netuid,
            config,
            time_source,
            excluded: None,
            view: RwLock::new(Arc::new(RegistryView {
                snapshot: Arc::new(PeerSnapshot::empty()),
                registered: HashSet::new(),
            })),
            loaded: AtomicBool::new(false),
        }
    }

    /// Never select `key` as a dispatch target (the relay's own hotkey).
    pub fn excluding(mut self, key: PeerId) -> Self {
        self.excluded = Some(key);
        self
    }

    /// Registry parameters.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Live snapshot.
    pub fn current(&self) -> Arc<PeerSnapshot> {
        Arc::clone(&self.view.read().snapshot)
    }

    /// Whether any refresh has succeeded yet.
    pub fn has_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Seconds since the live snapshot was fetched, `None` before the first load.
    pub fn staleness(&self) -> Option<u64> {
        self.has_loaded()
            .then(|| self.current().age(self.time_source.now()))
    }

    /// Query the source and swap in a new snapshot.
    ///
    /// Never fails: source errors and timeouts keep the previous snapshot
    /// and are reported through [`SnapshotStatus::Stale`].
    pub async fn refresh(&self) -> RefreshReport {
        let fetch = self.source.fetch_peers(self.netuid);
        let result = match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::RegistryUnavailable(format!(
                "registry query timed out after {:?}",
                self.config.fetch_timeout
            ))),
        };

        match result {
            Ok(records) => self.install(records),
            Err(e) => self.keep_stale(e),
        }
    }

    /// Check that `key` is registered on the subnet, eligible or not.
    pub fn ensure_registered(&self, key: &PeerId) -> BridgeResult<()> {
        if self.view.read().registered.contains(key) {
            Ok(())
        } else {
            Err(BridgeError::RelayNotRegistered(key.clone()))
        }
    }

    fn install(&self, records: Vec<RegistryRecord>) -> RefreshReport {
        let now = self.time_source.now();
        let total = records.len();
        let registered: HashSet<PeerId> =
            records.iter().map(|r| PeerId::from(r.key.as_str())).collect();
        let eligible: Vec<PeerInfo> = records
            .into_iter()
            .filter_map(|record| self.admit(record))
            .collect();
        let peers = eligible.len();
        let snapshot = Arc::new(PeerSnapshot::new(eligible, now));

        *self.view.write() = Arc::new(RegistryView {
            snapshot: Arc::clone(&snapshot),
            registered,
        });
        self.loaded.store(true, Ordering::Release);
        metrics::set_snapshot_peers(peers);

        info!(
            netuid = self.netuid,
            peers,
            filtered_out = total - peers,
            "[registry] Snapshot refreshed"
        );
        RefreshReport {
            snapshot,
            status: SnapshotStatus::Fresh {
                peers,
                filtered_out: total - peers,
            },
        }
    }

    fn keep_stale(&self, error: BridgeError) -> RefreshReport {
        let snapshot = self.current();
        let age_secs = if self.has_loaded() {
            snapshot.age(self.time_source.now())
        } else {
            u64::MAX
        };
        let warned = age_secs >= self.config.staleness_warn_after.as_secs();
        if warned {
            warn!(
                netuid = self.netuid,
                age_secs,
                error = %error,
                "[registry] Refresh failed and snapshot is stale"
            );
        } else {
            debug!(
                netuid = self.netuid,
                age_secs,
                error = %error,
                "[registry] Refresh failed, keeping previous snapshot"
            );
        }
        RefreshReport {
            snapshot,
            status: SnapshotStatus::Stale {
                age_secs,
                warned,
                error: error.to_string(),
            },
        }
    }

    fn admit(&self, record: RegistryRecord) -> Option<PeerInfo> {
        let id = PeerId::from(record.key);
        if self.excluded.as_ref() == Some(&id) {
            return None;
        }
        if record.stake < self.config.min_stake {
            return None;
        }
        if self.config.require_validator_permit && !record.validator_permit {
            return None;
        }
        let Some(endpoint) = PeerEndpoint::parse(&record.address) else {
            debug!(peer = %id, address = %record.address, "[registry] Dropping peer without endpoint");
            return None;
        };
        Some(PeerInfo {
            id,
            uid: record.uid,
            stake: record.stake,
            endpoint,
            last_seen: record.last_update,
            validator_permit: record.validator_permit,
        })
    }
}
