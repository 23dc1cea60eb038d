//! Registry source backed by a fixed list of records.
//!
//! Used for local networks and tests; records and availability can be
//! changed at runtime to simulate registry churn and outages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{BridgeError, BridgeResult, Netuid};
use crate::ports::{RegistryRecord, RegistrySource};

/// In-process registry.
#[derive(Debug)]
pub struct StaticRegistrySource {
    records: RwLock<Vec<RegistryRecord>>,
    available: AtomicBool,
    delay: Duration,
}

impl StaticRegistrySource {
    /// Serve `records` for every subnet.
    pub fn new(records: Vec<RegistryRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            available: AtomicBool::new(true),
            delay: Duration::ZERO,
        }
    }

    /// Answer only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replace the served records.
    pub fn set_records(&self, records: Vec<RegistryRecord>) {
        *self.records.write() = records;
    }

    /// Toggle simulated outages.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl RegistrySource for StaticRegistrySource {
    async fn fetch_peers(&self, netuid: Netuid) -> BridgeResult<Vec<RegistryRecord>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(BridgeError::RegistryUnavailable(format!(
                "static registry for subnet {netuid} is offline"
            )));
        }
        Ok(self.records.read().clone())
    }
}
