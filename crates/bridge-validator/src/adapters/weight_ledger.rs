//! In-memory provider weight ledger.
//!
//! Behaves like an idempotent provider network: one vector per
//! `(netuid, epoch)`. Resubmitting the same signed vector is a no-op; a
//! different vector for an already-committed epoch is rejected with
//! [`BridgeError::EpochAlreadyCommitted`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{BridgeError, BridgeResult, Netuid, SignedSubmission};
use crate::ports::WeightSubmitter;

/// Weight submitter that keeps committed vectors in memory.
#[derive(Debug, Default)]
pub struct InMemoryWeightLedger {
    committed: Mutex<BTreeMap<(Netuid, u64), SignedSubmission>>,
    failures_left: Mutex<u32>,
    lost_acks_left: Mutex<u32>,
    digests: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
    accepted_calls: AtomicUsize,
}

impl InMemoryWeightLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` submissions.
    pub fn fail_next(&self, n: u32) {
        *self.failures_left.lock() = n;
    }

    /// Store the next `n` submissions but report them as failed.
    pub fn lose_next_ack(&self, n: u32) {
        *self.lost_acks_left.lock() = n;
    }

    /// Delay every submission.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Vector stored for an epoch.
    pub fn committed(&self, netuid: Netuid, epoch: u64) -> Option<SignedSubmission> {
        self.committed.lock().get(&(netuid, epoch)).cloned()
    }

    /// Number of distinct committed epochs.
    pub fn committed_epochs(&self) -> usize {
        self.committed.lock().len()
    }

    /// Digest of every submission that reached the ledger, in order.
    pub fn submitted_digests(&self) -> Vec<String> {
        self.digests.lock().clone()
    }

    /// Submissions that reached the ledger, duplicates included.
    pub fn submission_count(&self) -> usize {
        self.accepted_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        Self::take(&self.failures_left)
    }

    fn take(counter: &Mutex<u32>) -> bool {
        let mut left = counter.lock();
        if *left > 0 {
            *left -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl WeightSubmitter for InMemoryWeightLedger {
    async fn submit(&self, signed: &SignedSubmission) -> BridgeResult<()> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let epoch = signed.submission.epoch;
        if self.take_failure() {
            return Err(BridgeError::CommitFailure {
                epoch,
                attempt: 0,
                reason: "injected submission failure".to_string(),
            });
        }

        self.digests.lock().push(signed.digest.clone());
        let key = (signed.submission.netuid, epoch);
        {
            let mut committed = self.committed.lock();
            if let Some(existing) = committed.get(&key) {
                if existing.digest != signed.digest {
                    return Err(BridgeError::EpochAlreadyCommitted {
                        epoch,
                        digest: existing.digest.clone(),
                    });
                }
            } else {
                committed.insert(key, signed.clone());
            }
        }
        self.accepted_calls.fetch_add(1, Ordering::SeqCst);

        if Self::take(&self.lost_acks_left) {
            return Err(BridgeError::CommitFailure {
                epoch,
                attempt: 0,
                reason: "acknowledgement lost".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PeerId, RelayCredentials, WeightEntry, WeightSubmission};

    fn signed(epoch: u64, weight_a: f64) -> SignedSubmission {
        let creds = RelayCredentials::new(PeerId::from("relay"), [3u8; 32]);
        creds.sign_submission(WeightSubmission::new(
            1,
            epoch,
            vec![
                WeightEntry {
                    peer: PeerId::from("a"),
                    accumulated_score: weight_a,
                    weight: weight_a,
                },
                WeightEntry {
                    peer: PeerId::from("b"),
                    accumulated_score: 1.0 - weight_a,
                    weight: 1.0 - weight_a,
                },
            ],
        ))
    }

    #[tokio::test]
    async fn test_same_vector_twice_is_idempotent() {
        let ledger = InMemoryWeightLedger::new();
        ledger.submit(&signed(4, 0.6)).await.unwrap();
        let before = ledger.committed(1, 4);
        ledger.submit(&signed(4, 0.6)).await.unwrap();
        assert_eq!(ledger.committed(1, 4), before);
        assert_eq!(ledger.committed_epochs(), 1);
        assert_eq!(ledger.submission_count(), 2);
    }

    #[tokio::test]
    async fn test_conflicting_vector_rejected() {
        let ledger = InMemoryWeightLedger::new();
        ledger.submit(&signed(4, 0.6)).await.unwrap();
        let stored = ledger.committed(1, 4).unwrap().digest;
        match ledger.submit(&signed(4, 0.7)).await {
            Err(BridgeError::EpochAlreadyCommitted { epoch: 4, digest }) => {
                assert_eq!(digest, stored)
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(ledger.submit(&signed(5, 0.7)).await.is_ok());
    }

    #[tokio::test]
    async fn test_lost_ack_still_stores_vector() {
        let ledger = InMemoryWeightLedger::new();
        ledger.lose_next_ack(1);
        assert!(ledger.submit(&signed(2, 0.5)).await.is_err());
        assert!(ledger.committed(1, 2).is_some());
        assert!(ledger.submit(&signed(2, 0.5)).await.is_ok());
        assert_eq!(ledger.submitted_digests().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let ledger = InMemoryWeightLedger::new();
        ledger.fail_next(2);
        assert!(ledger.submit(&signed(1, 0.5)).await.is_err());
        assert!(ledger.submit(&signed(1, 0.5)).await.is_err());
        assert!(ledger.submit(&signed(1, 0.5)).await.is_ok());
        assert_eq!(ledger.submission_count(), 1);
    }
}
