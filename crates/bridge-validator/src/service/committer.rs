//! # Weight Committer
//!
//! Turns an epoch's accumulated scores into a signed, normalized weight
//! vector and submits it once the epoch boundary has passed.
//!
//! ## Retry discipline
//!
//! The vector is built and signed once, on the first attempt, and pinned to
//! the pending commit. A failed submission leaves it pending and the next
//! call resubmits it byte for byte, whatever the registry looks like by
//! then. A provider reporting the epoch as already holding our digest
//! counts as committed. After
//! `max_commit_retries` failures the commit is abandoned, its scores are
//! folded into the open epoch and an [`OperatorEvent`] is broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use super::registry::PeerRegistry;
use crate::algorithms::{cut_to_max_allowed, normalize_weights};
use crate::domain::{
    BridgeError, EpochLedger, FailureDisposition, Netuid, PeerId, RelayCredentials,
    SignedSubmission, WeightConfig, WeightSubmission,
};
use crate::metrics;
use crate::ports::WeightSubmitter;

/// Outcome of [`WeightCommitter::maybe_commit`].
#[derive(Clone, Debug, PartialEq)]
pub enum CommitResult {
    /// The open epoch has not ended yet.
    NotDue {
        /// Epoch still accumulating
        open_epoch: u64,
    },
    /// The epoch ended with nothing to vote for.
    Skipped {
        /// Epoch that was skipped
        epoch: u64,
    },
    /// The provider network accepted the vector.
    Committed {
        /// Committed epoch
        epoch: u64,
        /// Entries in the submitted vector
        entries: usize,
    },
    /// Submission failed; it will be retried on the next call.
    Failed {
        /// Epoch being committed
        epoch: u64,
        /// Failed attempts so far
        attempts: u32,
        /// Submitter error
        reason: String,
    },
    /// Retry budget spent; scores were carried into the open epoch.
    Abandoned {
        /// Epoch that could not be committed
        epoch: u64,
        /// Attempts made
        attempts: u32,
    },
}

/// Operator-visible fault raised by the committer.
#[derive(Clone, Debug, PartialEq)]
pub enum OperatorEvent {
    /// A weight commit was given up after its retry budget.
    CommitAbandoned {
        /// Epoch that could not be committed
        epoch: u64,
        /// Attempts made
        attempts: u32,
        /// Last submitter error
        last_error: String,
    },
}

impl OperatorEvent {
    /// The fault as a [`BridgeError`].
    pub fn to_error(&self) -> BridgeError {
        match self {
            Self::CommitAbandoned { epoch, attempts, .. } => BridgeError::CommitRetriesExhausted {
                epoch: *epoch,
                attempts: *attempts,
            },
        }
    }
}

/// Epoch-cadenced weight submission.
pub struct WeightCommitter {
    netuid: Netuid,
    config: WeightConfig,
    ledger: Arc<EpochLedger>,
    registry: Arc<PeerRegistry>,
    submitter: Arc<dyn WeightSubmitter>,
    credentials: RelayCredentials,
    events: broadcast::Sender<OperatorEvent>,
    in_flight: Mutex<()>,
}

impl WeightCommitter {
    /// Create a committer.
    pub fn new(
        netuid: Netuid,
        config: WeightConfig,
        ledger: Arc<EpochLedger>,
        registry: Arc<PeerRegistry>,
        submitter: Arc<dyn WeightSubmitter>,
        credentials: RelayCredentials,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            netuid,
            config,
            ledger,
            registry,
            submitter,
            credentials,
            events,
            in_flight: Mutex::new(()),
        }
    }

    /// Subscribe to operator events.
    pub fn subscribe(&self) -> broadcast::Receiver<OperatorEvent> {
        self.events.subscribe()
    }

    /// Weight parameters.
    pub fn config(&self) -> &WeightConfig {
        &self.config
    }

    /// Commit if the epoch containing `now` (unix seconds) is past the open one.
    ///
    /// Calls are serialized, so two loops can never submit the same epoch
    /// concurrently.
    pub async fn maybe_commit(&self, now: u64) -> CommitResult {
        let _guard = self.in_flight.lock().await;

        let current = self.config.epoch_at(now);
        let Some(pending) = self.ledger.drain_for_commit(current) else {
            return CommitResult::NotDue {
                open_epoch: self.ledger.open_epoch(),
            };
        };
        let epoch = pending.epoch;

        let signed = match pending.submission {
            Some(signed) => signed,
            None => match self.build_submission(epoch, &pending.totals) {
                Some(signed) => self.ledger.pin_submission(epoch, signed),
                None => {
                    self.ledger.discard_pending(epoch);
                    metrics::record_commit("skipped");
                    info!(netuid = self.netuid, epoch, "[commit] No scored peers, skipping epoch");
                    return CommitResult::Skipped { epoch };
                }
            },
        };
        let count = signed.submission.entries.len();
        let attempt = pending.attempts + 1;

        let submit = self.submitter.submit(&signed);
        let result = match tokio::time::timeout(self.config.commit_timeout, submit).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(BridgeError::EpochAlreadyCommitted { digest, .. })) if digest == signed.digest => {
                debug!(netuid = self.netuid, epoch, "[commit] Provider already holds this vector");
                Ok(())
            }
            Ok(Err(BridgeError::CommitFailure { reason, .. })) => Err(reason),
            Ok(Err(other)) => Err(other.to_string()),
            Err(_) => Err(format!(
                "submission timed out after {:?}",
                self.config.commit_timeout
            )),
        };

        match result {
            Ok(()) => {
                self.ledger.mark_committed(epoch, now);
                metrics::record_commit("committed");
                info!(
                    netuid = self.netuid,
                    epoch,
                    entries = count,
                    digest = %signed.digest,
                    "[commit] Weights committed"
                );
                CommitResult::Committed {
                    epoch,
                    entries: count,
                }
            }
            Err(reason) => self.on_failure(
                epoch,
                BridgeError::CommitFailure {
                    epoch,
                    attempt,
                    reason,
                },
            ),
        }
    }

    /// Normalize and sign the epoch's vector, `None` when nobody scored.
    fn build_submission(
        &self,
        epoch: u64,
        totals: &HashMap<PeerId, f64>,
    ) -> Option<SignedSubmission> {
        let live = self.live_totals(totals);
        let cut = cut_to_max_allowed(&live, self.config.max_allowed_weights);
        let entries = normalize_weights(&cut, self.config.submit_zero_weights);
        if entries.is_empty() {
            return None;
        }
        Some(
            self.credentials
                .sign_submission(WeightSubmission::new(self.netuid, epoch, entries)),
        )
    }

    /// Drop peers that are no longer in the registry snapshot.
    fn live_totals(&self, totals: &HashMap<PeerId, f64>) -> HashMap<PeerId, f64> {
        let snapshot = self.registry.current();
        let live: HashMap<PeerId, f64> = totals
            .iter()
            .filter(|(peer, _)| snapshot.contains(peer))
            .map(|(peer, score)| (peer.clone(), *score))
            .collect();
        let dropped = totals.len() - live.len();
        if dropped > 0 {
            info!(dropped, "[commit] Dropped deregistered peers from weight vector");
        }
        live
    }

    fn on_failure(&self, epoch: u64, error: BridgeError) -> CommitResult {
        let reason = error.to_string();
        match self
            .ledger
            .mark_failed(epoch, self.config.max_commit_retries)
        {
            FailureDisposition::Retry { attempts } => {
                metrics::record_commit("failed");
                warn!(
                    netuid = self.netuid,
                    epoch,
                    attempts,
                    error = %reason,
                    "[commit] Weight submission failed, will retry"
                );
                CommitResult::Failed {
                    epoch,
                    attempts,
                    reason,
                }
            }
            FailureDisposition::Exhausted { attempts } => {
                metrics::record_commit("abandoned");
                let event = OperatorEvent::CommitAbandoned {
                    epoch,
                    attempts,
                    last_error: reason,
                };
                error!(
                    netuid = self.netuid,
                    epoch,
                    attempts,
                    error = %event.to_error(),
                    "[commit] Giving up on epoch, scores carried forward"
                );
                // Send only fails when nobody is subscribed
                let _ = self.events.send(event);
                CommitResult::Abandoned { epoch, attempts }
            }
        }
    }
}
