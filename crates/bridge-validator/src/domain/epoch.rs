//! # Epoch Ledger
//!
//! Single owner of the per-epoch score totals.
//!
//! Rounds add their whole batch under one lock acquisition, so concurrent
//! rounds never observe each other half-applied. At an epoch boundary the
//! open totals move into a pending commit; scores recorded while a commit
//! is in flight land in the next epoch. The first attempt's signed vector
//! is stored on the pending commit and only cleared once the submitter
//! accepted it, so every retry resubmits exactly that vector.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::entities::{ScoredResponse, SignedSubmission};
use super::value_objects::PeerId;

/// Totals frozen at an epoch boundary, waiting to be submitted.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingCommit {
    /// Epoch the totals belong to.
    pub epoch: u64,
    /// Accumulated score per peer.
    pub totals: HashMap<PeerId, f64>,
    /// Failed submission attempts so far.
    pub attempts: u32,
    /// Vector built on the first attempt; reused verbatim by retries.
    pub submission: Option<SignedSubmission>,
}

/// What happened to a pending commit after a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Kept for another attempt.
    Retry {
        /// Attempts made so far
        attempts: u32,
    },
    /// Retry budget spent; totals were folded back into the open epoch.
    Exhausted {
        /// Attempts made
        attempts: u32,
    },
}

#[derive(Debug)]
struct EpochState {
    open_epoch: u64,
    totals: HashMap<PeerId, f64>,
    pending: Option<PendingCommit>,
    last_committed_epoch: Option<u64>,
    last_commit_at: Option<u64>,
}

/// Serialized-access owner of [`EpochState`].
#[derive(Debug)]
pub struct EpochLedger {
    state: Mutex<EpochState>,
}

impl EpochLedger {
    /// Create a ledger whose first open epoch is `open_epoch`.
    pub fn new(open_epoch: u64) -> Self {
        Self {
            state: Mutex::new(EpochState {
                open_epoch,
                totals: HashMap::new(),
                pending: None,
                last_committed_epoch: None,
                last_commit_at: None,
            }),
        }
    }

    /// Add one round's scores atomically.
    ///
    /// Failed responses are recorded too (usually with a zero score) so the
    /// peer shows up in the epoch's accounting.
    pub fn record_round(&self, batch: &[ScoredResponse]) {
        if batch.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        for scored in batch {
            *state.totals.entry(scored.peer().clone()).or_insert(0.0) += scored.score.max(0.0);
        }
    }

    /// Freeze the open epoch if `current_epoch` has moved past it.
    ///
    /// Returns the pending commit, new or left over from a failed attempt.
    pub fn drain_for_commit(&self, current_epoch: u64) -> Option<PendingCommit> {
        let mut state = self.state.lock();
        if state.pending.is_none() && current_epoch > state.open_epoch {
            let totals = std::mem::take(&mut state.totals);
            state.pending = Some(PendingCommit {
                epoch: state.open_epoch,
                totals,
                attempts: 0,
                submission: None,
            });
            state.open_epoch = current_epoch;
        }
        state.pending.clone()
    }

    /// Mark the pending commit for `epoch` as accepted.
    pub fn mark_committed(&self, epoch: u64, at: u64) {
        let mut state = self.state.lock();
        if state.pending.as_ref().map(|p| p.epoch) == Some(epoch) {
            state.pending = None;
            state.last_committed_epoch = Some(epoch);
            state.last_commit_at = Some(at);
        }
    }

    /// Pin `signed` as the vector for the pending commit of `epoch`.
    ///
    /// The first pinned vector wins; the returned submission is the one
    /// every attempt must send.
    pub fn pin_submission(&self, epoch: u64, signed: SignedSubmission) -> SignedSubmission {
        let mut state = self.state.lock();
        match state.pending.as_mut() {
            Some(pending) if pending.epoch == epoch => {
                pending.submission.get_or_insert(signed).clone()
            }
            _ => signed,
        }
    }

    /// Drop the pending commit for `epoch` without submitting (nothing to vote).
    pub fn discard_pending(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.pending.as_ref().map(|p| p.epoch) == Some(epoch) {
            state.pending = None;
        }
    }

    /// Record a failed attempt for `epoch`.
    ///
    /// After `max_attempts` failures the frozen totals are merged back into
    /// the open epoch so no score is lost.
    pub fn mark_failed(&self, epoch: u64, max_attempts: u32) -> FailureDisposition {
        let mut state = self.state.lock();
        let attempts = match state.pending.as_mut() {
            Some(pending) if pending.epoch == epoch => {
                pending.attempts += 1;
                pending.attempts
            }
            _ => return FailureDisposition::Retry { attempts: 0 },
        };
        if attempts < max_attempts {
            return FailureDisposition::Retry { attempts };
        }
        if let Some(pending) = state.pending.take() {
            for (peer, score) in pending.totals {
                *state.totals.entry(peer).or_insert(0.0) += score;
            }
        }
        FailureDisposition::Exhausted { attempts }
    }

    /// Copy of the open epoch's totals.
    pub fn totals(&self) -> HashMap<PeerId, f64> {
        self.state.lock().totals.clone()
    }

    /// Epoch currently accumulating.
    pub fn open_epoch(&self) -> u64 {
        self.state.lock().open_epoch
    }

    /// Last epoch the provider network accepted.
    pub fn last_committed_epoch(&self) -> Option<u64> {
        self.state.lock().last_committed_epoch
    }

    /// Unix seconds of the last accepted commit.
    pub fn last_commit_at(&self) -> Option<u64> {
        self.state.lock().last_commit_at
    }

    /// Whether a commit is waiting to be (re)submitted.
    pub fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }
}
