//! One dispatch-and-score round, shared by the relay and the validator loop.

use tokio::time::Instant;
use tracing::info;

use super::aggregator::Aggregator;
use super::dispatcher::Dispatcher;
use crate::domain::{DispatchConfig, PeerSnapshot, RoundOutcome, Task};
use crate::metrics;

/// Runs a [`Task`] through the dispatcher and the aggregator.
pub struct RoundExecutor {
    dispatcher: Dispatcher,
    aggregator: Aggregator,
    config: DispatchConfig,
}

impl RoundExecutor {
    /// Create an executor.
    pub fn new(dispatcher: Dispatcher, aggregator: Aggregator, config: DispatchConfig) -> Self {
        Self {
            dispatcher,
            aggregator,
            config,
        }
    }

    /// Dispatch parameters in use.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run one round against `snapshot`.
    ///
    /// Completes no later than the task deadline or the configured round
    /// deadline, whichever is sooner.
    pub async fn run(&self, task: &Task, snapshot: &PeerSnapshot) -> RoundOutcome {
        let started = Instant::now();
        let responses = self
            .dispatcher
            .dispatch(
                task,
                snapshot,
                self.config.sample_size,
                self.config.per_call_timeout,
                self.config.round_deadline,
            )
            .await;
        let outcome = self.aggregator.aggregate(responses, snapshot);

        let elapsed = started.elapsed();
        let label = if outcome.top.is_some() { "answered" } else { "empty" };
        metrics::record_round(label, elapsed.as_secs_f64());
        info!(
            task_id = %task.id(),
            caller = %task.caller(),
            peers = outcome.ranked.len(),
            successes = outcome.successes(),
            top = outcome.top.as_ref().map(|t| t.peer().as_str()).unwrap_or("-"),
            latency_ms = elapsed.as_millis() as u64,
            "[dispatch] Round complete"
        );
        outcome
    }
}
