//! Pipeline runner: query history, decide, dispatch, commit, per claim.
//!
//! **Core invariant: a history entry is written only after a confirmed
//! publish, and every confirmed publish gets one.**
//!
//! Per-claim errors are logged and reported, never propagated: one bad
//! claim must not block the rest of the batch.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::claims::Claim;
use crate::config::NotifierConfig;
use crate::error::{ClaimError, HistoryError};
use crate::history::{AppendOutcome, HistoryEntry, HistoryStore};
use crate::pipeline::clock::{Clock, SystemClock};
use crate::pipeline::decision::{Decision, DecisionEngine};
use crate::pipeline::dispatcher::{DispatchIntent, Dispatcher};
use crate::pipeline::types::{
    ClaimOutcome, ClaimProgress, ClaimReport, ClaimState, RunControl, RunSummary,
};
use crate::queue::DeliveryQueue;

/// Orchestrates one batch of claims.
pub struct Pipeline {
    store: Arc<dyn HistoryStore>,
    dispatcher: Dispatcher,
    engine: DecisionEngine,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    max_concurrent: usize,
}

impl Pipeline {
    pub fn new(
        config: &NotifierConfig,
        store: Arc<dyn HistoryStore>,
        queue: Arc<dyn DeliveryQueue>,
    ) -> Self {
        Self {
            store,
            dispatcher: Dispatcher::new(
                queue,
                config.queue_destination.clone(),
                config.request_timeout,
            ),
            engine: DecisionEngine::new(config.policy),
            clock: Arc::new(SystemClock),
            timeout: config.request_timeout,
            max_concurrent: config.max_concurrent_claims.max(1),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Process a batch. Reports come back in input order.
    pub async fn run(&self, claims: Vec<Claim>, control: &RunControl) -> RunSummary {
        let run_id = Uuid::new_v4();
        let span = info_span!("notify_run", %run_id);

        async move {
            info!(
                count = claims.len(),
                concurrency = self.max_concurrent,
                "Processing claim batch"
            );

            let reports: Vec<ClaimReport> = stream::iter(claims)
                .map(|claim| self.process_claim(claim, control))
                .buffered(self.max_concurrent)
                .collect()
                .await;

            let summary = RunSummary { reports };
            info!(
                total = summary.total(),
                dispatched = summary.dispatched(),
                suppressed = summary.suppressed(),
                failed = summary.failed(),
                integrity_failures = summary.integrity_failures(),
                skipped = summary.skipped(),
                "Batch processing complete"
            );
            summary
        }
        .instrument(span)
        .await
    }

    /// Drive one claim to a terminal state.
    async fn process_claim(&self, claim: Claim, control: &RunControl) -> ClaimReport {
        let mut progress = ClaimProgress::new();

        let outcome = if control.is_cancelled() {
            debug!(claim_id = %claim.claim_id, "Run cancelled, claim not started");
            ClaimOutcome::Skipped
        } else {
            match self.evaluate(&claim, &mut progress).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log_claim_failure(&claim, &e);
                    ClaimOutcome::Failed(e)
                }
            }
        };

        advance(&mut progress, &claim.claim_id, outcome.state());
        ClaimReport {
            claim_id: claim.claim_id,
            outcome,
            path: progress.path().to_vec(),
        }
    }

    async fn evaluate(
        &self,
        claim: &Claim,
        progress: &mut ClaimProgress,
    ) -> Result<ClaimOutcome, ClaimError> {
        claim.validate().map_err(ClaimError::InvalidClaim)?;
        let claim_id = claim.claim_id.as_str();

        let history = self
            .bounded(claim_id, "query", self.store.query(claim_id))
            .await?;
        advance(progress, claim_id, ClaimState::HistoryQueried);

        let now = self.clock.now();
        let decision = self.engine.decide(claim_id, &history, now)?;
        advance(progress, claim_id, ClaimState::Decided);

        debug!(
            claim_id,
            prior_sends = history.len(),
            decision = decision.label(),
            "Claim evaluated"
        );

        match decision {
            Decision::Suppress(reason) => {
                debug!(claim_id, reason = ?reason, "Notification suppressed");
                Ok(ClaimOutcome::Suppressed(reason))
            }
            Decision::Send => {
                let intent = self.dispatcher.dispatch(claim, history.len(), now).await?;
                let concurrent_conflict = self.commit(&intent).await.inspect_err(|_| {
                    error!(
                        claim_id,
                        "Claim published but history append failed; it may be notified again"
                    );
                })?;
                Ok(ClaimOutcome::Dispatched {
                    message_id: intent.message_id,
                    concurrent_conflict,
                })
            }
        }
    }

    /// Record a confirmed publish. Returns whether another writer got there first.
    async fn commit(&self, intent: &DispatchIntent) -> Result<bool, HistoryError> {
        let claim_id = intent.claim_id.as_str();
        let entry: HistoryEntry = intent.history_entry();

        let outcome = self
            .bounded(
                claim_id,
                "append",
                self.store.append_if_count(&entry, intent.observed_count),
            )
            .await?;

        match outcome {
            AppendOutcome::Appended => Ok(false),
            AppendOutcome::CountChanged { actual } => {
                // The publish already happened; it still has to be recorded.
                warn!(
                    claim_id,
                    expected = intent.observed_count,
                    actual,
                    "History changed since decision, concurrent run likely notified too"
                );
                self.bounded(claim_id, "append", self.store.append(&entry))
                    .await?;
                Ok(true)
            }
        }
    }

    /// Bound a store call by the configured timeout.
    async fn bounded<T, F>(
        &self,
        claim_id: &str,
        operation: &'static str,
        fut: F,
    ) -> Result<T, HistoryError>
    where
        F: Future<Output = Result<T, HistoryError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(HistoryError::Timeout {
                claim_id: claim_id.to_string(),
                operation,
                timeout: self.timeout,
            }),
        }
    }
}

fn advance(progress: &mut ClaimProgress, claim_id: &str, next: ClaimState) {
    if let Err(e) = progress.transition_to(next) {
        error!(claim_id, error = %e, "Invalid claim state transition");
    }
}

fn log_claim_failure(claim: &Claim, e: &ClaimError) {
    match e {
        ClaimError::DataIntegrity(_) => error!(
            claim_id = %claim.claim_id,
            claim_number = %claim.claim_number,
            kind = e.kind(),
            error = %e,
            "Corrupt history record, claim skipped"
        ),
        _ => error!(
            claim_id = %claim.claim_id,
            claim_number = %claim.claim_number,
            kind = e.kind(),
            error = %e,
            "Failed to process claim"
        ),
    }
}
