//! Shared types for the notification pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ClaimError;
use crate::pipeline::decision::SuppressReason;

// ── Per-claim state machine ─────────────────────────────────────────

/// Where a single claim is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimState {
    /// Received from the upstream source.
    Fetched,
    /// History loaded.
    HistoryQueried,
    /// Decision computed.
    Decided,
    /// Not notified this run.
    Suppressed,
    /// Published and recorded.
    Dispatched,
    /// A per-claim error ended processing.
    Failed,
    /// Never started because the run was cancelled.
    Skipped,
}

impl ClaimState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: ClaimState) -> bool {
        use ClaimState::*;

        matches!(
            (self, target),
            (Fetched, HistoryQueried)
                | (Fetched, Failed)
                | (Fetched, Skipped)
                | (HistoryQueried, Decided)
                | (HistoryQueried, Failed)
                | (Decided, Suppressed)
                | (Decided, Dispatched)
                | (Decided, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Suppressed | Self::Dispatched | Self::Failed | Self::Skipped
        )
    }
}

impl std::fmt::Display for ClaimState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Fetched => "fetched",
            Self::HistoryQueried => "history_queried",
            Self::Decided => "decided",
            Self::Suppressed => "suppressed",
            Self::Dispatched => "dispatched",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// Tracks one claim through the state machine.
#[derive(Debug, Clone)]
pub struct ClaimProgress {
    state: ClaimState,
    path: Vec<ClaimState>,
}

impl ClaimProgress {
    pub fn new() -> Self {
        Self {
            state: ClaimState::Fetched,
            path: vec![ClaimState::Fetched],
        }
    }

    pub fn state(&self) -> ClaimState {
        self.state
    }

    /// Every state visited, in order.
    pub fn path(&self) -> &[ClaimState] {
        &self.path
    }

    pub fn transition_to(&mut self, next: ClaimState) -> Result<(), String> {
        if !self.state.can_transition_to(next) {
            return Err(format!("Cannot transition from {} to {}", self.state, next));
        }
        self.state = next;
        self.path.push(next);
        Ok(())
    }
}

impl Default for ClaimProgress {
    fn default() -> Self {
        Self::new()
    }
}

// ── Outcomes ────────────────────────────────────────────────────────

/// Terminal result for one claim.
#[derive(Debug)]
pub enum ClaimOutcome {
    Dispatched {
        message_id: Option<String>,
        /// History changed between decision and commit.
        concurrent_conflict: bool,
    },
    Suppressed(SuppressReason),
    Failed(ClaimError),
    Skipped,
}

impl ClaimOutcome {
    pub fn state(&self) -> ClaimState {
        match self {
            Self::Dispatched { .. } => ClaimState::Dispatched,
            Self::Suppressed(_) => ClaimState::Suppressed,
            Self::Failed(_) => ClaimState::Failed,
            Self::Skipped => ClaimState::Skipped,
        }
    }
}

/// What happened to one claim in a run.
#[derive(Debug)]
pub struct ClaimReport {
    pub claim_id: String,
    pub outcome: ClaimOutcome,
    /// States visited, `Fetched` first and the terminal state last.
    pub path: Vec<ClaimState>,
}

/// Per-claim reports for a whole run, in input order.
///
/// Observability only: per-claim failures never fail the invocation.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<ClaimReport>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn dispatched(&self) -> usize {
        self.count(ClaimState::Dispatched)
    }

    pub fn suppressed(&self) -> usize {
        self.count(ClaimState::Suppressed)
    }

    pub fn failed(&self) -> usize {
        self.count(ClaimState::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(ClaimState::Skipped)
    }

    /// Failures caused by corrupt history rather than transient errors.
    pub fn integrity_failures(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, ClaimOutcome::Failed(ClaimError::DataIntegrity(_))))
            .count()
    }

    pub fn report(&self, claim_id: &str) -> Option<&ClaimReport> {
        self.reports.iter().find(|r| r.claim_id == claim_id)
    }

    fn count(&self, state: ClaimState) -> usize {
        self.reports
            .iter()
            .filter(|r| r.outcome.state() == state)
            .count()
    }
}

// ── Cancellation ────────────────────────────────────────────────────

/// Cancellation for a run: a shared shutdown flag and an optional deadline.
///
/// Checked before each claim starts. A claim already in flight always
/// finishes, so dispatch and history append are never split.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    shutdown: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop starting claims once `budget` has elapsed from now.
    ///
    /// A budget too large to represent as an instant never expires.
    pub fn with_deadline(mut self, budget: Duration) -> Self {
        self.deadline = Instant::now().checked_add(budget);
        self
    }

    /// Handle that raises the shutdown flag from elsewhere (e.g. a signal task).
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn cancel(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
