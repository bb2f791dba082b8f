//! Claim notification pipeline.
//!
//! Every fetched claim flows through:
//! 1. `HistoryStore::query()`: prior notifications for the claim
//! 2. `DecisionEngine::decide()`: pure SEND/SUPPRESS under the throttle policy
//! 3. `Dispatcher::dispatch()`: one publish to the delivery queue
//! 4. History commit: append `dateSent = now`, only after a confirmed publish
//!
//! **At most `max_notifications` per claim, spaced by `cooldown`.** The cap is
//! best effort across concurrent runs; conflicts are detected and logged.

pub mod clock;
pub mod decision;
pub mod dispatcher;
pub mod runner;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use decision::{Decision, DecisionEngine, SuppressReason};
pub use dispatcher::{DispatchIntent, Dispatcher};
pub use runner::Pipeline;
pub use types::{ClaimOutcome, ClaimProgress, ClaimReport, ClaimState, RunControl, RunSummary};
