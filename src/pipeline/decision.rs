//! Decision engine: SEND or SUPPRESS from a claim's send history.
//!
//! Pure: the same policy, history and `now` always give the same answer,
//! so re-evaluating after a partial failure is safe.
//!
//! - No history → Send
//! - History at or above the cap → Suppress, timestamps not inspected
//! - Otherwise → Send once the most recent send is at least `cooldown` old
//!
//! A timestamp that is missing or not RFC 3339 below the cap is a
//! [`DataIntegrityError`], never a guess in either direction.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::ThrottlePolicy;
use crate::error::DataIntegrityError;
use crate::history::HistoryEntry;

/// Why a claim was not notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// The last notification is still inside the cooldown window.
    CooldownActive { remaining: Duration },
    /// The claim already received the maximum number of notifications.
    CapReached { sent: usize },
}

/// Outcome of evaluating one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Send,
    Suppress(SuppressReason),
}

impl Decision {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Suppress(SuppressReason::CooldownActive { .. }) => "suppress_cooldown",
            Self::Suppress(SuppressReason::CapReached { .. }) => "suppress_cap",
        }
    }
}

/// Applies a [`ThrottlePolicy`] to claim histories.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine {
    policy: ThrottlePolicy,
}

impl DecisionEngine {
    pub fn new(policy: ThrottlePolicy) -> Self {
        Self { policy }
    }

    /// Decide whether `claim_id` should be notified at `now`.
    pub fn decide(
        &self,
        claim_id: &str,
        history: &[HistoryEntry],
        now: DateTime<Utc>,
    ) -> Result<Decision, DataIntegrityError> {
        if history.is_empty() {
            return Ok(Decision::Send);
        }

        if history.len() >= self.policy.max_notifications {
            return Ok(Decision::Suppress(SuppressReason::CapReached {
                sent: history.len(),
            }));
        }

        let mut last_sent: Option<DateTime<Utc>> = None;
        for entry in history {
            let sent = parse_date_sent(claim_id, entry)?;
            last_sent = Some(last_sent.map_or(sent, |prev| prev.max(sent)));
        }
        let Some(last_sent) = last_sent else {
            return Ok(Decision::Send);
        };

        // Whole seconds on both sides; a future-dated entry stays inside the window.
        let elapsed_secs = now.signed_duration_since(last_sent).num_seconds();
        let cooldown_secs = i64::try_from(self.policy.cooldown.as_secs()).unwrap_or(i64::MAX);
        if elapsed_secs >= cooldown_secs {
            Ok(Decision::Send)
        } else {
            let remaining = cooldown_secs.saturating_sub(elapsed_secs);
            Ok(Decision::Suppress(SuppressReason::CooldownActive {
                remaining: Duration::from_secs(remaining.unsigned_abs()),
            }))
        }
    }
}

fn parse_date_sent(
    claim_id: &str,
    entry: &HistoryEntry,
) -> Result<DateTime<Utc>, DataIntegrityError> {
    let raw = entry
        .date_sent
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DataIntegrityError::MissingDateSent {
            claim_id: claim_id.to_string(),
        })?;

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DataIntegrityError::InvalidDateSent {
            claim_id: claim_id.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::history::format_date_sent;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn entry_at(at: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            claim_id: "c-1".into(),
            date_sent: Some(format_date_sent(at)),
        }
    }

    fn raw_entry(date_sent: Option<&str>) -> HistoryEntry {
        HistoryEntry {
            claim_id: "c-1".into(),
            date_sent: date_sent.map(String::from),
        }
    }

    fn engine() -> DecisionEngine {
        DecisionEngine::default()
    }

    #[test]
    fn empty_history_sends() {
        assert_eq!(engine().decide("c-1", &[], now()).unwrap(), Decision::Send);
    }

    #[test]
    fn single_recent_entry_suppresses() {
        let history = vec![entry_at(now() - chrono::Duration::days(2))];
        let decision = engine().decide("c-1", &history, now()).unwrap();
        match decision {
            Decision::Suppress(SuppressReason::CooldownActive { remaining }) => {
                assert_eq!(remaining, Duration::from_secs(5 * 86_400));
            }
            other => panic!("Expected cooldown suppression, got {:?}", other),
        }
    }

    #[test]
    fn single_old_entry_sends() {
        let history = vec![entry_at(now() - chrono::Duration::days(10))];
        assert_eq!(engine().decide("c-1", &history, now()).unwrap(), Decision::Send);
    }

    #[test]
    fn cooldown_boundary_is_inclusive() {
        let exactly = vec![entry_at(now() - chrono::Duration::hours(168))];
        assert_eq!(engine().decide("c-1", &exactly, now()).unwrap(), Decision::Send);

        let one_second_short =
            vec![entry_at(now() - chrono::Duration::hours(168) + chrono::Duration::seconds(1))];
        assert!(matches!(
            engine().decide("c-1", &one_second_short, now()).unwrap(),
            Decision::Suppress(SuppressReason::CooldownActive { .. })
        ));
    }

    #[test]
    fn sub_second_precision_is_ignored() {
        // 167h59m59.6s elapsed truncates to 167h59m59s → still cooling down.
        let history = vec![raw_entry(Some("2026-10-09T12:00:00.400Z"))];
        assert!(matches!(
            engine().decide("c-1", &history, now()).unwrap(),
            Decision::Suppress(SuppressReason::CooldownActive { .. })
        ));
    }

    #[test]
    fn offset_timestamps_are_normalised() {
        // 2026-10-09T14:00:00+02:00 is exactly 168h before now.
        let history = vec![raw_entry(Some("2026-10-09T14:00:00+02:00"))];
        assert_eq!(engine().decide("c-1", &history, now()).unwrap(), Decision::Send);
    }

    #[test]
    fn future_dated_entry_suppresses() {
        let history = vec![entry_at(now() + chrono::Duration::hours(1))];
        assert!(matches!(
            engine().decide("c-1", &history, now()).unwrap(),
            Decision::Suppress(SuppressReason::CooldownActive { .. })
        ));
    }

    #[test]
    fn two_entries_always_suppress() {
        let long_ago = now() - chrono::Duration::days(365);
        let history = vec![entry_at(long_ago), entry_at(long_ago)];
        assert_eq!(
            engine().decide("c-1", &history, now()).unwrap(),
            Decision::Suppress(SuppressReason::CapReached { sent: 2 })
        );
    }

    #[test]
    fn capped_claim_ignores_corrupt_timestamps() {
        let history = vec![raw_entry(None), raw_entry(Some("garbage")), raw_entry(None)];
        assert_eq!(
            engine().decide("c-1", &history, now()).unwrap(),
            Decision::Suppress(SuppressReason::CapReached { sent: 3 })
        );
    }

    #[test]
    fn missing_date_sent_is_integrity_error() {
        let err = engine()
            .decide("c-1", &[raw_entry(None)], now())
            .unwrap_err();
        assert!(matches!(err, DataIntegrityError::MissingDateSent { .. }));

        let err = engine()
            .decide("c-1", &[raw_entry(Some("  "))], now())
            .unwrap_err();
        assert!(matches!(err, DataIntegrityError::MissingDateSent { .. }));
    }

    #[test]
    fn unparseable_date_sent_is_integrity_error() {
        let err = engine()
            .decide("c-1", &[raw_entry(Some("last tuesday"))], now())
            .unwrap_err();
        match err {
            DataIntegrityError::InvalidDateSent { claim_id, value, .. } => {
                assert_eq!(claim_id, "c-1");
                assert_eq!(value, "last tuesday");
            }
            other => panic!("Expected InvalidDateSent, got {:?}", other),
        }
    }

    #[test]
    fn decide_is_repeatable() {
        let history = vec![entry_at(now() - chrono::Duration::days(3))];
        let first = engine().decide("c-1", &history, now()).unwrap();
        for _ in 0..5 {
            assert_eq!(engine().decide("c-1", &history, now()).unwrap(), first);
        }
    }

    #[test]
    fn larger_cap_uses_most_recent_send() {
        let engine = DecisionEngine::new(ThrottlePolicy {
            max_notifications: 3,
            cooldown: Duration::from_secs(24 * 3600),
        });
        let old = entry_at(now() - chrono::Duration::days(5));
        let recent = entry_at(now() - chrono::Duration::hours(2));

        assert!(matches!(
            engine.decide("c-1", &[old.clone(), recent.clone()], now()).unwrap(),
            Decision::Suppress(SuppressReason::CooldownActive { .. })
        ));
        assert_eq!(
            engine
                .decide("c-1", &[old.clone(), entry_at(now() - chrono::Duration::days(2))], now())
                .unwrap(),
            Decision::Send
        );
        assert_eq!(
            engine.decide("c-1", &[old.clone(), old, recent], now()).unwrap(),
            Decision::Suppress(SuppressReason::CapReached { sent: 3 })
        );
    }

    #[test]
    fn cooldown_beyond_signed_range_still_suppresses() {
        let engine = DecisionEngine::new(ThrottlePolicy {
            max_notifications: 2,
            cooldown: Duration::from_secs(u64::MAX),
        });
        let history = vec![entry_at(now())];
        assert!(matches!(
            engine.decide("c-1", &history, now()).unwrap(),
            Decision::Suppress(SuppressReason::CooldownActive { .. })
        ));

        let future = vec![entry_at(now() + chrono::Duration::days(1))];
        assert!(matches!(
            engine.decide("c-1", &future, now()).unwrap(),
            Decision::Suppress(SuppressReason::CooldownActive { remaining })
                if remaining == Duration::from_secs(i64::MAX as u64)
        ));
    }

    #[test]
    fn decision_labels() {
        assert_eq!(Decision::Send.label(), "send");
        assert_eq!(
            Decision::Suppress(SuppressReason::CapReached { sent: 2 }).label(),
            "suppress_cap"
        );
        assert_eq!(
            Decision::Suppress(SuppressReason::CooldownActive {
                remaining: Duration::from_secs(1)
            })
            .label(),
            "suppress_cooldown"
        );
    }
}
