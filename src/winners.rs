//! Winner assignment and prize distribution engines
//!
//! Three write paths mutate winner state, and only these three:
//!
//! - single-submission position assignment (with displacement and currency
//!   conversion),
//! - batch winner announcement (supersedes the whole prior winner set; no
//!   currency conversion — USD amounts are deliberately not computed on
//!   this path, see the bounty docs),
//! - winner reset (reverts APPROVED submissions to SUBMITTED).
//!
//! Each runs as one transaction in the store. Validation happens before
//! any write, so a rejected request never leaves partial state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ApiError;
use crate::exchange::{usable_rate, RateSource};
use crate::models::{Bounty, Submission, SubmissionStatus};
use crate::notify::{Notifier, WinnerNotice};
use crate::storage::{MarketStore, WinnerSlot};

/// Result of a position PATCH.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    pub submission: Submission,
    pub displaced: bool,
    pub message: String,
}

/// One requested winner in a batch announcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncedWinner {
    pub submission_id: String,
    pub position: u32,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceOutcome {
    pub bounty: Bounty,
    pub winners: Vec<Submission>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
    pub reset_count: usize,
    pub affected_submissions: Vec<String>,
}

// ============================================================================
// POSITION ASSIGNMENT
// ============================================================================

/// Assign a position to one submission (displacing any current holder of
/// that position), or clear it when `desired` is None. Amounts come from
/// the bounty's winnings table; the USD amount is computed from a freshly
/// fetched rate in the same operation.
pub async fn assign_position(
    store: &MarketStore,
    rates: &dyn RateSource,
    bounty: &Bounty,
    submission_id: &str,
    desired: Option<u32>,
) -> Result<PositionUpdate, ApiError> {
    let submission = store
        .get_submission(submission_id)?
        .filter(|s| s.bounty_id == bounty.id)
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    // SPAM/WITHDRAWN (or already-reviewed) submissions are not addressable
    // through this path. Existing winners in such states stay winners until
    // displaced, announced over, or reset.
    if submission.status != SubmissionStatus::Submitted {
        return Err(ApiError::NotFound(
            "Submission not found or not in SUBMITTED status".to_string(),
        ));
    }

    let position = match desired {
        None => {
            let submission = store.clear_position(submission_id)?;
            return Ok(PositionUpdate {
                submission,
                displaced: false,
                message: "Position cleared successfully".to_string(),
            });
        }
        Some(p) => p,
    };

    if position == 0 {
        return Err(ApiError::invalid_field(
            "Invalid winner position",
            "position",
            "must be greater than 0",
        ));
    }

    let amount = bounty.prize_for(position).ok_or_else(|| {
        ApiError::invalid_field(
            "Invalid winner position",
            "position",
            "must exist in the winnings table",
        )
    })?;
    if amount <= 0.0 {
        return Err(ApiError::invalid_field(
            "Invalid winning amount: must be greater than 0",
            "position",
            "winnings amount must be positive",
        ));
    }

    // No token means no conversion is possible; fail without touching the
    // gateway or the store.
    let token = bounty
        .token
        .as_deref()
        .ok_or_else(|| ApiError::ExchangeRate("bounty has no payout token".to_string()))?;

    let fetched = rates
        .get_exchange_rates(&[token.to_string()])
        .await
        .map_err(|e| ApiError::ExchangeRate(e.to_string()))?;
    let rate = usable_rate(&fetched, token).map_err(|e| ApiError::ExchangeRate(e.to_string()))?;
    let amount_usd = amount * rate;

    let (submission, displaced) =
        store.assign_position(&bounty.id, submission_id, position, amount, amount_usd)?;

    let message = if displaced {
        format!("Position {} reassigned successfully", position)
    } else {
        format!("Position {} assigned successfully", position)
    };

    Ok(PositionUpdate {
        submission,
        displaced,
        message,
    })
}

// ============================================================================
// BATCH ANNOUNCEMENT
// ============================================================================

/// Announce a full winner slate for a bounty: wipe the prior winner set,
/// apply the requested slots, and complete the bounty, in one transaction.
/// Only the shape of the request is validated here; checks against stored
/// state (bounty status, APPROVED membership, pool sum) run inside the
/// store's announcement transaction. Winner notifications are dispatched
/// after commit, best-effort.
pub async fn announce_winners(
    store: &MarketStore,
    notifier: &Arc<dyn Notifier>,
    bounty: &Bounty,
    winners: &[AnnouncedWinner],
) -> Result<AnnounceOutcome, ApiError> {
    if winners.is_empty() {
        return Err(ApiError::invalid_field(
            "At least one winner is required",
            "winners",
            "must be non-empty",
        ));
    }

    for w in winners {
        if w.position == 0 {
            return Err(ApiError::invalid_field(
                "Invalid winner position",
                "winners.position",
                "must be greater than 0",
            ));
        }
        if w.amount <= 0.0 {
            return Err(ApiError::invalid_field(
                "Invalid winning amount: must be greater than 0",
                "winners.amount",
                "must be greater than 0",
            ));
        }
    }

    // Duplicate positions or submissions within one slate would violate
    // position uniqueness.
    for (i, w) in winners.iter().enumerate() {
        for other in &winners[i + 1..] {
            if other.position == w.position {
                return Err(ApiError::invalid_field(
                    "Duplicate winner position in request",
                    "winners.position",
                    "must be unique",
                ));
            }
            if other.submission_id == w.submission_id {
                return Err(ApiError::invalid_field(
                    "Duplicate submission in request",
                    "winners.submissionId",
                    "must be unique",
                ));
            }
        }
    }

    let slots: Vec<WinnerSlot> = winners
        .iter()
        .map(|w| WinnerSlot {
            submission_id: w.submission_id.clone(),
            position: w.position,
            amount: w.amount,
        })
        .collect();

    let (bounty, winner_submissions) = store.apply_announcement(&bounty.id, &slots)?;

    dispatch_notifications(notifier, &bounty, &winner_submissions);

    Ok(AnnounceOutcome {
        bounty,
        winners: winner_submissions,
    })
}

/// Post-commit, fire-and-forget. Failures are logged and swallowed; the
/// announcement has already succeeded.
fn dispatch_notifications(notifier: &Arc<dyn Notifier>, bounty: &Bounty, winners: &[Submission]) {
    for winner in winners {
        let notifier = notifier.clone();
        let recipient = winner.user_id.clone();
        let notice = WinnerNotice {
            bounty_id: bounty.id.clone(),
            bounty_title: bounty.title.clone(),
            submission_id: winner.id.clone(),
            position: winner.position.unwrap_or(0),
            amount: winner.winning_amount.unwrap_or(0.0),
            token: bounty.token.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_winner(&recipient, &notice).await {
                warn!(
                    "Failed to deliver winner notification to {} for bounty {}: {}",
                    recipient, notice.bounty_id, e
                );
            }
        });
    }
}

// ============================================================================
// WINNER RESET
// ============================================================================

/// Revert every APPROVED submission of a bounty to an un-decided state.
/// The trigger condition is lifecycle status, not `is_winner`: approved
/// submissions that never received a position are reverted too.
pub fn reset_winners(store: &MarketStore, bounty_id: &str) -> Result<ResetOutcome, ApiError> {
    let affected = store.reset_approved(bounty_id)?;
    Ok(ResetOutcome {
        reset_count: affected.len(),
        affected_submissions: affected,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::models::{BountyStatus, Winnings};
    use crate::notify::NullNotifier;

    struct FixedRates(f64);

    #[async_trait]
    impl RateSource for FixedRates {
        async fn get_exchange_rates(&self, tokens: &[String]) -> Result<HashMap<String, f64>> {
            Ok(tokens.iter().map(|t| (t.clone(), self.0)).collect())
        }
    }

    struct FailingRates;

    #[async_trait]
    impl RateSource for FailingRates {
        async fn get_exchange_rates(&self, _tokens: &[String]) -> Result<HashMap<String, f64>> {
            anyhow::bail!("gateway timed out")
        }
    }

    struct CountingRates {
        calls: AtomicUsize,
        rate: f64,
    }

    impl CountingRates {
        fn new(rate: f64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                rate,
            }
        }
    }

    #[async_trait]
    impl RateSource for CountingRates {
        async fn get_exchange_rates(&self, tokens: &[String]) -> Result<HashMap<String, f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(tokens.iter().map(|t| (t.clone(), self.rate)).collect())
        }
    }

    fn winnings(entries: &[(&str, f64)]) -> Winnings {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn notifier() -> Arc<dyn Notifier> {
        Arc::new(NullNotifier)
    }

    /// Bounty with winnings {"1": 1000, "2": 500}, token DOT, plus two
    /// SUBMITTED submissions.
    fn setup() -> (MarketStore, Bounty, Submission, Submission) {
        let store = MarketStore::in_memory().unwrap();
        let org = store.create_organization("acme").unwrap();
        let w = winnings(&[("1", 1000.0), ("2", 500.0)]);
        let bounty = store
            .create_bounty(&org, "hard bug", Some("DOT"), None, Some(&w))
            .unwrap();
        let s1 = store.create_submission(&bounty.id, "alice").unwrap();
        let s2 = store.create_submission(&bounty.id, "bob").unwrap();
        (store, bounty, s1, s2)
    }

    // ------------------------------------------------------------------
    // position assignment
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_assign_computes_usd_from_winnings_and_rate() {
        let (store, bounty, s1, _) = setup();
        let rates = FixedRates(7.0);

        let update = assign_position(&store, &rates, &bounty, &s1.id, Some(1))
            .await
            .unwrap();

        assert!(!update.displaced);
        assert_eq!(update.message, "Position 1 assigned successfully");
        assert_eq!(update.submission.position, Some(1));
        assert_eq!(update.submission.winning_amount, Some(1000.0));
        assert_eq!(update.submission.winning_amount_usd, Some(7000.0));
        assert!(update.submission.is_winner);
        assert_eq!(update.submission.status, SubmissionStatus::Submitted);
    }

    #[tokio::test]
    async fn test_reassign_displaces_previous_holder() {
        let (store, bounty, s1, s2) = setup();
        let rates = FixedRates(7.0);

        assign_position(&store, &rates, &bounty, &s1.id, Some(1))
            .await
            .unwrap();
        let update = assign_position(&store, &rates, &bounty, &s2.id, Some(1))
            .await
            .unwrap();

        assert!(update.displaced);
        assert_eq!(update.message, "Position 1 reassigned successfully");
        assert_eq!(update.submission.position, Some(1));
        assert_eq!(update.submission.winning_amount, Some(1000.0));
        assert_eq!(update.submission.winning_amount_usd, Some(7000.0));

        let s1 = store.get_submission(&s1.id).unwrap().unwrap();
        assert_eq!(s1.position, None);
        assert_eq!(s1.winning_amount, None);
        assert_eq!(s1.winning_amount_usd, None);
        assert!(!s1.is_winner);
    }

    #[tokio::test]
    async fn test_assign_same_position_twice_is_idempotent() {
        let (store, bounty, s1, _) = setup();
        let rates = FixedRates(7.0);

        let first = assign_position(&store, &rates, &bounty, &s1.id, Some(1))
            .await
            .unwrap();
        let second = assign_position(&store, &rates, &bounty, &s1.id, Some(1))
            .await
            .unwrap();

        assert!(!second.displaced);
        assert_eq!(
            first.submission.winning_amount_usd,
            second.submission.winning_amount_usd
        );
        assert_eq!(second.submission.position, Some(1));
    }

    #[tokio::test]
    async fn test_clear_position_round_trip() {
        let (store, bounty, s1, _) = setup();
        let rates = FixedRates(7.0);

        assign_position(&store, &rates, &bounty, &s1.id, Some(1))
            .await
            .unwrap();
        let update = assign_position(&store, &rates, &bounty, &s1.id, None)
            .await
            .unwrap();

        assert_eq!(update.message, "Position cleared successfully");
        assert_eq!(update.submission.position, None);
        assert_eq!(update.submission.winning_amount, None);
        assert_eq!(update.submission.winning_amount_usd, None);
        assert!(!update.submission.is_winner);
        assert_eq!(update.submission.status, SubmissionStatus::Submitted);
    }

    #[tokio::test]
    async fn test_unknown_position_rejected_without_mutation() {
        let (store, bounty, s1, _) = setup();
        let rates = FixedRates(7.0);

        let err = assign_position(&store, &rates, &bounty, &s1.id, Some(99))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput { .. }));
        assert_eq!(err.to_string(), "Invalid winner position");

        let s1 = store.get_submission(&s1.id).unwrap().unwrap();
        assert_eq!(s1.position, None);
        assert!(!s1.is_winner);
    }

    #[tokio::test]
    async fn test_zero_prize_amount_rejected() {
        let store = MarketStore::in_memory().unwrap();
        let org = store.create_organization("acme").unwrap();
        let w = winnings(&[("1", 0.0)]);
        let bounty = store
            .create_bounty(&org, "b", Some("DOT"), None, Some(&w))
            .unwrap();
        let s1 = store.create_submission(&bounty.id, "alice").unwrap();
        let rates = FixedRates(7.0);

        let err = assign_position(&store, &rates, &bounty, &s1.id, Some(1))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid winning amount: must be greater than 0"
        );
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_calling_gateway() {
        let store = MarketStore::in_memory().unwrap();
        let org = store.create_organization("acme").unwrap();
        let w = winnings(&[("1", 1000.0)]);
        let bounty = store
            .create_bounty(&org, "b", None, None, Some(&w))
            .unwrap();
        let s1 = store.create_submission(&bounty.id, "alice").unwrap();
        let rates = CountingRates::new(7.0);

        let err = assign_position(&store, &rates, &bounty, &s1.id, Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ExchangeRate(_)));
        assert!(err.to_string().contains("Failed to fetch exchange rate"));
        assert_eq!(rates.calls.load(Ordering::SeqCst), 0);

        let s1 = store.get_submission(&s1.id).unwrap().unwrap();
        assert_eq!(s1.position, None);
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_current_holder_untouched() {
        let (store, bounty, s1, s2) = setup();

        assign_position(&store, &FixedRates(7.0), &bounty, &s1.id, Some(1))
            .await
            .unwrap();

        let err = assign_position(&store, &FailingRates, &bounty, &s2.id, Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ExchangeRate(_)));

        // The displacement must not have happened.
        let s1 = store.get_submission(&s1.id).unwrap().unwrap();
        assert_eq!(s1.position, Some(1));
        assert_eq!(s1.winning_amount, Some(1000.0));
        assert!(s1.is_winner);
        let s2 = store.get_submission(&s2.id).unwrap().unwrap();
        assert_eq!(s2.position, None);
    }

    #[tokio::test]
    async fn test_non_positive_rate_rejected() {
        let (store, bounty, s1, _) = setup();

        let err = assign_position(&store, &FixedRates(0.0), &bounty, &s1.id, Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ExchangeRate(_)));

        let s1 = store.get_submission(&s1.id).unwrap().unwrap();
        assert_eq!(s1.position, None);
    }

    #[tokio::test]
    async fn test_spam_submission_not_addressable() {
        let (store, bounty, s1, _) = setup();
        store
            .set_submission_status(&s1.id, SubmissionStatus::Spam)
            .unwrap();

        let err = assign_position(&store, &FixedRates(7.0), &bounty, &s1.id, Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    // ------------------------------------------------------------------
    // batch announcement
    // ------------------------------------------------------------------

    fn approved(store: &MarketStore, bounty_id: &str, user: &str) -> Submission {
        let s = store.create_submission(bounty_id, user).unwrap();
        store
            .set_submission_status(&s.id, SubmissionStatus::Approved)
            .unwrap();
        store.get_submission(&s.id).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_announce_replaces_prior_winner_set() {
        let (store, bounty, s1, s2) = setup();
        let rates = FixedRates(7.0);

        // Two prior winners via the single-assign path.
        assign_position(&store, &rates, &bounty, &s1.id, Some(1))
            .await
            .unwrap();
        assign_position(&store, &rates, &bounty, &s2.id, Some(2))
            .await
            .unwrap();

        let a1 = approved(&store, &bounty.id, "carol");
        let a2 = approved(&store, &bounty.id, "dave");

        let outcome = announce_winners(
            &store,
            &notifier(),
            &bounty,
            &[
                AnnouncedWinner {
                    submission_id: a1.id.clone(),
                    position: 1,
                    amount: 1000.0,
                },
                AnnouncedWinner {
                    submission_id: a2.id.clone(),
                    position: 2,
                    amount: 500.0,
                },
            ],
        )
        .await
        .unwrap();

        assert_eq!(outcome.bounty.status, BountyStatus::Completed);
        assert!(outcome.bounty.winners_announced_at.is_some());
        assert_eq!(outcome.winners.len(), 2);

        let s1 = store.get_submission(&s1.id).unwrap().unwrap();
        let s2 = store.get_submission(&s2.id).unwrap().unwrap();
        assert!(!s1.is_winner);
        assert_eq!(s1.position, None);
        assert!(!s2.is_winner);
        assert_eq!(s2.position, None);

        let a1 = store.get_submission(&a1.id).unwrap().unwrap();
        assert!(a1.is_winner);
        assert_eq!(a1.position, Some(1));
        assert_eq!(a1.winning_amount, Some(1000.0));
        // The batch path does not compute USD amounts.
        assert_eq!(a1.winning_amount_usd, None);
        assert_eq!(a1.status, SubmissionStatus::Approved);
        assert!(a1.reviewed_at.is_some());
    }

    #[tokio::test]
    async fn test_announce_sum_mismatch_rejected_without_mutation() {
        let (store, bounty, _, _) = setup();
        let a1 = approved(&store, &bounty.id, "carol");

        let err = announce_winners(
            &store,
            &notifier(),
            &bounty,
            &[AnnouncedWinner {
                submission_id: a1.id.clone(),
                position: 1,
                amount: 900.0, // pool is 1500
            }],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput { .. }));

        let bounty = store.get_bounty(&bounty.id).unwrap().unwrap();
        assert_eq!(bounty.status, BountyStatus::Open);
        let a1 = store.get_submission(&a1.id).unwrap().unwrap();
        assert!(!a1.is_winner);
    }

    #[tokio::test]
    async fn test_announce_sum_within_epsilon_accepted() {
        let (store, bounty, _, _) = setup();
        let a1 = approved(&store, &bounty.id, "carol");
        let a2 = approved(&store, &bounty.id, "dave");

        let outcome = announce_winners(
            &store,
            &notifier(),
            &bounty,
            &[
                AnnouncedWinner {
                    submission_id: a1.id,
                    position: 1,
                    amount: 1000.004,
                },
                AnnouncedWinner {
                    submission_id: a2.id,
                    position: 2,
                    amount: 500.0,
                },
            ],
        )
        .await
        .unwrap();
        assert_eq!(outcome.bounty.status, BountyStatus::Completed);
    }

    #[tokio::test]
    async fn test_announce_rejected_for_completed_bounty() {
        let (store, bounty, _, _) = setup();
        store
            .set_bounty_status(&bounty.id, BountyStatus::Completed)
            .unwrap();
        let bounty = store.get_bounty(&bounty.id).unwrap().unwrap();
        let a1 = approved(&store, &bounty.id, "carol");

        let err = announce_winners(
            &store,
            &notifier(),
            &bounty,
            &[AnnouncedWinner {
                submission_id: a1.id,
                position: 1,
                amount: 1500.0,
            }],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_announce_checks_current_state_not_callers_snapshot() {
        let (store, bounty, _, _) = setup();
        let a1 = approved(&store, &bounty.id, "carol");

        // The bounty moves on after the caller read it.
        store
            .set_bounty_status(&bounty.id, BountyStatus::Completed)
            .unwrap();

        let err = announce_winners(
            &store,
            &notifier(),
            &bounty, // stale snapshot still says OPEN
            &[AnnouncedWinner {
                submission_id: a1.id.clone(),
                position: 1,
                amount: 1500.0,
            }],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput { .. }));

        let a1 = store.get_submission(&a1.id).unwrap().unwrap();
        assert!(!a1.is_winner);
    }

    #[tokio::test]
    async fn test_announce_rejects_non_approved_submission() {
        let (store, bounty, s1, _) = setup();

        let err = announce_winners(
            &store,
            &notifier(),
            &bounty,
            &[AnnouncedWinner {
                submission_id: s1.id,
                position: 1,
                amount: 1500.0,
            }],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_announce_rejects_duplicate_positions() {
        let (store, bounty, _, _) = setup();
        let a1 = approved(&store, &bounty.id, "carol");
        let a2 = approved(&store, &bounty.id, "dave");

        let err = announce_winners(
            &store,
            &notifier(),
            &bounty,
            &[
                AnnouncedWinner {
                    submission_id: a1.id,
                    position: 1,
                    amount: 1000.0,
                },
                AnnouncedWinner {
                    submission_id: a2.id,
                    position: 1,
                    amount: 500.0,
                },
            ],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_announce_rejects_empty_slate() {
        let (store, bounty, _, _) = setup();
        let err = announce_winners(&store, &notifier(), &bounty, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_announce_uses_bounty_amount_when_no_winnings_table() {
        let store = MarketStore::in_memory().unwrap();
        let org = store.create_organization("acme").unwrap();
        let bounty = store
            .create_bounty(&org, "b", Some("DOT"), Some(800.0), None)
            .unwrap();
        let a1 = approved(&store, &bounty.id, "carol");

        let outcome = announce_winners(
            &store,
            &notifier(),
            &bounty,
            &[AnnouncedWinner {
                submission_id: a1.id,
                position: 1,
                amount: 800.0,
            }],
        )
        .await
        .unwrap();
        assert_eq!(outcome.bounty.status, BountyStatus::Completed);
    }

    // ------------------------------------------------------------------
    // winner reset
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_reset_reverts_announced_winners() {
        let (store, bounty, _, _) = setup();
        let a1 = approved(&store, &bounty.id, "carol");
        let a2 = approved(&store, &bounty.id, "dave");

        announce_winners(
            &store,
            &notifier(),
            &bounty,
            &[
                AnnouncedWinner {
                    submission_id: a1.id.clone(),
                    position: 1,
                    amount: 1000.0,
                },
                AnnouncedWinner {
                    submission_id: a2.id.clone(),
                    position: 2,
                    amount: 500.0,
                },
            ],
        )
        .await
        .unwrap();

        let outcome = reset_winners(&store, &bounty.id).unwrap();
        assert_eq!(outcome.reset_count, 2);
        assert_eq!(outcome.affected_submissions.len(), 2);

        let a1 = store.get_submission(&a1.id).unwrap().unwrap();
        assert_eq!(a1.status, SubmissionStatus::Submitted);
        assert_eq!(a1.position, None);
        assert_eq!(a1.winning_amount, None);
        assert!(!a1.is_winner);
    }

    #[tokio::test]
    async fn test_reset_also_reverts_approved_non_winners() {
        let (store, bounty, _, _) = setup();
        // Approved but never given a position.
        let a1 = approved(&store, &bounty.id, "carol");

        let outcome = reset_winners(&store, &bounty.id).unwrap();
        assert_eq!(outcome.reset_count, 1);
        assert_eq!(outcome.affected_submissions, vec![a1.id.clone()]);

        let a1 = store.get_submission(&a1.id).unwrap().unwrap();
        assert_eq!(a1.status, SubmissionStatus::Submitted);
    }

    #[tokio::test]
    async fn test_reset_with_nothing_approved_is_a_noop() {
        let (store, bounty, s1, _) = setup();

        let outcome = reset_winners(&store, &bounty.id).unwrap();
        assert_eq!(outcome.reset_count, 0);
        assert!(outcome.affected_submissions.is_empty());

        let s1 = store.get_submission(&s1.id).unwrap().unwrap();
        assert_eq!(s1.status, SubmissionStatus::Submitted);
        assert!(s1.reviewed_at.is_none());
    }
}
