//! Bonus rule actions.
//!
//! Each action runs inside the caller's unit of work. It reads the counts a
//! rule needs, asks [`BonusRules`] for the decision, and writes the payout.
//! Before counting, the referrer's balance is read so that the PostgreSQL
//! store holds the referrer's account row lock; two units of work paying the
//! same referrer cannot interleave their count and payout.

use serde::Serialize;
use tracing::{debug, info};

use points_core::{BonusId, BonusRules, UserId};
use points_store::{StoreError, UnitOfWork};

use crate::error::Result;

/// What a bonus rule did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BonusOutcome {
    /// The rule's trigger condition did not hold.
    NotTriggered,
    /// The rule recorded progress but the batch is not complete.
    Pending {
        /// Unpaid records for the referrer after this call.
        unpaid: i64,
    },
    /// The referrer was paid.
    Paid {
        /// The user credited.
        referrer: UserId,
        /// Points credited.
        points: i64,
    },
}

impl BonusOutcome {
    /// Whether points were credited.
    #[must_use]
    pub const fn is_paid(&self) -> bool {
        matches!(self, Self::Paid { .. })
    }
}

/// Pay the referral signup bonus if `referrer_id` now has a full batch of
/// unpaid referral links.
///
/// The new link must already be recorded in `uow`.
///
/// # Errors
///
/// Returns an error if a store operation fails.
pub async fn apply_referral_signup_bonus<U: UnitOfWork>(
    uow: &mut U,
    rules: &BonusRules,
    referrer_id: &UserId,
) -> Result<BonusOutcome> {
    uow.get_balance(referrer_id).await?;

    let unpaid = uow.count_unpaid_referrals(referrer_id).await?;
    if !rules.referral_batch_complete(unpaid) {
        debug!(referrer_id = %referrer_id, unpaid, "Referral batch incomplete");
        return Ok(BonusOutcome::Pending { unpaid });
    }

    uow.credit(referrer_id, rules.referral_bonus_points).await?;
    let paid = uow.mark_referrals_paid(referrer_id).await?;

    info!(
        referrer_id = %referrer_id,
        links = paid,
        points = rules.referral_bonus_points,
        "Referral signup bonus paid"
    );

    Ok(BonusOutcome::Paid {
        referrer: *referrer_id,
        points: rules.referral_bonus_points,
    })
}

/// Evaluate the spend threshold rule for a transfer that has just been
/// written.
///
/// `prior_total` is the sender's lifetime transferred points before this
/// transfer. A sender without a referrer is not an error.
///
/// # Errors
///
/// Returns an error if a store operation fails. A duplicate bonus record is
/// not an error.
pub async fn apply_spend_threshold_bonus<U: UnitOfWork>(
    uow: &mut U,
    rules: &BonusRules,
    sender_id: &UserId,
    prior_total: i64,
    points: i64,
) -> Result<BonusOutcome> {
    if !rules.crosses_spend_threshold(prior_total, points) {
        return Ok(BonusOutcome::NotTriggered);
    }

    let Some(referrer_id) = uow.find_referrer_of(sender_id).await? else {
        debug!(sender_id = %sender_id, "Spend threshold crossed without referrer");
        return Ok(BonusOutcome::NotTriggered);
    };

    uow.get_balance(&referrer_id).await?;

    match uow.record_transaction_bonus(&referrer_id, sender_id).await {
        Ok(_) => {}
        Err(StoreError::DuplicateBonus { .. }) => {
            debug!(
                referrer_id = %referrer_id,
                referee_id = %sender_id,
                "Transaction bonus already recorded"
            );
        }
        Err(err) => return Err(err.into()),
    }

    let unpaid = uow
        .list_unpaid_transaction_bonuses(&referrer_id, rules.transaction_bonus_batch_size)
        .await?;
    if !rules.transaction_bonus_batch_complete(unpaid.len()) {
        let unpaid = i64::try_from(unpaid.len()).unwrap_or(i64::MAX);
        debug!(referrer_id = %referrer_id, unpaid, "Transaction bonus batch incomplete");
        return Ok(BonusOutcome::Pending { unpaid });
    }

    let ids: Vec<BonusId> = unpaid.iter().map(|bonus| bonus.id).collect();
    uow.pay_transaction_bonuses(&ids).await?;
    uow.credit(&referrer_id, rules.transaction_bonus_points).await?;

    info!(
        referrer_id = %referrer_id,
        records = ids.len(),
        points = rules.transaction_bonus_points,
        "Transaction bonus paid"
    );

    Ok(BonusOutcome::Paid {
        referrer: referrer_id,
        points: rules.transaction_bonus_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use points_core::{generate_referral_code, User};
    use points_store::{AccountStore, MemoryStore, ReferralStore, Store, TransactionLog};

    async fn user(uow: &mut impl UnitOfWork) -> UserId {
        let user = User::new("Test", "test@example.com", generate_referral_code());
        uow.create_user(&user).await.unwrap();
        uow.create_account(&user.id).await.unwrap();
        user.id
    }

    #[tokio::test]
    async fn referral_bonus_pays_on_third_link_only() {
        let store = MemoryStore::new();
        let rules = BonusRules::default();
        let mut uow = store.begin().await.unwrap();
        let referrer = user(&mut uow).await;

        let mut outcomes = Vec::new();
        for _ in 0..4 {
            let referee = user(&mut uow).await;
            uow.link_referral(&referrer, &referee).await.unwrap();
            outcomes.push(
                apply_referral_signup_bonus(&mut uow, &rules, &referrer)
                    .await
                    .unwrap(),
            );
        }

        assert_eq!(outcomes[0], BonusOutcome::Pending { unpaid: 1 });
        assert_eq!(outcomes[1], BonusOutcome::Pending { unpaid: 2 });
        assert_eq!(
            outcomes[2],
            BonusOutcome::Paid {
                referrer,
                points: 50
            }
        );
        assert_eq!(outcomes[3], BonusOutcome::Pending { unpaid: 1 });
        assert_eq!(uow.get_balance(&referrer).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn spend_bonus_ignores_transfers_below_threshold() {
        let store = MemoryStore::new();
        let rules = BonusRules::default();
        let mut uow = store.begin().await.unwrap();
        let sender = user(&mut uow).await;

        let outcome = apply_spend_threshold_bonus(&mut uow, &rules, &sender, 0, 200)
            .await
            .unwrap();
        assert_eq!(outcome, BonusOutcome::NotTriggered);

        let outcome = apply_spend_threshold_bonus(&mut uow, &rules, &sender, 201, 10)
            .await
            .unwrap();
        assert_eq!(outcome, BonusOutcome::NotTriggered);
    }

    #[tokio::test]
    async fn spend_bonus_without_referrer_is_not_triggered() {
        let store = MemoryStore::new();
        let rules = BonusRules::default();
        let mut uow = store.begin().await.unwrap();
        let sender = user(&mut uow).await;

        let outcome = apply_spend_threshold_bonus(&mut uow, &rules, &sender, 0, 210)
            .await
            .unwrap();
        assert_eq!(outcome, BonusOutcome::NotTriggered);
        assert_eq!(uow.sum_sent(&sender).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn spend_bonus_absorbs_duplicate_candidates() {
        let store = MemoryStore::new();
        let rules = BonusRules::default();
        let mut uow = store.begin().await.unwrap();
        let referrer = user(&mut uow).await;
        let referee = user(&mut uow).await;
        uow.link_referral(&referrer, &referee).await.unwrap();

        for _ in 0..2 {
            let outcome = apply_spend_threshold_bonus(&mut uow, &rules, &referee, 0, 210)
                .await
                .unwrap();
            assert_eq!(outcome, BonusOutcome::Pending { unpaid: 1 });
        }
        assert_eq!(uow.get_balance(&referrer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn spend_bonus_pays_on_third_referee() {
        let store = MemoryStore::new();
        let rules = BonusRules::default();
        let mut uow = store.begin().await.unwrap();
        let referrer = user(&mut uow).await;

        let mut last = BonusOutcome::NotTriggered;
        for _ in 0..3 {
            let referee = user(&mut uow).await;
            uow.link_referral(&referrer, &referee).await.unwrap();
            last = apply_spend_threshold_bonus(&mut uow, &rules, &referee, 150, 60)
                .await
                .unwrap();
        }

        assert!(last.is_paid());
        assert_eq!(uow.get_balance(&referrer).await.unwrap(), 50);
        assert!(uow
            .list_unpaid_transaction_bonuses(&referrer, 3)
            .await
            .unwrap()
            .is_empty());
    }
}
