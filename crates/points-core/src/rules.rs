//! Bonus rule decisions.
//!
//! The loyalty program has two rules, both paying the referrer in batches:
//!
//! - **Referral signup**: once a referrer has exactly [`REFERRAL_BATCH_SIZE`]
//!   unpaid referral links, they receive [`REFERRAL_BONUS_POINTS`] and the
//!   links are marked paid.
//! - **Spend threshold**: a referred user whose lifetime transferred points
//!   go from at most [`SPEND_THRESHOLD_POINTS`] to above it becomes a bonus
//!   candidate for their referrer. Once exactly [`TRANSACTION_BONUS_BATCH_SIZE`]
//!   candidates are unpaid, the referrer receives [`TRANSACTION_BONUS_POINTS`]
//!   and those candidates are marked paid.
//!
//! The functions here only decide. Reading counts and writing payouts happens
//! inside the caller's unit of work.

use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Unpaid referral links needed for a signup payout.
pub const REFERRAL_BATCH_SIZE: i64 = 3;

/// Points credited to the referrer per paid referral batch.
pub const REFERRAL_BONUS_POINTS: i64 = 50;

/// Lifetime transferred points a referee must exceed.
pub const SPEND_THRESHOLD_POINTS: i64 = 200;

/// Unpaid transaction-bonus candidates needed for a payout.
pub const TRANSACTION_BONUS_BATCH_SIZE: usize = 3;

/// Points credited to the referrer per paid transaction-bonus batch.
pub const TRANSACTION_BONUS_POINTS: i64 = 50;

/// Thresholds and payouts for both bonus rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusRules {
    /// See [`REFERRAL_BATCH_SIZE`].
    pub referral_batch_size: i64,

    /// See [`REFERRAL_BONUS_POINTS`].
    pub referral_bonus_points: i64,

    /// See [`SPEND_THRESHOLD_POINTS`].
    pub spend_threshold_points: i64,

    /// See [`TRANSACTION_BONUS_BATCH_SIZE`].
    pub transaction_bonus_batch_size: usize,

    /// See [`TRANSACTION_BONUS_POINTS`].
    pub transaction_bonus_points: i64,
}

impl Default for BonusRules {
    fn default() -> Self {
        Self {
            referral_batch_size: REFERRAL_BATCH_SIZE,
            referral_bonus_points: REFERRAL_BONUS_POINTS,
            spend_threshold_points: SPEND_THRESHOLD_POINTS,
            transaction_bonus_batch_size: TRANSACTION_BONUS_BATCH_SIZE,
            transaction_bonus_points: TRANSACTION_BONUS_POINTS,
        }
    }
}

impl BonusRules {
    /// Whether `unpaid` referral links complete a batch.
    ///
    /// This is an exact comparison: a count that skips past the batch size
    /// does not pay.
    #[must_use]
    pub const fn referral_batch_complete(&self, unpaid: i64) -> bool {
        unpaid == self.referral_batch_size
    }

    /// Whether a transfer of `amount` moves a sender with lifetime total
    /// `prior_total` across the spend threshold.
    #[must_use]
    pub const fn crosses_spend_threshold(&self, prior_total: i64, amount: i64) -> bool {
        prior_total <= self.spend_threshold_points
            && prior_total.saturating_add(amount) > self.spend_threshold_points
    }

    /// Whether `unpaid` transaction-bonus candidates complete a batch.
    #[must_use]
    pub const fn transaction_bonus_batch_complete(&self, unpaid: usize) -> bool {
        unpaid == self.transaction_bonus_batch_size
    }
}
