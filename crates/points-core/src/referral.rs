//! Referral types.
//!
//! A [`ReferralLink`] is written when a user registers with someone's referral
//! code. A [`TransactionBonus`] is written when a referred user's lifetime
//! transferred points cross the spend threshold. Both are paid out to the
//! referrer in batches, see [`crate::rules`].

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{BonusId, ReferralId, UserId};

/// Length of generated referral codes.
pub const REFERRAL_CODE_LEN: usize = 6;

/// Characters referral codes are drawn from.
pub const REFERRAL_CODE_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyz-ABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";

/// "`referee_id` was invited by `referrer_id`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralLink {
    /// Link ID.
    pub id: ReferralId,

    /// The user whose referral code was used.
    pub referrer_id: UserId,

    /// The user who registered with the code.
    pub referee_id: UserId,

    /// Whether this link has been counted in a paid referral batch.
    pub paid_out: bool,

    /// When the link was created.
    pub created_at: DateTime<Utc>,

    /// When the link was last updated.
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ReferralLink {
    /// Create an unpaid link.
    #[must_use]
    pub fn new(referrer_id: UserId, referee_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: ReferralId::generate(),
            referrer_id,
            referee_id,
            paid_out: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// "`referee_id` crossed the spend threshold while referred by `referrer_id`."
///
/// At most one record exists per (`referrer_id`, `referee_id`) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBonus {
    /// Record ID.
    pub id: BonusId,

    /// The referrer to be rewarded.
    pub referrer_id: UserId,

    /// The referred user who crossed the threshold.
    pub referee_id: UserId,

    /// Whether this record has been counted in a paid batch.
    pub paid_out: bool,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl TransactionBonus {
    /// Create an unpaid bonus candidate.
    #[must_use]
    pub fn new(referrer_id: UserId, referee_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: BonusId::generate(),
            referrer_id,
            referee_id,
            paid_out: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Generate a random referral code of [`REFERRAL_CODE_LEN`] characters.
#[must_use]
pub fn generate_referral_code() -> String {
    let mut rng = OsRng;
    (0..REFERRAL_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..REFERRAL_CODE_ALPHABET.len());
            char::from(REFERRAL_CODE_ALPHABET[idx])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_code_shape() {
        let code = generate_referral_code();
        assert_eq!(code.len(), REFERRAL_CODE_LEN);
        assert!(code.bytes().all(|b| REFERRAL_CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn referral_codes_vary() {
        let codes: std::collections::HashSet<_> =
            (0..32).map(|_| generate_referral_code()).collect();
        assert!(codes.len() > 1);
    }

    #[test]
    fn new_records_start_unpaid() {
        let referrer = UserId::generate();
        let referee = UserId::generate();

        let link = ReferralLink::new(referrer, referee);
        assert!(!link.paid_out);
        assert_eq!(link.referrer_id, referrer);

        let bonus = TransactionBonus::new(referrer, referee);
        assert!(!bonus.paid_out);
        assert_eq!(bonus.referee_id, referee);
    }
}
