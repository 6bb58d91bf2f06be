//! Database schema definitions.
//!
//! Table and constraint names shared by the PostgreSQL queries and the
//! migrations under `migrations/`.

/// Table names.
pub mod table {
    /// Registered users, keyed by `id`.
    pub const USERS: &str = "users";

    /// Points balances, one row per user, keyed by `user_id`.
    pub const USER_POINTS: &str = "user_points";

    /// Append-only transfer log, keyed by `id` (BIGSERIAL).
    pub const TRANSACTIONS: &str = "transactions";

    /// Referral links. `referee_id` is unique.
    pub const USER_REFERRALS: &str = "user_referrals";

    /// Transaction bonus candidates. (`referrer_id`, `referee_id`) is unique.
    pub const TRANSACTION_BONUSES: &str = "referred_user_transaction_bonuses";
}

/// Unique constraint names, used to classify constraint violations.
pub mod constraint {
    /// `users.referral_code`.
    pub const USERS_REFERRAL_CODE: &str = "users_referral_code_key";

    /// `user_referrals.referee_id`.
    pub const USER_REFERRALS_REFEREE: &str = "user_referrals_referee_id_key";

    /// `referred_user_transaction_bonuses (referrer_id, referee_id)`.
    pub const TRANSACTION_BONUSES_PAIR: &str =
        "referred_user_transaction_bonuses_referrer_id_referee_id_key";
}

/// Returns all table names in dependency order.
#[must_use]
pub fn all_tables() -> Vec<&'static str> {
    vec![
        table::USERS,
        table::USER_POINTS,
        table::TRANSACTIONS,
        table::USER_REFERRALS,
        table::TRANSACTION_BONUSES,
    ]
}
