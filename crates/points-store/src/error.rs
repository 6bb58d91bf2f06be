//! Error types for ledger storage.

use points_core::UserId;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found (or soft-deleted).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record.
        entity: &'static str,
        /// The key that was looked up.
        id: String,
    },

    /// The user already has a points account.
    #[error("account already exists: {user_id}")]
    DuplicateAccount {
        /// The user ID.
        user_id: UserId,
    },

    /// The referee already has a referrer.
    #[error("referral already exists for referee: {referee_id}")]
    DuplicateReferral {
        /// The referee ID.
        referee_id: UserId,
    },

    /// A transaction bonus for the pair already exists.
    #[error("transaction bonus already recorded: referrer={referrer_id}, referee={referee_id}")]
    DuplicateBonus {
        /// The referrer ID.
        referrer_id: UserId,
        /// The referee ID.
        referee_id: UserId,
    },

    /// Credit and debit amounts must be positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Another user already holds the referral code.
    #[error("referral code already in use: {code}")]
    DuplicateReferralCode {
        /// The code.
        code: String,
    },
}

impl StoreError {
    /// Shorthand for a missing account.
    #[must_use]
    pub fn account_not_found(user_id: &UserId) -> Self {
        Self::NotFound {
            entity: "account",
            id: user_id.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(err.to_string())
    }
}
