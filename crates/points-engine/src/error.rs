//! Ledger error taxonomy.

use std::time::Duration;

use points_store::StoreError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Broad classes of ledger failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The command was malformed; no transaction was opened.
    Validation,
    /// A business rule refused the command.
    Business,
    /// The command collided with existing state.
    Conflict,
    /// Infrastructure failure. Details are not shown to callers.
    System,
}

/// Errors returned by the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A required field was empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Point amounts must be positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Sender and recipient are the same user.
    #[error("cannot transfer points to yourself")]
    SelfTransfer,

    /// The sender cannot cover the transfer.
    #[error("insufficient funds: balance={balance}, required={required}")]
    InsufficientFunds {
        /// Current balance.
        balance: i64,
        /// Requested amount.
        required: i64,
    },

    /// No active account for the user.
    #[error("account not found: {user_id}")]
    AccountNotFound {
        /// The user that was looked up.
        user_id: String,
    },

    /// No user holds the referral code.
    #[error("referral code not found: {0}")]
    ReferralCodeNotFound(String),

    /// The user already has an account.
    #[error("account already exists: {0}")]
    DuplicateAccount(String),

    /// The referee already has a referrer.
    #[error("user already referred: {0}")]
    DuplicateReferral(String),

    /// Every generated referral code was already taken.
    #[error("no free referral code after {attempts} attempts")]
    ReferralCodesExhausted {
        /// Codes tried.
        attempts: usize,
    },

    /// The store failed.
    #[error("storage error: {0}")]
    Storage(StoreError),

    /// The unit of work did not finish in time and was rolled back.
    #[error("transaction timed out after {0:?}")]
    Timeout(Duration),
}

impl LedgerError {
    /// The class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_) | Self::InvalidAmount(_) | Self::SelfTransfer => {
                ErrorKind::Validation
            }
            Self::InsufficientFunds { .. }
            | Self::AccountNotFound { .. }
            | Self::ReferralCodeNotFound(_) => ErrorKind::Business,
            Self::DuplicateAccount(_) | Self::DuplicateReferral(_) => ErrorKind::Conflict,
            Self::ReferralCodesExhausted { .. } | Self::Storage(_) | Self::Timeout(_) => {
                ErrorKind::System
            }
        }
    }

    /// Whether running the same command again may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ReferralCodesExhausted { .. })
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => Self::AccountNotFound { user_id: id },
            StoreError::InvalidAmount(amount) => Self::InvalidAmount(amount),
            StoreError::DuplicateAccount { user_id } => Self::DuplicateAccount(user_id.to_string()),
            StoreError::DuplicateReferral { referee_id } => {
                Self::DuplicateReferral(referee_id.to_string())
            }
            other => Self::Storage(other),
        }
    }
}
