//! Core types and rules for the points ledger.
//!
//! This crate provides the foundational types used throughout the ledger:
//!
//! - **Identifiers**: `UserId`, `ReferralId`, `BonusId`, `TransactionId`
//! - **Accounts**: `User`, `Account`
//! - **Transfers**: `Transaction`
//! - **Referrals**: `ReferralLink`, `TransactionBonus`, referral code generation
//! - **Rules**: `BonusRules`
//!
//! # Points
//!
//! Points are whole numbers stored as `i64`. A committed transfer never leaves
//! an account with a negative balance.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod ids;
pub mod referral;
pub mod rules;
pub mod transaction;

pub use account::{Account, User};
pub use ids::{BonusId, IdError, ReferralId, TransactionId, UserId};
pub use referral::{
    generate_referral_code, ReferralLink, TransactionBonus, REFERRAL_CODE_ALPHABET,
    REFERRAL_CODE_LEN,
};
pub use rules::{
    BonusRules, REFERRAL_BATCH_SIZE, REFERRAL_BONUS_POINTS, SPEND_THRESHOLD_POINTS,
    TRANSACTION_BONUS_BATCH_SIZE, TRANSACTION_BONUS_POINTS,
};
pub use transaction::Transaction;
