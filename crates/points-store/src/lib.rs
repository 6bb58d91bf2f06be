//! Storage layer for the points ledger.
//!
//! This crate provides persistent storage for users, points accounts, the
//! transfer log and referral records, behind a set of traits so the ledger can
//! run against PostgreSQL in production and an in-memory store in tests.
//!
//! # Units of work
//!
//! Every operation is a method on a unit of work obtained from
//! [`Store::begin`]. A unit of work is one database transaction: nothing it
//! writes is visible to others until [`UnitOfWork::commit`], and dropping it
//! without committing rolls everything back. There is no ambient transaction;
//! callers pass the unit of work explicitly to whatever needs it.
//!
//! # Example
//!
//! ```no_run
//! use points_store::{AccountStore, PgStore, Store, UnitOfWork, UserStore};
//! use points_core::{generate_referral_code, User};
//!
//! # async fn example() -> points_store::Result<()> {
//! let store = PgStore::connect("postgres://localhost/points", 5).await?;
//!
//! let mut uow = store.begin().await?;
//! let user = User::new("Ada", "ada@example.com", generate_referral_code());
//! uow.create_user(&user).await?;
//! uow.create_account(&user.id).await?;
//! uow.commit().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::{Fault, MemoryState, MemoryStore, MemoryUnitOfWork, Operation};
pub use postgres::{PgStore, PgUnitOfWork};

use async_trait::async_trait;
use points_core::{
    Account, BonusId, ReferralLink, Transaction, TransactionBonus, User, UserId,
};

/// A store that hands out units of work.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// The unit-of-work type for this backend.
    type Unit: UnitOfWork;

    /// Open a new unit of work.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    async fn begin(&self) -> Result<Self::Unit>;
}

/// One atomic, all-or-nothing sequence of store operations.
#[async_trait]
pub trait UnitOfWork: UserStore + AccountStore + TransactionLog + ReferralStore + Send {
    /// Make every write of this unit of work durable and visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing is applied in that case.
    async fn commit(self) -> Result<()>;

    /// Discard every write of this unit of work.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend reports a failure while rolling back.
    async fn rollback(self) -> Result<()>;
}

/// User records.
#[async_trait]
pub trait UserStore: Send {
    /// Insert a user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateReferralCode` if the code is taken.
    async fn create_user(&mut self, user: &User) -> Result<()>;

    /// Get a user by ID. Soft-deleted users are not returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_user_by_id(&mut self, user_id: &UserId) -> Result<Option<User>>;

    /// Get a user by referral code. Soft-deleted users are not returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_user_by_referral_code(&mut self, code: &str) -> Result<Option<User>>;
}

/// Points balances.
#[async_trait]
pub trait AccountStore: Send {
    /// Insert a zero-balance account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateAccount` if the user already has one.
    async fn create_account(&mut self, user_id: &UserId) -> Result<Account>;

    /// Increase a balance by `amount`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist and
    /// `StoreError::InvalidAmount` if `amount` is not positive.
    async fn credit(&mut self, user_id: &UserId, amount: i64) -> Result<()>;

    /// Decrease a balance by `amount`.
    ///
    /// Sufficiency is not checked here; callers read the balance first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist and
    /// `StoreError::InvalidAmount` if `amount` is not positive.
    async fn debit(&mut self, user_id: &UserId, amount: i64) -> Result<()>;

    /// Read a balance.
    ///
    /// The account row stays locked for the rest of the unit of work.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account is absent or soft-deleted.
    async fn get_balance(&mut self, user_id: &UserId) -> Result<i64>;
}

/// Append-only transfer log.
#[async_trait]
pub trait TransactionLog: Send {
    /// Record a transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn append(
        &mut self,
        sender_id: &UserId,
        recipient_id: &UserId,
        points: i64,
    ) -> Result<Transaction>;

    /// Total points ever sent by `user_id`; zero when nothing was sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn sum_sent(&mut self, user_id: &UserId) -> Result<i64>;

    /// Transfers sent or received by `user_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_for_user(
        &mut self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>>;
}

/// Referral links and transaction bonus candidates.
#[async_trait]
pub trait ReferralStore: Send {
    /// Record that `referee_id` was invited by `referrer_id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateReferral` if the referee already has a referrer.
    async fn link_referral(
        &mut self,
        referrer_id: &UserId,
        referee_id: &UserId,
    ) -> Result<ReferralLink>;

    /// Number of unpaid referral links for `referrer_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn count_unpaid_referrals(&mut self, referrer_id: &UserId) -> Result<i64>;

    /// Mark every currently unpaid link of `referrer_id` as paid.
    ///
    /// Returns the number of links updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn mark_referrals_paid(&mut self, referrer_id: &UserId) -> Result<u64>;

    /// The referrer of `user_id`, or `None` if nobody referred them.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_referrer_of(&mut self, user_id: &UserId) -> Result<Option<UserId>>;

    /// Record a transaction bonus candidate for the pair.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateBonus` if the pair is already recorded.
    /// The unit of work stays usable after that error.
    async fn record_transaction_bonus(
        &mut self,
        referrer_id: &UserId,
        referee_id: &UserId,
    ) -> Result<TransactionBonus>;

    /// Up to `limit` unpaid candidates of `referrer_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_unpaid_transaction_bonuses(
        &mut self,
        referrer_id: &UserId,
        limit: usize,
    ) -> Result<Vec<TransactionBonus>>;

    /// Mark the given candidates as paid.
    ///
    /// Returns the number of records updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn pay_transaction_bonuses(&mut self, ids: &[BonusId]) -> Result<u64>;
}
