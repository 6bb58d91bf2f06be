//! In-memory storage implementation.
//!
//! `MemoryStore` keeps the whole ledger in one `MemoryState` behind a
//! `tokio::sync::Mutex`. A unit of work holds the lock for its whole lifetime,
//! so units of work are fully serialized, and it keeps a copy of the state
//! taken at `begin` that is restored when the unit of work is dropped without
//! committing.
//!
//! Faults can be injected per operation to exercise rollback and timeout
//! paths in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use points_core::{
    Account, BonusId, ReferralLink, Transaction, TransactionBonus, TransactionId, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::{AccountStore, ReferralStore, Store, TransactionLog, UnitOfWork, UserStore};

/// Store operations that faults can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `Store::begin`.
    Begin,
    /// `UserStore::create_user`.
    CreateUser,
    /// `AccountStore::create_account`.
    CreateAccount,
    /// `AccountStore::credit`.
    Credit,
    /// `AccountStore::debit`.
    Debit,
    /// `AccountStore::get_balance`.
    GetBalance,
    /// `TransactionLog::append`.
    Append,
    /// `TransactionLog::sum_sent`.
    SumSent,
    /// `ReferralStore::link_referral`.
    LinkReferral,
    /// `ReferralStore::count_unpaid_referrals`.
    CountUnpaidReferrals,
    /// `ReferralStore::mark_referrals_paid`.
    MarkReferralsPaid,
    /// `ReferralStore::find_referrer_of`.
    FindReferrer,
    /// `ReferralStore::record_transaction_bonus`.
    RecordTransactionBonus,
    /// `ReferralStore::list_unpaid_transaction_bonuses`.
    ListUnpaidTransactionBonuses,
    /// `ReferralStore::pay_transaction_bonuses`.
    PayTransactionBonuses,
    /// `UnitOfWork::commit`.
    Commit,
}

/// What happens when a faulted operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Return `StoreError::Database`.
    Fail,
    /// Never complete.
    Stall,
}

/// The full contents of a `MemoryStore`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    /// Users by ID.
    pub users: BTreeMap<UserId, User>,
    /// Accounts by user ID.
    pub accounts: BTreeMap<UserId, Account>,
    /// Transfer log in append order.
    pub transactions: Vec<Transaction>,
    /// Referral links in insertion order.
    pub referrals: Vec<ReferralLink>,
    /// Transaction bonus candidates in insertion order.
    pub bonuses: Vec<TransactionBonus>,
    last_transaction_id: i64,
}

impl MemoryState {
    /// Balance of `user_id`, if the account exists.
    #[must_use]
    pub fn points_of(&self, user_id: &UserId) -> Option<i64> {
        self.accounts.get(user_id).map(|account| account.points)
    }

    /// Sum of every account balance.
    #[must_use]
    pub fn total_points(&self) -> i64 {
        self.accounts.values().map(|account| account.points).sum()
    }

    fn active_account_mut(&mut self, user_id: &UserId) -> Result<&mut Account> {
        self.accounts
            .get_mut(user_id)
            .filter(|account| account.is_active())
            .ok_or_else(|| StoreError::account_not_found(user_id))
    }

    fn is_active_user(&self, user_id: &UserId) -> bool {
        self.users
            .get(user_id)
            .is_some_and(|user| user.deleted_at.is_none())
    }
}

type FaultMap = Arc<std::sync::Mutex<HashMap<Operation, Fault>>>;

/// In-memory storage implementation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: FaultMap,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call to `operation` misbehave until cleared.
    pub fn inject(&self, operation: Operation, fault: Fault) {
        tracing::debug!(?operation, ?fault, "Fault injected");
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation, fault);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// A copy of the committed state.
    ///
    /// Waits for any open unit of work to finish.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

async fn check_fault(faults: &FaultMap, operation: Operation) -> Result<()> {
    let fault = faults
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&operation)
        .copied();

    match fault {
        None => Ok(()),
        Some(Fault::Fail) => Err(StoreError::Database(format!(
            "injected failure in {operation:?}"
        ))),
        Some(Fault::Stall) => std::future::pending().await,
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Unit = MemoryUnitOfWork;

    async fn begin(&self) -> Result<MemoryUnitOfWork> {
        check_fault(&self.faults, Operation::Begin).await?;

        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();

        Ok(MemoryUnitOfWork {
            state: guard,
            snapshot: Some(snapshot),
            faults: Arc::clone(&self.faults),
        })
    }
}

/// A unit of work over a `MemoryStore`.
///
/// Holds the store lock until dropped. Unless `commit` succeeded, dropping it
/// restores the state captured at `begin`.
pub struct MemoryUnitOfWork {
    state: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
    faults: FaultMap,
}

impl MemoryUnitOfWork {
    async fn check(&self, operation: Operation) -> Result<()> {
        check_fault(&self.faults, operation).await
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.state = snapshot;
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(mut self) -> Result<()> {
        self.check(Operation::Commit).await?;
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

fn ensure_positive(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(StoreError::InvalidAmount(amount));
    }
    Ok(())
}

// ============================================================================
// User Operations
// ============================================================================

#[async_trait]
impl UserStore for MemoryUnitOfWork {
    async fn create_user(&mut self, user: &User) -> Result<()> {
        self.check(Operation::CreateUser).await?;

        if self
            .state
            .users
            .values()
            .any(|existing| existing.referral_code == user.referral_code)
        {
            return Err(StoreError::DuplicateReferralCode {
                code: user.referral_code.clone(),
            });
        }
        if self.state.users.contains_key(&user.id) {
            return Err(StoreError::Database(format!("duplicate user id: {}", user.id)));
        }

        self.state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&mut self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self
            .state
            .users
            .get(user_id)
            .filter(|user| user.deleted_at.is_none())
            .cloned())
    }

    async fn find_user_by_referral_code(&mut self, code: &str) -> Result<Option<User>> {
        Ok(self
            .state
            .users
            .values()
            .find(|user| user.referral_code == code && user.deleted_at.is_none())
            .cloned())
    }
}

// ============================================================================
// Account Operations
// ============================================================================

#[async_trait]
impl AccountStore for MemoryUnitOfWork {
    async fn create_account(&mut self, user_id: &UserId) -> Result<Account> {
        self.check(Operation::CreateAccount).await?;

        if self.state.accounts.contains_key(user_id) {
            return Err(StoreError::DuplicateAccount { user_id: *user_id });
        }

        let account = Account::new(*user_id);
        self.state.accounts.insert(*user_id, account.clone());
        Ok(account)
    }

    async fn credit(&mut self, user_id: &UserId, amount: i64) -> Result<()> {
        self.check(Operation::Credit).await?;
        ensure_positive(amount)?;

        let account = self.state.active_account_mut(user_id)?;
        account.points = account
            .points
            .checked_add(amount)
            .ok_or_else(|| StoreError::Database("bigint out of range".into()))?;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn debit(&mut self, user_id: &UserId, amount: i64) -> Result<()> {
        self.check(Operation::Debit).await?;
        ensure_positive(amount)?;

        let account = self.state.active_account_mut(user_id)?;
        account.points -= amount;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn get_balance(&mut self, user_id: &UserId) -> Result<i64> {
        self.check(Operation::GetBalance).await?;

        self.state
            .accounts
            .get(user_id)
            .filter(|account| account.is_active())
            .map(|account| account.points)
            .ok_or_else(|| StoreError::account_not_found(user_id))
    }
}

// ============================================================================
// Transaction Log Operations
// ============================================================================

#[async_trait]
impl TransactionLog for MemoryUnitOfWork {
    async fn append(
        &mut self,
        sender_id: &UserId,
        recipient_id: &UserId,
        points: i64,
    ) -> Result<Transaction> {
        self.check(Operation::Append).await?;

        for user_id in [sender_id, recipient_id] {
            if !self.state.users.contains_key(user_id) {
                return Err(StoreError::Database(format!(
                    "transactions references unknown user: {user_id}"
                )));
            }
        }

        self.state.last_transaction_id += 1;
        let now = Utc::now();
        let transaction = Transaction {
            id: TransactionId::new(self.state.last_transaction_id),
            user_id: *sender_id,
            recipient_user_id: *recipient_id,
            points,
            created_at: now,
            updated_at: now,
        };

        self.state.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn sum_sent(&mut self, user_id: &UserId) -> Result<i64> {
        self.check(Operation::SumSent).await?;

        Ok(self
            .state
            .transactions
            .iter()
            .filter(|tx| tx.is_sent_by(user_id))
            .fold(0_i64, |total, tx| total.saturating_add(tx.points)))
    }

    async fn list_for_user(
        &mut self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        Ok(self
            .state
            .transactions
            .iter()
            .rev()
            .filter(|tx| tx.involves(user_id))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Referral Operations
// ============================================================================

#[async_trait]
impl ReferralStore for MemoryUnitOfWork {
    async fn link_referral(
        &mut self,
        referrer_id: &UserId,
        referee_id: &UserId,
    ) -> Result<ReferralLink> {
        self.check(Operation::LinkReferral).await?;

        if self
            .state
            .referrals
            .iter()
            .any(|link| link.referee_id == *referee_id)
        {
            return Err(StoreError::DuplicateReferral {
                referee_id: *referee_id,
            });
        }

        let link = ReferralLink::new(*referrer_id, *referee_id);
        self.state.referrals.push(link.clone());
        Ok(link)
    }

    async fn count_unpaid_referrals(&mut self, referrer_id: &UserId) -> Result<i64> {
        self.check(Operation::CountUnpaidReferrals).await?;

        let count = self
            .state
            .referrals
            .iter()
            .filter(|link| {
                link.referrer_id == *referrer_id && !link.paid_out && link.deleted_at.is_none()
            })
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn mark_referrals_paid(&mut self, referrer_id: &UserId) -> Result<u64> {
        self.check(Operation::MarkReferralsPaid).await?;

        let now = Utc::now();
        let mut updated = 0;
        for link in self.state.referrals.iter_mut().filter(|link| {
            link.referrer_id == *referrer_id && !link.paid_out && link.deleted_at.is_none()
        }) {
            link.paid_out = true;
            link.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn find_referrer_of(&mut self, user_id: &UserId) -> Result<Option<UserId>> {
        self.check(Operation::FindReferrer).await?;

        Ok(self
            .state
            .referrals
            .iter()
            .find(|link| link.referee_id == *user_id && link.deleted_at.is_none())
            .map(|link| link.referrer_id)
            .filter(|referrer| self.state.is_active_user(referrer)))
    }

    async fn record_transaction_bonus(
        &mut self,
        referrer_id: &UserId,
        referee_id: &UserId,
    ) -> Result<TransactionBonus> {
        self.check(Operation::RecordTransactionBonus).await?;

        if self
            .state
            .bonuses
            .iter()
            .any(|bonus| bonus.referrer_id == *referrer_id && bonus.referee_id == *referee_id)
        {
            return Err(StoreError::DuplicateBonus {
                referrer_id: *referrer_id,
                referee_id: *referee_id,
            });
        }

        let bonus = TransactionBonus::new(*referrer_id, *referee_id);
        self.state.bonuses.push(bonus.clone());
        Ok(bonus)
    }

    async fn list_unpaid_transaction_bonuses(
        &mut self,
        referrer_id: &UserId,
        limit: usize,
    ) -> Result<Vec<TransactionBonus>> {
        self.check(Operation::ListUnpaidTransactionBonuses).await?;

        Ok(self
            .state
            .bonuses
            .iter()
            .filter(|bonus| bonus.referrer_id == *referrer_id && !bonus.paid_out)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn pay_transaction_bonuses(&mut self, ids: &[BonusId]) -> Result<u64> {
        self.check(Operation::PayTransactionBonuses).await?;

        let now = Utc::now();
        let mut updated = 0;
        for bonus in self
            .state
            .bonuses
            .iter_mut()
            .filter(|bonus| !bonus.paid_out && ids.contains(&bonus.id))
        {
            bonus.paid_out = true;
            bonus.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }
}
