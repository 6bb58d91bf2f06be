//! The ledger orchestrator.
//!
//! Every public method is one use case. Each opens exactly one unit of work,
//! runs its steps through it, and commits or rolls back as a whole. The whole
//! unit of work runs under a deadline; when it expires the unit of work is
//! dropped, which rolls it back, and the caller gets `LedgerError::Timeout`.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use points_core::{generate_referral_code, Account, BonusRules, Transaction, User, UserId};
use points_store::{
    AccountStore, ReferralStore, Store, StoreError, TransactionLog, UnitOfWork, UserStore,
};

use crate::bonus::{apply_referral_signup_bonus, apply_spend_threshold_bonus, BonusOutcome};
use crate::commands::{RegisterUser, TransferPoints};
use crate::error::{ErrorKind, LedgerError, Result};

/// Default deadline for one unit of work.
pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_secs(10);

/// Referral codes tried before registration gives up.
pub const MAX_REFERRAL_CODE_ATTEMPTS: usize = 5;

/// Result of a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    /// The new user.
    pub user: User,
    /// The new user's account.
    pub account: Account,
    /// The referrer, if a referral code was given.
    pub referrer_id: Option<UserId>,
    /// What the referral signup rule did.
    pub referral_bonus: BonusOutcome,
}

/// Result of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    /// The log entry.
    pub transaction: Transaction,
    /// Sender balance after the transfer.
    pub sender_balance: i64,
    /// What the spend threshold rule did.
    pub threshold_bonus: BonusOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegisterStage {
    Started,
    AccountCreated,
    ReferralLinked,
    ReferralBonusEvaluated,
    Committed,
}

impl RegisterStage {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::AccountCreated => "account_created",
            Self::ReferralLinked => "referral_linked",
            Self::ReferralBonusEvaluated => "referral_bonus_evaluated",
            Self::Committed => "committed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferStage {
    Started,
    BalanceChecked,
    TransferLogged,
    ThresholdEvaluated,
    Committed,
}

impl TransferStage {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::BalanceChecked => "balance_checked",
            Self::TransferLogged => "transfer_logged",
            Self::ThresholdEvaluated => "threshold_evaluated",
            Self::Committed => "committed",
        }
    }
}

/// Points ledger over a store.
#[derive(Debug, Clone)]
pub struct Ledger<S> {
    store: S,
    rules: BonusRules,
    tx_timeout: Duration,
    code_generator: fn() -> String,
}

impl<S: Store> Ledger<S> {
    /// Create a ledger.
    pub fn new(store: S, rules: BonusRules, tx_timeout: Duration) -> Self {
        Self {
            store,
            rules,
            tx_timeout,
            code_generator: generate_referral_code,
        }
    }

    /// Replace the referral code generator.
    #[must_use]
    pub fn with_code_generator(mut self, generator: fn() -> String) -> Self {
        self.code_generator = generator;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The bonus rules in effect.
    pub fn rules(&self) -> &BonusRules {
        &self.rules
    }

    // ========================================================================
    // Use cases
    // ========================================================================

    /// Register a user, link them to their referrer and evaluate the referral
    /// signup bonus.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ReferralCodeNotFound` for an unknown referral
    /// code, `LedgerError::Timeout` if the deadline passes, and a storage
    /// error if the store fails. Nothing is written on error.
    pub async fn register_user(&self, cmd: RegisterUser) -> Result<Registration> {
        let mut stage = RegisterStage::Started;
        let result = self.bounded(self.register_tx(&cmd, &mut stage)).await;
        log_outcome("register_user", stage.as_str(), &result);
        result
    }

    /// Transfer points and evaluate the spend threshold bonus.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InsufficientFunds` if the sender cannot cover
    /// the transfer, `LedgerError::AccountNotFound` if either account is
    /// missing, `LedgerError::Timeout` if the deadline passes, and a storage
    /// error if the store fails. Nothing is written on error.
    pub async fn transfer_points(&self, cmd: TransferPoints) -> Result<TransferReceipt> {
        let mut stage = TransferStage::Started;
        let result = self.bounded(self.transfer_tx(&cmd, &mut stage)).await;
        log_outcome("transfer_points", stage.as_str(), &result);
        result
    }

    /// Current balance of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AccountNotFound` if the account is missing.
    pub async fn balance(&self, user_id: UserId) -> Result<i64> {
        let result = self
            .bounded(async {
                let mut uow = self.store.begin().await?;
                let result = uow.get_balance(&user_id).await.map_err(LedgerError::from);
                settle(uow, result).await
            })
            .await;
        log_outcome("balance", "read", &result);
        result
    }

    /// Transfers sent or received by `user_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AccountNotFound` if the user is unknown.
    pub async fn transactions(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let result = self
            .bounded(async {
                let mut uow = self.store.begin().await?;
                let result = list_transactions(&mut uow, &user_id, limit, offset).await;
                settle(uow, result).await
            })
            .await;
        log_outcome("transactions", "read", &result);
        result
    }

    /// Credit `points` to `user_id` outside of any transfer.
    ///
    /// No transaction log entry is written. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` if `points` is not positive and
    /// `LedgerError::AccountNotFound` if the account is missing.
    pub async fn grant_points(&self, user_id: UserId, points: i64) -> Result<i64> {
        if points <= 0 {
            return Err(LedgerError::InvalidAmount(points));
        }

        let result = self
            .bounded(async {
                let mut uow = self.store.begin().await?;
                let result = grant(&mut uow, &user_id, points).await;
                settle(uow, result).await
            })
            .await;
        if result.is_ok() {
            info!(user_id = %user_id, points, "Points granted");
        }
        log_outcome("grant_points", "credit", &result);
        result
    }

    // ========================================================================
    // Units of work
    // ========================================================================

    async fn bounded<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.tx_timeout, work)
            .await
            .unwrap_or(Err(LedgerError::Timeout(self.tx_timeout)))
    }

    async fn register_tx(
        &self,
        cmd: &RegisterUser,
        stage: &mut RegisterStage,
    ) -> Result<Registration> {
        let mut uow = self.store.begin().await?;
        let result = self.register_steps(&mut uow, cmd, stage).await;
        let registration = settle(uow, result).await?;
        *stage = RegisterStage::Committed;

        info!(
            user_id = %registration.user.id,
            referred = registration.referrer_id.is_some(),
            "User registered"
        );
        Ok(registration)
    }

    async fn register_steps(
        &self,
        uow: &mut S::Unit,
        cmd: &RegisterUser,
        stage: &mut RegisterStage,
    ) -> Result<Registration> {
        let referrer = match cmd.referral_code() {
            Some(code) => Some(
                uow.find_user_by_referral_code(code)
                    .await?
                    .ok_or_else(|| LedgerError::ReferralCodeNotFound(code.to_owned()))?,
            ),
            None => None,
        };

        let user = self.insert_user(uow, cmd).await?;
        let account = uow.create_account(&user.id).await?;
        *stage = RegisterStage::AccountCreated;

        let Some(referrer) = referrer else {
            return Ok(Registration {
                user,
                account,
                referrer_id: None,
                referral_bonus: BonusOutcome::NotTriggered,
            });
        };

        uow.link_referral(&referrer.id, &user.id).await?;
        *stage = RegisterStage::ReferralLinked;

        let referral_bonus = apply_referral_signup_bonus(uow, &self.rules, &referrer.id).await?;
        *stage = RegisterStage::ReferralBonusEvaluated;

        Ok(Registration {
            user,
            account,
            referrer_id: Some(referrer.id),
            referral_bonus,
        })
    }

    async fn insert_user(&self, uow: &mut S::Unit, cmd: &RegisterUser) -> Result<User> {
        for attempt in 1..=MAX_REFERRAL_CODE_ATTEMPTS {
            let user = User::new(cmd.name(), cmd.email(), (self.code_generator)());
            match uow.create_user(&user).await {
                Ok(()) => return Ok(user),
                Err(StoreError::DuplicateReferralCode { code }) => {
                    debug!(attempt, code = %code, "Referral code taken, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(LedgerError::ReferralCodesExhausted {
            attempts: MAX_REFERRAL_CODE_ATTEMPTS,
        })
    }

    async fn transfer_tx(
        &self,
        cmd: &TransferPoints,
        stage: &mut TransferStage,
    ) -> Result<TransferReceipt> {
        let mut uow = self.store.begin().await?;
        let result = self.transfer_steps(&mut uow, cmd, stage).await;
        let receipt = settle(uow, result).await?;
        *stage = TransferStage::Committed;

        info!(
            transaction_id = %receipt.transaction.id,
            sender_id = %cmd.sender(),
            recipient_id = %cmd.recipient(),
            points = cmd.points(),
            "Points transferred"
        );
        Ok(receipt)
    }

    async fn transfer_steps(
        &self,
        uow: &mut S::Unit,
        cmd: &TransferPoints,
        stage: &mut TransferStage,
    ) -> Result<TransferReceipt> {
        let sender = cmd.sender();
        let recipient = cmd.recipient();
        let points = cmd.points();

        // Lock both accounts in key order so opposite transfers cannot deadlock.
        let (first, second) = if sender < recipient {
            (sender, recipient)
        } else {
            (recipient, sender)
        };
        let first_balance = uow.get_balance(&first).await?;
        let second_balance = uow.get_balance(&second).await?;
        let balance = if first == sender {
            first_balance
        } else {
            second_balance
        };
        *stage = TransferStage::BalanceChecked;

        if balance < points {
            return Err(LedgerError::InsufficientFunds {
                balance,
                required: points,
            });
        }

        let prior_total = uow.sum_sent(&sender).await?;
        uow.debit(&sender, points).await?;
        uow.credit(&recipient, points).await?;
        let transaction = uow.append(&sender, &recipient, points).await?;
        *stage = TransferStage::TransferLogged;

        let threshold_bonus =
            apply_spend_threshold_bonus(uow, &self.rules, &sender, prior_total, points).await?;
        *stage = TransferStage::ThresholdEvaluated;

        Ok(TransferReceipt {
            transaction,
            sender_balance: balance - points,
            threshold_bonus,
        })
    }
}

async fn list_transactions<U: UnitOfWork>(
    uow: &mut U,
    user_id: &UserId,
    limit: usize,
    offset: usize,
) -> Result<Vec<Transaction>> {
    if uow.find_user_by_id(user_id).await?.is_none() {
        return Err(LedgerError::AccountNotFound {
            user_id: user_id.to_string(),
        });
    }
    Ok(uow.list_for_user(user_id, limit, offset).await?)
}

async fn grant<U: UnitOfWork>(uow: &mut U, user_id: &UserId, points: i64) -> Result<i64> {
    let balance = uow.get_balance(user_id).await?;
    uow.credit(user_id, points).await?;
    Ok(balance + points)
}

/// Commit on success, roll back on failure.
///
/// A failed rollback is logged and the original error is returned.
async fn settle<U: UnitOfWork, T>(uow: U, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(error = %rollback_err, original = %err, "Rollback failed");
            }
            Err(err)
        }
    }
}

fn log_outcome<T>(operation: &'static str, stage: &'static str, result: &Result<T>) {
    let Err(err) = result else {
        return;
    };

    match err.kind() {
        ErrorKind::System => error!(operation, stage, error = %err, "Ledger operation aborted"),
        ErrorKind::Validation | ErrorKind::Business | ErrorKind::Conflict => {
            info!(operation, stage, error = %err, "Ledger operation rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use points_store::{Fault, MemoryStore, Operation};

    fn ledger() -> Ledger<MemoryStore> {
        Ledger::new(MemoryStore::new(), BonusRules::default(), DEFAULT_TX_TIMEOUT)
    }

    async fn register(ledger: &Ledger<MemoryStore>, referral_code: Option<&str>) -> User {
        let cmd = RegisterUser::new("Test", "test@example.com", referral_code.map(String::from))
            .unwrap();
        ledger.register_user(cmd).await.unwrap().user
    }

    #[tokio::test]
    async fn register_creates_zero_balance_account() {
        let ledger = ledger();
        let user = register(&ledger, None).await;

        assert_eq!(user.referral_code.len(), points_core::REFERRAL_CODE_LEN);
        assert_eq!(ledger.balance(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_referral_code_writes_nothing() {
        let ledger = ledger();
        let cmd = RegisterUser::new("Test", "test@example.com", Some("nope00".into())).unwrap();

        let err = ledger.register_user(cmd).await.unwrap_err();
        assert!(matches!(err, LedgerError::ReferralCodeNotFound(_)));
        assert_eq!(ledger.store().snapshot().await.users.len(), 0);
    }

    #[tokio::test]
    async fn taken_referral_code_is_regenerated() {
        fn fixed() -> String {
            "fixed1".to_owned()
        }

        let ledger = ledger().with_code_generator(fixed);
        register(&ledger, None).await;

        let cmd = RegisterUser::new("Other", "other@example.com", None).unwrap();
        let err = ledger.register_user(cmd).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::ReferralCodesExhausted {
                attempts: MAX_REFERRAL_CODE_ATTEMPTS
            }
        ));
        assert_eq!(ledger.store().snapshot().await.users.len(), 1);
    }

    #[tokio::test]
    async fn transfer_moves_points() {
        let ledger = ledger();
        let alice = register(&ledger, None).await;
        let bob = register(&ledger, None).await;
        ledger.grant_points(alice.id, 100).await.unwrap();

        let receipt = ledger
            .transfer_points(TransferPoints::new(alice.id, bob.id, 30).unwrap())
            .await
            .unwrap();

        assert_eq!(receipt.sender_balance, 70);
        assert_eq!(receipt.threshold_bonus, BonusOutcome::NotTriggered);
        assert_eq!(ledger.balance(alice.id).await.unwrap(), 70);
        assert_eq!(ledger.balance(bob.id).await.unwrap(), 30);

        let history = ledger.transactions(bob.id, 10, 0).await.unwrap();
        assert_eq!(history, vec![receipt.transaction]);
    }

    #[tokio::test]
    async fn transfer_to_missing_account_fails() {
        let ledger = ledger();
        let alice = register(&ledger, None).await;
        ledger.grant_points(alice.id, 100).await.unwrap();

        let err = ledger
            .transfer_points(TransferPoints::new(alice.id, UserId::generate(), 10).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound { .. }));
        assert_eq!(ledger.balance(alice.id).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn grant_rejects_non_positive_points() {
        let ledger = ledger();
        let alice = register(&ledger, None).await;

        assert!(matches!(
            ledger.grant_points(alice.id, 0).await,
            Err(LedgerError::InvalidAmount(0))
        ));
    }

    #[tokio::test]
    async fn transactions_for_unknown_user_is_not_found() {
        let ledger = ledger();
        assert!(matches!(
            ledger.transactions(UserId::generate(), 10, 0).await,
            Err(LedgerError::AccountNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failed_begin_is_system_error() {
        let ledger = ledger();
        ledger.store().inject(Operation::Begin, Fault::Fail);

        let err = ledger.balance(UserId::generate()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::System);
    }
}
