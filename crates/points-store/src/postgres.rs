//! PostgreSQL storage implementation.
//!
//! This module provides the `PgStore` implementation of the `Store` trait.
//! Each unit of work wraps one `sqlx` transaction at READ COMMITTED isolation.
//! Concurrency control comes from row locks: `get_balance` reads with
//! `FOR UPDATE`, and credit/debit lock the rows they update, so transfers that
//! touch the same account run one after another.
//!
//! Inserts that may hit an expected unique constraint use
//! `ON CONFLICT DO NOTHING` and report the duplicate from the affected row
//! count, so the transaction stays usable after a duplicate.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

use points_core::{
    Account, BonusId, ReferralLink, Transaction, TransactionBonus, TransactionId, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::{AccountStore, ReferralStore, Store, TransactionLog, UnitOfWork, UserStore};

/// Time allowed to acquire a pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60);

/// PostgreSQL-backed storage implementation.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database is unreachable.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options: PgConnectOptions = url.parse()?;
        Self::connect_with(options, max_connections).await
    }

    /// Connect with explicit connection options.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable.
    pub async fn connect_with(options: PgConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        tracing::info!(max_connections, "PostgreSQL pool connected");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    type Unit = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await?;
        Ok(PgUnitOfWork { tx })
    }
}

/// A unit of work backed by one PostgreSQL transaction.
///
/// Dropping it without calling `commit` rolls the transaction back.
pub struct PgUnitOfWork {
    tx: SqlxTransaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    referral_code: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            email: row.email,
            referral_code: row.referral_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    user_id: Uuid,
    points: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            user_id: row.user_id.into(),
            points: row.points,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    user_id: Uuid,
    recipient_user_id: Uuid,
    points: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: TransactionId::new(row.id),
            user_id: row.user_id.into(),
            recipient_user_id: row.recipient_user_id.into(),
            points: row.points,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BonusRow {
    id: Uuid,
    referrer_id: Uuid,
    referee_id: Uuid,
    paid_out: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BonusRow> for TransactionBonus {
    fn from(row: BonusRow) -> Self {
        Self {
            id: row.id.into(),
            referrer_id: row.referrer_id.into(),
            referee_id: row.referee_id.into(),
            paid_out: row.paid_out,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn ensure_positive(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(StoreError::InvalidAmount(amount));
    }
    Ok(())
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// ============================================================================
// User Operations
// ============================================================================

#[async_trait]
impl UserStore for PgUnitOfWork {
    async fn create_user(&mut self, user: &User) -> Result<()> {
        let inserted = sqlx::query(
            "INSERT INTO users (id, name, email, referral_code, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT ON CONSTRAINT users_referral_code_key DO NOTHING",
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.referral_code)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(StoreError::DuplicateReferralCode {
                code: user.referral_code.clone(),
            });
        }
        Ok(())
    }

    async fn find_user_by_id(&mut self, user_id: &UserId) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, email, referral_code, created_at, updated_at, deleted_at \
             FROM users WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_user_by_referral_code(&mut self, code: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, name, email, referral_code, created_at, updated_at, deleted_at \
             FROM users WHERE referral_code = $1 AND deleted_at IS NULL",
        )
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(User::from))
    }
}

// ============================================================================
// Account Operations
// ============================================================================

#[async_trait]
impl AccountStore for PgUnitOfWork {
    async fn create_account(&mut self, user_id: &UserId) -> Result<Account> {
        let row: Option<AccountRow> = sqlx::query_as(
            "INSERT INTO user_points (user_id, points) VALUES ($1, 0) \
             ON CONFLICT (user_id) DO NOTHING \
             RETURNING user_id, points, created_at, updated_at, deleted_at",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Account::from)
            .ok_or(StoreError::DuplicateAccount { user_id: *user_id })
    }

    async fn credit(&mut self, user_id: &UserId, amount: i64) -> Result<()> {
        ensure_positive(amount)?;

        let updated = sqlx::query(
            "UPDATE user_points SET points = points + $1, updated_at = now() \
             WHERE user_id = $2 AND deleted_at IS NULL",
        )
        .bind(amount)
        .bind(user_id.as_uuid())
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::account_not_found(user_id));
        }
        Ok(())
    }

    async fn debit(&mut self, user_id: &UserId, amount: i64) -> Result<()> {
        ensure_positive(amount)?;

        let updated = sqlx::query(
            "UPDATE user_points SET points = points - $1, updated_at = now() \
             WHERE user_id = $2 AND deleted_at IS NULL",
        )
        .bind(amount)
        .bind(user_id.as_uuid())
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::account_not_found(user_id));
        }
        Ok(())
    }

    async fn get_balance(&mut self, user_id: &UserId) -> Result<i64> {
        let points: Option<i64> = sqlx::query_scalar(
            "SELECT points FROM user_points \
             WHERE user_id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        points.ok_or_else(|| StoreError::account_not_found(user_id))
    }
}

// ============================================================================
// Transaction Log Operations
// ============================================================================

#[async_trait]
impl TransactionLog for PgUnitOfWork {
    async fn append(
        &mut self,
        sender_id: &UserId,
        recipient_id: &UserId,
        points: i64,
    ) -> Result<Transaction> {
        let row: TransactionRow = sqlx::query_as(
            "INSERT INTO transactions (user_id, recipient_user_id, points) VALUES ($1, $2, $3) \
             RETURNING id, user_id, recipient_user_id, points, created_at, updated_at",
        )
        .bind(sender_id.as_uuid())
        .bind(recipient_id.as_uuid())
        .bind(points)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn sum_sent(&mut self, user_id: &UserId) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT LEAST(COALESCE(SUM(points), 0), 9223372036854775807)::BIGINT \
             FROM transactions \
             WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(total)
    }

    async fn list_for_user(
        &mut self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            "SELECT id, user_id, recipient_user_id, points, created_at, updated_at \
             FROM transactions \
             WHERE (user_id = $1 OR recipient_user_id = $1) AND deleted_at IS NULL \
             ORDER BY id DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id.as_uuid())
        .bind(to_i64(limit))
        .bind(to_i64(offset))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Transaction::from).collect())
    }
}

// ============================================================================
// Referral Operations
// ============================================================================

#[async_trait]
impl ReferralStore for PgUnitOfWork {
    async fn link_referral(
        &mut self,
        referrer_id: &UserId,
        referee_id: &UserId,
    ) -> Result<ReferralLink> {
        let link = ReferralLink::new(*referrer_id, *referee_id);

        let inserted = sqlx::query(
            "INSERT INTO user_referrals (id, referrer_id, referee_id, paid_out, created_at, updated_at) \
             VALUES ($1, $2, $3, false, $4, $5) \
             ON CONFLICT ON CONSTRAINT user_referrals_referee_id_key DO NOTHING",
        )
        .bind(link.id.as_uuid())
        .bind(referrer_id.as_uuid())
        .bind(referee_id.as_uuid())
        .bind(link.created_at)
        .bind(link.updated_at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(StoreError::DuplicateReferral {
                referee_id: *referee_id,
            });
        }
        Ok(link)
    }

    async fn count_unpaid_referrals(&mut self, referrer_id: &UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_referrals \
             WHERE referrer_id = $1 AND paid_out = false AND deleted_at IS NULL",
        )
        .bind(referrer_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(count)
    }

    async fn mark_referrals_paid(&mut self, referrer_id: &UserId) -> Result<u64> {
        let updated = sqlx::query(
            "UPDATE user_referrals SET paid_out = true, updated_at = now() \
             WHERE referrer_id = $1 AND paid_out = false AND deleted_at IS NULL",
        )
        .bind(referrer_id.as_uuid())
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(updated)
    }

    async fn find_referrer_of(&mut self, user_id: &UserId) -> Result<Option<UserId>> {
        let referrer: Option<Uuid> = sqlx::query_scalar(
            "SELECT r.referrer_id FROM user_referrals r \
             JOIN users u ON u.id = r.referrer_id \
             WHERE r.referee_id = $1 AND r.deleted_at IS NULL AND u.deleted_at IS NULL",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(referrer.map(UserId::from))
    }

    async fn record_transaction_bonus(
        &mut self,
        referrer_id: &UserId,
        referee_id: &UserId,
    ) -> Result<TransactionBonus> {
        let bonus = TransactionBonus::new(*referrer_id, *referee_id);

        let inserted = sqlx::query(
            "INSERT INTO referred_user_transaction_bonuses \
             (id, referrer_id, referee_id, paid_out, created_at, updated_at) \
             VALUES ($1, $2, $3, false, $4, $5) \
             ON CONFLICT ON CONSTRAINT referred_user_transaction_bonuses_referrer_id_referee_id_key \
             DO NOTHING",
        )
        .bind(bonus.id.as_uuid())
        .bind(referrer_id.as_uuid())
        .bind(referee_id.as_uuid())
        .bind(bonus.created_at)
        .bind(bonus.updated_at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(StoreError::DuplicateBonus {
                referrer_id: *referrer_id,
                referee_id: *referee_id,
            });
        }
        Ok(bonus)
    }

    async fn list_unpaid_transaction_bonuses(
        &mut self,
        referrer_id: &UserId,
        limit: usize,
    ) -> Result<Vec<TransactionBonus>> {
        let rows: Vec<BonusRow> = sqlx::query_as(
            "SELECT id, referrer_id, referee_id, paid_out, created_at, updated_at \
             FROM referred_user_transaction_bonuses \
             WHERE referrer_id = $1 AND paid_out = false AND deleted_at IS NULL \
             ORDER BY created_at, id LIMIT $2",
        )
        .bind(referrer_id.as_uuid())
        .bind(to_i64(limit))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(TransactionBonus::from).collect())
    }

    async fn pay_transaction_bonuses(&mut self, ids: &[BonusId]) -> Result<u64> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();

        let updated = sqlx::query(
            "UPDATE referred_user_transaction_bonuses SET paid_out = true, updated_at = now() \
             WHERE id = ANY($1) AND paid_out = false AND deleted_at IS NULL",
        )
        .bind(&ids)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(updated)
    }
}
