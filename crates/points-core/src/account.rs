//! User and points account types.
//!
//! Every registered user owns exactly one points account. Accounts are created
//! with a zero balance and are never physically deleted; `deleted_at` marks a
//! soft delete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user ID.
    pub id: UserId,

    /// Display name.
    pub name: String,

    /// Contact email.
    pub email: String,

    /// Code other users supply at registration to name this user as their referrer.
    pub referral_code: String,

    /// When the user was created.
    pub created_at: DateTime<Utc>,

    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new user with a freshly generated ID.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, referral_code: String) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::generate(),
            name: name.into(),
            email: email.into(),
            referral_code,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// A points account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// The owning user.
    pub user_id: UserId,

    /// Current points balance. Never negative after a committed transfer.
    pub points: i64,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the balance last changed.
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create a new account with zero balance.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            points: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Check if the account can cover a debit of `amount` points.
    #[must_use]
    pub fn has_sufficient_points(&self, amount: i64) -> bool {
        self.points >= amount
    }

    /// Whether the account has not been soft-deleted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}
