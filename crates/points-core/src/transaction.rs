//! Ledger transaction types.
//!
//! A transaction records one successful transfer of points between two users.
//! Rows are immutable once written; the sum of a user's sent transactions is
//! their lifetime transferred-points total.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{TransactionId, UserId};

/// A logged points transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Store-assigned, monotonically increasing ID.
    pub id: TransactionId,

    /// The sender.
    pub user_id: UserId,

    /// The recipient.
    pub recipient_user_id: UserId,

    /// Points moved. Always positive.
    pub points: i64,

    /// When the transfer was logged.
    pub created_at: DateTime<Utc>,

    /// Equal to `created_at`; rows are never updated.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Whether `user_id` sent this transfer.
    #[must_use]
    pub fn is_sent_by(&self, user_id: &UserId) -> bool {
        self.user_id == *user_id
    }

    /// Whether `user_id` took part in this transfer on either side.
    #[must_use]
    pub fn involves(&self, user_id: &UserId) -> bool {
        self.user_id == *user_id || self.recipient_user_id == *user_id
    }

    /// Signed effect of this transfer on `user_id`'s balance.
    #[must_use]
    pub fn delta_for(&self, user_id: &UserId) -> i64 {
        if self.user_id == *user_id {
            -self.points
        } else if self.recipient_user_id == *user_id {
            self.points
        } else {
            0
        }
    }
}
