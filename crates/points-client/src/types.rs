//! Request and response types for the points API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Registration
// ============================================================================

/// Registration request.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Referral code of the inviting user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
}

/// A registered user.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    /// User ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Code other users register with.
    pub referral_code: String,
    /// Created timestamp.
    pub created_at: DateTime<Utc>,
}

/// Registration response.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    /// The new user.
    pub user: UserInfo,
    /// Starting balance.
    pub points: i64,
    /// Referrer, if a referral code was used.
    pub referrer_id: Option<String>,
    /// What the referral signup bonus did.
    pub referral_bonus: BonusStatus,
}

/// What a bonus rule did for a request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BonusStatus {
    /// The rule's trigger condition did not hold.
    NotTriggered,
    /// Progress was recorded; the batch is not complete.
    Pending {
        /// Unpaid records for the referrer.
        unpaid: i64,
    },
    /// The referrer was paid.
    Paid {
        /// The user credited.
        referrer: String,
        /// Points credited.
        points: i64,
    },
}

// ============================================================================
// Transfers
// ============================================================================

/// Transfer request.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    /// Sender.
    pub user_id: String,
    /// Recipient.
    pub recipient_user_id: String,
    /// Points to move.
    pub points: i64,
}

/// A logged transfer.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionInfo {
    /// Transaction ID.
    pub id: i64,
    /// Sender.
    pub user_id: String,
    /// Recipient.
    pub recipient_user_id: String,
    /// Points moved.
    pub points: i64,
    /// Effect on the user the transfer was listed for.
    pub delta: i64,
    /// Timestamp.
    pub created_at: DateTime<Utc>,
}

/// Transfer response.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferResponse {
    /// The logged transfer.
    pub transaction: TransactionInfo,
    /// Sender balance after the transfer.
    pub balance: i64,
    /// What the spend threshold bonus did.
    pub threshold_bonus: BonusStatus,
}

// ============================================================================
// Reads
// ============================================================================

/// Balance response.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// User ID.
    pub user_id: String,
    /// Current balance.
    pub points: i64,
}

/// Transaction history page.
#[derive(Debug, Clone, Deserialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionInfo>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// Health check response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
}

// ============================================================================
// Errors
// ============================================================================

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}
