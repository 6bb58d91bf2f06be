//! Registration, balance and history handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use points_core::{Transaction, User, UserId};
use points_engine::{BonusOutcome, RegisterUser};
use points_store::Store;

use crate::error::ApiError;
use crate::state::AppState;

/// Largest page the history endpoint returns.
const MAX_PAGE_SIZE: usize = 100;

/// Parse a user ID from a path or body field.
pub(crate) fn parse_user_id(field: &str, raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {field}: {raw}")))
}

// ============================================================================
// Registration
// ============================================================================

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Referral code of the inviting user.
    pub referral_code: Option<String>,
}

/// A registered user.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    /// User ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
    /// Code other users register with.
    pub referral_code: String,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            referral_code: user.referral_code.clone(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Registration response.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    /// The new user.
    pub user: UserResponse,
    /// Starting balance.
    pub points: i64,
    /// Referrer, if a referral code was used.
    pub referrer_id: Option<String>,
    /// What the referral signup bonus did.
    pub referral_bonus: BonusOutcome,
}

/// Register a user.
pub async fn register<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let Json(body) = body?;
    let cmd = RegisterUser::new(body.name, body.email, body.referral_code)?;

    let registration = state.ledger.register_user(cmd).await?;

    Ok(Json(RegisterResponse {
        user: UserResponse::from(&registration.user),
        points: registration.account.points,
        referrer_id: registration.referrer_id.map(|id| id.to_string()),
        referral_bonus: registration.referral_bonus,
    }))
}

// ============================================================================
// Balance
// ============================================================================

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// User ID.
    pub user_id: String,
    /// Current balance.
    pub points: i64,
}

/// Get a user's balance.
pub async fn get_balance<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = parse_user_id("user_id", &user_id)?;
    let points = state.ledger.balance(user_id).await?;

    Ok(Json(BalanceResponse {
        user_id: user_id.to_string(),
        points,
    }))
}

// ============================================================================
// Transactions
// ============================================================================

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of transactions to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Transaction response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: i64,
    /// Sender.
    pub user_id: String,
    /// Recipient.
    pub recipient_user_id: String,
    /// Points moved.
    pub points: i64,
    /// Effect on the listed user (negative when sent).
    pub delta: i64,
    /// Timestamp.
    pub created_at: String,
}

impl TransactionResponse {
    /// Describe `tx` from the point of view of `user_id`.
    #[must_use]
    pub fn for_user(tx: &Transaction, user_id: &UserId) -> Self {
        Self {
            id: tx.id.value(),
            user_id: tx.user_id.to_string(),
            recipient_user_id: tx.recipient_user_id.to_string(),
            points: tx.points,
            delta: tx.delta_for(user_id),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List a user's transfer history.
pub async fn list_transactions<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    let user_id = parse_user_id("user_id", &user_id)?;

    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(MAX_PAGE_SIZE);
    let transactions = state
        .ledger
        .transactions(user_id, limit + 1, query.offset)
        .await?;

    let has_more = transactions.len() > limit;
    let transactions = transactions
        .iter()
        .take(limit)
        .map(|tx| TransactionResponse::for_user(tx, &user_id))
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}
