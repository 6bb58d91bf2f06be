//! Points transfer handler.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use points_engine::{BonusOutcome, TransferPoints};
use points_store::Store;

use super::users::{parse_user_id, TransactionResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Transfer request.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// Sender.
    pub user_id: Option<String>,
    /// Recipient.
    pub recipient_user_id: Option<String>,
    /// Points to move.
    pub points: Option<i64>,
}

/// Transfer response.
#[derive(Debug, Serialize)]
pub struct TransferResponse {
    /// The logged transfer, from the sender's side.
    pub transaction: TransactionResponse,
    /// Sender balance after the transfer.
    pub balance: i64,
    /// What the spend threshold bonus did.
    pub threshold_bonus: BonusOutcome,
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::BadRequest(format!("missing required field: {field}")))
}

/// Transfer points between users.
pub async fn transfer<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferResponse>, ApiError> {
    let Json(body) = body?;

    let sender = parse_user_id("user_id", &required("user_id", body.user_id)?)?;
    let recipient = parse_user_id(
        "recipient_user_id",
        &required("recipient_user_id", body.recipient_user_id)?,
    )?;
    let points = required("points", body.points)?;
    let cmd = TransferPoints::new(sender, recipient, points)?;

    let receipt = state.ledger.transfer_points(cmd).await?;

    Ok(Json(TransferResponse {
        transaction: TransactionResponse::for_user(&receipt.transaction, &sender),
        balance: receipt.sender_balance,
        threshold_bonus: receipt.threshold_bonus,
    }))
}
