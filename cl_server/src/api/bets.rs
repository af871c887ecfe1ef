//! Stake placement.
//!
//! Placing a stake only debits and enqueues it; the result arrives later
//! through the notifier once the settlement worker reaches it.
//!
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/bets \
//!   -H "Authorization: Bearer TOKEN" \
//!   -d '{"user_id": 1001, "amount": 500, "game": "cube", "bet": "even"}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use casino_ledger::{
    Wager,
    ledger::{Cents, UserId},
    settlement::{BetReceipt, Funding, QueueEntry, SettlementError},
};
use serde::{Deserialize, Serialize};

use super::{AppState, errors::ApiResult};
use crate::{logging::log_money_event, metrics};

#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    pub user_id: UserId,
    pub amount: Cents,
    pub game: String,
    pub bet: String,
    #[serde(default = "default_funding")]
    pub funding: Funding,
}

fn default_funding() -> Funding {
    Funding::Main
}

#[derive(Debug, Serialize)]
pub struct PendingBetResponse {
    pub pending: Option<QueueEntry>,
}

/// Fund a stake and queue it for settlement.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown game or bet, or amount outside the limits
/// - `409 Conflict`: The previous stake is still being played
/// - `422 Unprocessable Entity`: Not enough clean balance or bonus
pub async fn place_bet(
    State(state): State<AppState>,
    Json(request): Json<PlaceBetRequest>,
) -> ApiResult<(StatusCode, Json<BetReceipt>)> {
    let wager = Wager::parse(&request.game, &request.bet).map_err(SettlementError::from)?;

    let receipt = state
        .bets
        .place_bet(request.user_id, request.amount, &wager, request.funding)
        .await?;

    let funding = match receipt.funding {
        Funding::Main => "main",
        Funding::Bonus => "bonus",
    };
    metrics::bet_placed(wager.game_key(), funding);
    log_money_event("stake", receipt.user_id, receipt.amount);

    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

pub async fn pending_bet(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<PendingBetResponse>> {
    let pending = state.bets.pending_bet(user_id).await?;
    Ok(Json(PendingBetResponse { pending }))
}
