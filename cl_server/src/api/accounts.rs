//! Account, history and cash-out handlers.
//!
//! # Examples
//!
//! Register a user referred by account 42:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/accounts \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"user_id": 1001, "username": "alice", "referrer_id": 42}'
//! ```
//!
//! Withdraw $12.00:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/accounts/1001/withdrawals \
//!   -H "Authorization: Bearer TOKEN" \
//!   -d '{"amount": 1200}'
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use casino_ledger::ledger::{
    Account, Cents, LedgerEntry, LedgerResult, UserId, UserStats, WithdrawalReceipt,
    WithdrawalSource,
};
use casino_ledger::wagering::WageringInfo;
use serde::{Deserialize, Serialize};

use super::{AppState, errors::ApiResult};
use crate::{logging::log_money_event, metrics};

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub user_id: UserId,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub referrer_id: Option<UserId>,
}

#[derive(Debug, Serialize)]
pub struct CreateAccountResponse {
    pub created: bool,
    pub account: AccountResponse,
}

/// Account with the derived balances the front-end displays
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    #[serde(flatten)]
    pub account: Account,
    pub clean_balance: Cents,
    pub spendable_bonus: Cents,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            clean_balance: account.clean_balance(),
            spendable_bonus: account.spendable_bonus(),
            account,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct WageringResponse {
    #[serde(flatten)]
    pub info: WageringInfo,
    pub locked: bool,
    pub wagered: Cents,
}

#[derive(Debug, Serialize)]
pub struct TurnoverBonusResponse {
    pub credited: Cents,
    pub balance: Cents,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: Cents,
}

/// Register an account. Repeating the call for an existing user is a no-op
/// that returns `200 OK` with `created: false`.
///
/// # Errors
///
/// - `500 Internal Server Error`: Database error
pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> ApiResult<(StatusCode, Json<CreateAccountResponse>)> {
    let created = state
        .ledger
        .create_account(
            request.user_id,
            request.username.as_deref(),
            request.full_name.as_deref(),
            request.referrer_id,
        )
        .await?;
    let account = state.ledger.get_account(request.user_id).await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(CreateAccountResponse {
            created,
            account: account.into(),
        }),
    ))
}

/// # Errors
///
/// - `404 Not Found`: No such account
pub async fn get_account(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<AccountResponse>> {
    let account = state.ledger.get_account(user_id).await?;
    Ok(Json(account.into()))
}

/// Most recent ledger entries, newest first. `limit` defaults to 20, max 100.
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<LedgerEntry>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let entries = state.ledger.get_transactions(user_id, limit).await?;
    Ok(Json(entries))
}

pub async fn get_stats(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<UserStats>> {
    let stats = state.ledger.user_stats(user_id).await?;
    Ok(Json(stats))
}

/// Bonus pool and remaining stake volume before it is released.
///
/// # Errors
///
/// - `404 Not Found`: No such account
pub async fn get_wagering(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<WageringResponse>> {
    let info = state.wagering.wagering_info(user_id).await?;
    Ok(Json(WageringResponse {
        locked: info.is_locked(),
        wagered: info.wagered(),
        info,
    }))
}

/// Pay every turnover milestone reached since the last claim.
///
/// # Errors
///
/// - `409 Conflict`: No new milestone reached
/// - `404 Not Found`: No such account
pub async fn claim_turnover_bonus(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<TurnoverBonusResponse>> {
    let credited = state.ledger.claim_turnover_bonus(user_id).await?;
    let balance = state.ledger.get_account(user_id).await?.balance;
    log_money_event("turnover_bonus", user_id, credited);

    Ok(Json(TurnoverBonusResponse { credited, balance }))
}

/// Cash out part of the clean balance.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Below the minimum or above the clean balance
/// - `502 Bad Gateway`: Payment provider failed; the balance was restored
pub async fn withdraw(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(request): Json<WithdrawRequest>,
) -> ApiResult<Json<WithdrawalReceipt>> {
    let result = state
        .ledger
        .withdraw(user_id, request.amount, state.gateway.as_ref())
        .await;
    Ok(Json(record_withdrawal(WithdrawalSource::Main, user_id, result)?))
}

/// Cash out the whole referral balance.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Referral balance below the minimum
/// - `502 Bad Gateway`: Payment provider failed; the balance was restored
pub async fn withdraw_referral(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<WithdrawalReceipt>> {
    let result = state
        .ledger
        .withdraw_referral_balance(user_id, state.gateway.as_ref())
        .await;
    Ok(Json(record_withdrawal(WithdrawalSource::Referral, user_id, result)?))
}

fn record_withdrawal(
    source: WithdrawalSource,
    user_id: UserId,
    result: LedgerResult<WithdrawalReceipt>,
) -> LedgerResult<WithdrawalReceipt> {
    let source_label = source.to_string();
    match &result {
        Ok(receipt) => {
            metrics::withdrawal(&source_label, true);
            log_money_event(&format!("withdraw_{}", source_label), user_id, receipt.amount);
        }
        Err(casino_ledger::LedgerError::Gateway(reason)) => {
            metrics::withdrawal(&source_label, false);
            tracing::warn!(user_id = user_id, "Cash-out failed, funds restored: {}", reason);
        }
        Err(_) => {}
    }
    result
}
