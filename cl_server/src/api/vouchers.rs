//! Voucher handlers.
//!
//! # Examples
//!
//! Create a $10.00 voucher shared by four people:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/vouchers \
//!   -H "Authorization: Bearer TOKEN" \
//!   -d '{"creator_id": 1001, "amount": 1000, "kind": "multi", "activations_total": 4}'
//! ```
//!
//! Redeem it:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/vouchers/<id>/redeem \
//!   -H "Authorization: Bearer TOKEN" \
//!   -d '{"redeemer_id": 2002, "is_premium": false}'
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use casino_ledger::ledger::{Cents, UserId};
use casino_ledger::voucher::{
    NewVoucher, RedeemContext, Redemption, Voucher, VoucherKind, VoucherManager, VoucherSetting,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AppState, errors::ApiResult};
use crate::{logging::log_money_event, metrics};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct CreateVoucherRequest {
    pub creator_id: UserId,
    pub amount: Cents,
    #[serde(default = "default_kind")]
    pub kind: VoucherKind,
    pub target_user_id: Option<UserId>,
    pub activations_total: Option<i64>,
    pub comment: Option<String>,
}

fn default_kind() -> VoucherKind {
    VoucherKind::Single
}

impl From<CreateVoucherRequest> for NewVoucher {
    fn from(request: CreateVoucherRequest) -> Self {
        NewVoucher {
            creator_id: request.creator_id,
            amount: request.amount,
            kind: request.kind,
            target_user_id: request.target_user_id,
            activations_total: request.activations_total.unwrap_or(1),
            comment: request.comment,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VoucherResponse {
    #[serde(flatten)]
    pub voucher: Voucher,
    pub remaining_activations: i64,
    /// Amount one redemption credits to a non-creator
    pub per_activation: Cents,
}

impl From<Voucher> for VoucherResponse {
    fn from(voucher: Voucher) -> Self {
        let per_activation =
            VoucherManager::per_activation_amount(voucher.amount, voucher.activations_total);
        Self {
            remaining_activations: voucher.remaining_activations(),
            per_activation,
            voucher,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub redeemer_id: UserId,
    #[serde(default)]
    pub is_premium: bool,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequesterQuery {
    pub requester_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct DeleteVoucherResponse {
    pub voucher_id: String,
    pub refunded: Cents,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub requester_id: UserId,
    #[serde(flatten)]
    pub setting: VoucherSetting,
}

#[derive(Debug, Deserialize)]
pub struct SetWageringRequest {
    /// Decimal string, e.g. `"2"` or `"1.5"`. `"0"` disables it.
    pub multiplier: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct VoucherListResponse {
    pub vouchers: Vec<VoucherResponse>,
    pub active_count: i64,
}

/// Create a voucher, escrowing its face value from the creator's clean balance.
///
/// # Errors
///
/// - `400 Bad Request`: Invalid amount, activation count or target
/// - `404 Not Found`: Unknown creator
/// - `422 Unprocessable Entity`: Face value exceeds the clean balance
pub async fn create_voucher(
    State(state): State<AppState>,
    Json(request): Json<CreateVoucherRequest>,
) -> ApiResult<(StatusCode, Json<VoucherResponse>)> {
    let voucher = state.vouchers.create_voucher(request.into()).await?;

    metrics::voucher_created(&voucher.kind.to_string());
    log_money_event("voucher_escrow", voucher.creator_id, voucher.amount);

    Ok((StatusCode::CREATED, Json(voucher.into())))
}

pub async fn get_voucher(
    State(state): State<AppState>,
    Path(voucher_id): Path<String>,
) -> ApiResult<Json<VoucherResponse>> {
    let voucher = state.vouchers.get_voucher(&voucher_id).await?;
    Ok(Json(voucher.into()))
}

/// Redeem a voucher after checking target, premium, turnover and password gates.
///
/// # Errors
///
/// - `403 Forbidden`: A gate rejected the redeemer
/// - `404 Not Found`: No such voucher
/// - `409 Conflict`: Already activated by this user, or used up
pub async fn redeem_voucher(
    State(state): State<AppState>,
    Path(voucher_id): Path<String>,
    Json(request): Json<RedeemRequest>,
) -> ApiResult<Json<Redemption>> {
    let ctx = RedeemContext {
        is_premium: request.is_premium,
        password: request.password,
    };
    let redemption = state
        .vouchers
        .redeem_voucher_gated(&voucher_id, request.redeemer_id, &ctx)
        .await?;

    metrics::voucher_redeemed(redemption.credited_to_bonus);
    log_money_event("voucher_redeem", redemption.redeemer_id, redemption.credited);

    Ok(Json(redemption))
}

/// Delete an active voucher and refund what has not been redeemed.
///
/// # Errors
///
/// - `403 Forbidden`: Requester is not the creator
/// - `409 Conflict`: Voucher already used up
pub async fn delete_voucher(
    State(state): State<AppState>,
    Path(voucher_id): Path<String>,
    Query(query): Query<RequesterQuery>,
) -> ApiResult<Json<DeleteVoucherResponse>> {
    let refunded = state
        .vouchers
        .delete_voucher_with_refund(&voucher_id, query.requester_id)
        .await?;
    log_money_event("voucher_refund", query.requester_id, refunded);

    Ok(Json(DeleteVoucherResponse {
        voucher_id,
        refunded,
    }))
}

/// Change one creator-managed option.
///
/// Body: `{"requester_id": 1, "setting": "premium_only", "value": true}`
pub async fn update_setting(
    State(state): State<AppState>,
    Path(voucher_id): Path<String>,
    Json(request): Json<UpdateSettingRequest>,
) -> ApiResult<Json<VoucherResponse>> {
    let voucher = state
        .vouchers
        .update_voucher_setting(&voucher_id, request.requester_id, request.setting)
        .await?;
    Ok(Json(voucher.into()))
}

/// Operator control over the bonus lock applied to future redemptions.
pub async fn set_wagering(
    State(state): State<AppState>,
    Path(voucher_id): Path<String>,
    Json(request): Json<SetWageringRequest>,
) -> ApiResult<Json<VoucherResponse>> {
    let voucher = state
        .vouchers
        .set_wagering_multiplier(&voucher_id, request.multiplier)
        .await?;
    tracing::info!(
        voucher_id = %voucher_id,
        multiplier = %request.multiplier,
        "Voucher wagering multiplier changed"
    );
    Ok(Json(voucher.into()))
}

pub async fn list_user_vouchers(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<VoucherListResponse>> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = page.offset.unwrap_or(0).max(0);

    let vouchers = state
        .vouchers
        .list_user_vouchers(user_id, limit, offset)
        .await?;
    let active_count = state.vouchers.count_active_vouchers(user_id).await?;

    Ok(Json(VoucherListResponse {
        vouchers: vouchers.into_iter().map(VoucherResponse::from).collect(),
        active_count,
    }))
}
