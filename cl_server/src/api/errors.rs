//! Mapping from ledger errors to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use casino_ledger::{LedgerError, SettlementError, VoucherError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable code for the chat front-end
    pub code: &'static str,
}

/// Any failure a handler can return
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Voucher(#[from] VoucherError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Ledger(err) => ledger_status(err),
            ApiError::Voucher(err) => match err {
                VoucherError::Database(_) | VoucherError::HashingFailed => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal")
                }
                VoucherError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "account_not_found"),
                VoucherError::CheckNotFound(_) => (StatusCode::NOT_FOUND, "voucher_not_found"),
                VoucherError::InsufficientFunds { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_funds")
                }
                VoucherError::CheckAlreadyActivated => (StatusCode::CONFLICT, "already_activated"),
                VoucherError::CheckAlreadyCashed => (StatusCode::CONFLICT, "already_cashed"),
                VoucherError::CheckPermission => (StatusCode::FORBIDDEN, "not_creator"),
                VoucherError::NotTargetUser => (StatusCode::FORBIDDEN, "not_target_user"),
                VoucherError::PremiumRequired => (StatusCode::FORBIDDEN, "premium_required"),
                VoucherError::WrongPassword => (StatusCode::FORBIDDEN, "wrong_password"),
                VoucherError::TurnoverTooLow { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "turnover_too_low")
                }
                VoucherError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_voucher"),
            },
            ApiError::Settlement(err) => match err {
                SettlementError::Ledger(inner) => ledger_status(inner),
                SettlementError::Database(_)
                | SettlementError::AlreadySettled(_)
                | SettlementError::WorkerStopped => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
                SettlementError::BetPending { .. } => (StatusCode::CONFLICT, "bet_pending"),
                SettlementError::BetOutOfRange { .. } => (StatusCode::BAD_REQUEST, "bet_out_of_range"),
                SettlementError::InsufficientFunds { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_funds")
                }
                SettlementError::InsufficientBonus { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_bonus")
                }
                SettlementError::InvalidWager(_) => (StatusCode::BAD_REQUEST, "invalid_wager"),
            },
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::Ledger(err) => err.client_message(),
            ApiError::Voucher(err) => err.client_message(),
            ApiError::Settlement(err) => err.client_message(),
        }
    }
}

fn ledger_status(err: &LedgerError) -> (StatusCode, &'static str) {
    match err {
        LedgerError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        LedgerError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "account_not_found"),
        LedgerError::InsufficientFunds { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_funds")
        }
        LedgerError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "invalid_amount"),
        LedgerError::BelowMinimum { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "below_minimum"),
        LedgerError::NoBonusAvailable => (StatusCode::CONFLICT, "no_bonus_available"),
        LedgerError::Gateway(_) => (StatusCode::BAD_GATEWAY, "cashout_failed"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code = code, "Request failed: {}", self);
        }

        let body = ErrorResponse {
            error: self.client_message(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_hide_details() {
        let err = ApiError::from(LedgerError::Database(sqlx::Error::RowNotFound));
        assert_eq!(err.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_voucher_conflicts() {
        let err = ApiError::from(VoucherError::CheckAlreadyCashed);
        assert_eq!(err.status_and_code(), (StatusCode::CONFLICT, "already_cashed"));
    }

    #[test]
    fn test_settlement_wraps_ledger_status() {
        let err = ApiError::from(SettlementError::Ledger(LedgerError::AccountNotFound(3)));
        assert_eq!(err.status_and_code(), (StatusCode::NOT_FOUND, "account_not_found"));
    }

    #[test]
    fn test_pending_bet_is_conflict() {
        let err = ApiError::from(SettlementError::BetPending { queue_id: 9 });
        assert_eq!(err.status_and_code().1, "bet_pending");
        assert!(err.client_message().contains("#9"));
    }
}
