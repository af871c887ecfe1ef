//! Voucher error types.

use crate::ledger::{Cents, LedgerError, UserId};
use thiserror::Error;

/// Voucher errors
#[derive(Debug, Error)]
pub enum VoucherError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Account not found for user {0}")]
    AccountNotFound(UserId),

    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Cents, required: Cents },

    #[error("Voucher {0} not found")]
    CheckNotFound(String),

    #[error("You have already activated this voucher")]
    CheckAlreadyActivated,

    #[error("Voucher has already been cashed")]
    CheckAlreadyCashed,

    /// Requester is not allowed to manage this voucher
    #[error("Only the creator can manage this voucher")]
    CheckPermission,

    #[error("Invalid voucher: {0}")]
    Validation(String),

    #[error("This voucher is addressed to another user")]
    NotTargetUser,

    #[error("Wrong voucher password")]
    WrongPassword,

    #[error("This voucher requires a premium account")]
    PremiumRequired,

    #[error("This voucher requires a turnover of {required}, you have {current}")]
    TurnoverTooLow { required: Cents, current: Cents },

    #[error("Failed to hash voucher password")]
    HashingFailed,
}

impl VoucherError {
    /// Text for the chat reply
    pub fn client_message(&self) -> String {
        match self {
            VoucherError::Database(_) => "Internal server error".to_string(),
            VoucherError::AccountNotFound(_) => "Account not found".to_string(),
            VoucherError::CheckNotFound(_) => "Voucher not found".to_string(),
            VoucherError::HashingFailed => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<LedgerError> for VoucherError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Database(db) => VoucherError::Database(db),
            LedgerError::AccountNotFound(user_id) => VoucherError::AccountNotFound(user_id),
            LedgerError::InsufficientFunds {
                available,
                required,
            } => VoucherError::InsufficientFunds {
                available,
                required,
            },
            other => VoucherError::Validation(other.to_string()),
        }
    }
}

/// Result type for voucher operations
pub type VoucherResult<T> = Result<T, VoucherError>;
