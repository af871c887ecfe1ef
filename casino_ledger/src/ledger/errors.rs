//! Ledger error types.

use super::models::{Cents, UserId};
use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Account not found
    #[error("Account not found for user {0}")]
    AccountNotFound(UserId),

    /// Not enough clean (non-bonus) balance
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Cents, required: Cents },

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(Cents),

    /// Amount under the configured minimum for the operation
    #[error("Amount {requested} is below the minimum of {minimum}")]
    BelowMinimum { minimum: Cents, requested: Cents },

    /// No turnover milestone reached since the last claim
    #[error("No turnover bonus available yet")]
    NoBonusAvailable,

    /// Cash-out gateway refused or failed; the debit was restored
    #[error("Cash-out failed: {0}")]
    Gateway(String),
}

impl LedgerError {
    /// Message safe to show a chat user; storage failures are not echoed
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) => "Internal server error".to_string(),
            LedgerError::AccountNotFound(_) => "Account not found".to_string(),
            LedgerError::Gateway(_) => "Cash-out is temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
