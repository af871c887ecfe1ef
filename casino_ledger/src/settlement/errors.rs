//! Settlement error types.

use crate::game::WagerParseError;
use crate::ledger::{Cents, LedgerError};
use thiserror::Error;

/// Stake placement and settlement errors
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The user already has a stake waiting to be settled
    #[error("Your previous bet #{queue_id} is still being played")]
    BetPending { queue_id: i64 },

    #[error("Bet must be between {min} and {max}, got {requested}")]
    BetOutOfRange { min: Cents, max: Cents, requested: Cents },

    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Cents, required: Cents },

    #[error("Insufficient bonus funds: available {available}, required {required}")]
    InsufficientBonus { available: Cents, required: Cents },

    #[error("Invalid wager: {0}")]
    InvalidWager(#[from] WagerParseError),

    /// Entry was no longer pending when its result was applied
    #[error("Queue entry {0} was already processed")]
    AlreadySettled(i64),

    #[error("Settlement worker is not running")]
    WorkerStopped,
}

impl SettlementError {
    pub fn client_message(&self) -> String {
        match self {
            SettlementError::Database(_) => "Internal server error".to_string(),
            SettlementError::Ledger(err) => err.client_message(),
            SettlementError::AlreadySettled(_) | SettlementError::WorkerStopped => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for settlement operations
pub type SettlementResult<T> = Result<T, SettlementError>;
