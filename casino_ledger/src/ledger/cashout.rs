//! Cash-out gateway seam.
//!
//! The ledger debits first, then asks the gateway to turn the debit into an
//! external payment artifact. A gateway error makes the ledger restore the
//! debit.

use super::models::{Cents, UserId};
use async_trait::async_trait;
use thiserror::Error;

/// External payment artifact handed to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashoutArtifact {
    pub reference: String,
    pub claim_url: Option<String>,
}

/// Gateway failures
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),

    #[error("treasury holds {available}, payout needs {required}")]
    InsufficientTreasury { available: Cents, required: Cents },

    #[error("payout rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait CashoutGateway: Send + Sync {
    /// Create a payout artifact worth `amount` for `user_id`.
    async fn create_payout(
        &self,
        user_id: UserId,
        amount: Cents,
        description: &str,
    ) -> Result<CashoutArtifact, GatewayError>;
}

/// Gateway for operators who settle payouts by hand.
///
/// Issues an opaque reference that support staff match against the
/// `withdrawals` table.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualPayoutGateway;

#[async_trait]
impl CashoutGateway for ManualPayoutGateway {
    async fn create_payout(
        &self,
        user_id: UserId,
        amount: Cents,
        description: &str,
    ) -> Result<CashoutArtifact, GatewayError> {
        let reference = format!("manual-{}", uuid::Uuid::new_v4().simple());
        log::info!(
            "Manual payout {} queued for user {}: {} ({})",
            reference,
            user_id,
            super::models::format_cents(amount),
            description
        );
        Ok(CashoutArtifact {
            reference,
            claim_url: None,
        })
    }
}
