//! Account ledger: balances, bonus pool, referral balance, transaction
//! history and cash-out.

pub mod cashout;
pub mod errors;
pub mod manager;
pub mod models;
pub mod store;

pub use cashout::{CashoutArtifact, CashoutGateway, GatewayError, ManualPayoutGateway};
pub use errors::{LedgerError, LedgerResult};
pub use manager::LedgerManager;
pub use models::{
    Account, Cents, LedgerEntry, TransactionKind, UserId, UserStats, WithdrawalReceipt,
    WithdrawalSource, WithdrawalStatus, format_cents,
};
