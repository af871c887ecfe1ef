//! Bet placement and asynchronous settlement.
//!
//! Placement debits the stake and appends a queue entry in one transaction.
//! A single worker then settles entries in insertion order, crediting
//! winnings and referral rewards before marking each entry processed.

pub mod actor;
pub mod errors;
pub mod manager;
pub mod messages;
pub mod models;
pub mod outcome;
pub mod queue;

pub use actor::{SettlementActor, SettlementHandle};
pub use errors::{SettlementError, SettlementResult};
pub use manager::BetManager;
pub use messages::{DrainReport, SettlementMessage};
pub use models::{BetReceipt, Funding, QueueEntry, QueueStatus, SettledBet};
pub use outcome::{BetObserver, OutcomeSource, RandomOutcomeSource};
pub use queue::BetQueue;
