//! # Casino Ledger
//!
//! The money core of a chat betting service. All amounts are integer cents
//! and every multi-step money movement runs inside one exclusive SQLite
//! transaction.
//!
//! ## Core Modules
//!
//! - [`ledger`]: Account balances, bonus pool, referral balance, history and cash-out
//! - [`wagering`]: Bonus lock and the stake volume required to release it
//! - [`voucher`]: Single-use, multi-use and targeted value vouchers
//! - [`settlement`]: Stake placement and the single-consumer settlement worker
//! - [`game`]: Wager catalogue and payout tables
//!
//! ## Example
//!
//! ```
//! use casino_ledger::wagering::requirement_for;
//! use rust_decimal_macros::dec;
//!
//! // A $5.00 bonus at x2 must be wagered $10.00 before it is released
//! assert_eq!(requirement_for(500, dec!(2)), 1000);
//! ```

/// Database pool, schema and exclusive transactions.
pub mod db;
pub use db::{Database, DatabaseConfig, ImmediateTransaction};

/// Wager catalogue and payout tables.
pub mod game;
pub use game::{GameOutcome, Rolls, Wager};

pub mod ledger;
pub use ledger::{Account, Cents, LedgerError, LedgerManager, UserId};

pub mod notify;
pub use notify::{LogNotifier, Notifier, Recipient};

/// Tunables loaded from the environment.
pub mod settings;
pub use settings::{BetLimits, LedgerSettings, SettlementSettings, VoucherPolicy};

pub mod settlement;
pub use settlement::{BetManager, Funding, SettlementActor, SettlementError, SettlementHandle};

pub mod voucher;
pub use voucher::{NewVoucher, VoucherError, VoucherManager};

pub mod wagering;
pub use wagering::WageringEngine;
