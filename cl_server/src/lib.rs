//! HTTP front for the casino ledger.
//!
//! Exposes accounts, vouchers, stake placement and cash-out to the chat
//! front-end, and owns the settlement worker for the life of the process.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
