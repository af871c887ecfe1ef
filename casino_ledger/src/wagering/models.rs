//! Wagering data models.

use crate::ledger::Cents;
use serde::{Deserialize, Serialize};

/// Snapshot of a user's bonus lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WageringInfo {
    pub bonus_balance: Cents,
    pub wager_left: Cents,
    /// Original requirement; equals `wager_left` for rows that predate it
    pub wager_total: Cents,
}

impl WageringInfo {
    pub fn is_locked(&self) -> bool {
        self.wager_left > 0
    }

    /// Stake volume already counted against the requirement.
    pub fn wagered(&self) -> Cents {
        (self.wager_total - self.wager_left).max(0)
    }
}

/// Result of counting a stake against the requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerProgress {
    /// Remaining requirement after this stake
    pub wager_left: Cents,
    /// The stake finished the requirement and the bonus pool was released
    pub released: bool,
}
