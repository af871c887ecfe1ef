//! Settlement queue data models.

use crate::game::{GameOutcome, Rolls, Wager};
use crate::ledger::{Cents, UserId};
use crate::wagering::WagerProgress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Queue entry state. Entries never go back to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processed,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Pending => write!(f, "pending"),
            QueueStatus::Processed => write!(f, "processed"),
        }
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "processed" => Ok(QueueStatus::Processed),
            other => Err(format!("unknown queue status '{}'", other)),
        }
    }
}

/// A funded stake waiting for (or done with) settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub user_id: UserId,
    pub amount: Cents,
    pub game: String,
    pub bet_type: String,
    pub is_bonus_bet: bool,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
}

/// Which pool a stake is paid from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Funding {
    /// Clean main balance
    Main,
    /// Locked bonus pool
    Bonus,
}

/// Accepted stake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetReceipt {
    pub queue_id: i64,
    pub user_id: UserId,
    pub amount: Cents,
    pub wager: Wager,
    pub funding: Funding,
    pub wagering: WagerProgress,
}

/// Result of settling one queue entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledBet {
    pub queue_id: i64,
    pub user_id: UserId,
    pub stake: Cents,
    pub wager: Wager,
    pub rolls: Rolls,
    pub outcome: GameOutcome,
    pub is_bonus_bet: bool,
    /// Referrer credited and the amount
    pub referral_reward: Option<(UserId, Cents)>,
}
