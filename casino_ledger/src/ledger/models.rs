//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Chat-platform user ID
pub type UserId = i64;

/// Money in minor units (1/100 of the display currency)
pub type Cents = i64;

/// Render cents as a decimal string, `-1234` -> `"-12.34"`.
pub fn format_cents(amount: Cents) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Account model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub balance: Cents,
    /// Locked part of `balance`, released by the wagering engine
    pub bonus_balance: Cents,
    pub wager_left: Cents,
    pub wager_total: Cents,
    pub ref_balance: Cents,
    pub ref_earnings: Cents,
    pub ref_count: i64,
    pub referrer_id: Option<UserId>,
    pub last_claimed_turnover: Cents,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Spendable main balance, excluding locked bonus funds.
    pub fn clean_balance(&self) -> Cents {
        (self.balance - self.bonus_balance).max(0)
    }

    /// Bonus funds that can actually back a bonus-funded stake.
    pub fn spendable_bonus(&self) -> Cents {
        self.bonus_balance.min(self.balance).max(0)
    }
}

/// Ledger entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Stake placed (negative)
    Game,
    /// Stake handed back for a bet that was never played
    StakeRefund,
    /// Settled winnings
    Win,
    Bonus,
    VoucherCreate,
    VoucherRedeem,
    VoucherRefund,
    Withdrawal,
    WithdrawalRefund,
    Adjustment,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Game => write!(f, "game"),
            TransactionKind::StakeRefund => write!(f, "stake_refund"),
            TransactionKind::Win => write!(f, "win"),
            TransactionKind::Bonus => write!(f, "bonus"),
            TransactionKind::VoucherCreate => write!(f, "voucher_create"),
            TransactionKind::VoucherRedeem => write!(f, "voucher_redeem"),
            TransactionKind::VoucherRefund => write!(f, "voucher_refund"),
            TransactionKind::Withdrawal => write!(f, "withdrawal"),
            TransactionKind::WithdrawalRefund => write!(f, "withdrawal_refund"),
            TransactionKind::Adjustment => write!(f, "adjustment"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "game" => Ok(TransactionKind::Game),
            "stake_refund" => Ok(TransactionKind::StakeRefund),
            "win" => Ok(TransactionKind::Win),
            "bonus" => Ok(TransactionKind::Bonus),
            "voucher_create" => Ok(TransactionKind::VoucherCreate),
            "voucher_redeem" => Ok(TransactionKind::VoucherRedeem),
            "voucher_refund" => Ok(TransactionKind::VoucherRefund),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "withdrawal_refund" => Ok(TransactionKind::WithdrawalRefund),
            "adjustment" => Ok(TransactionKind::Adjustment),
            other => Err(format!("unknown transaction kind '{}'", other)),
        }
    }
}

/// Append-only ledger record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: UserId,
    pub amount: Cents,
    pub kind: TransactionKind,
    pub game: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregated play statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_games: i64,
    pub wins: i64,
    pub losses: i64,
    /// Sum of played stakes; refunded ones are netted out
    pub turnover: Cents,
    pub total_won: Cents,
    /// Sum of stakes on settled losing bets
    pub total_lost: Cents,
}

/// Which balance a withdrawal draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalSource {
    Main,
    Referral,
}

impl std::fmt::Display for WithdrawalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalSource::Main => write!(f, "main"),
            WithdrawalSource::Referral => write!(f, "referral"),
        }
    }
}

/// Withdrawal lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Processed,
    Cancelled,
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalStatus::Pending => write!(f, "pending"),
            WithdrawalStatus::Processed => write!(f, "processed"),
            WithdrawalStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Completed withdrawal with the payment artifact the user can claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub withdrawal_id: i64,
    pub user_id: UserId,
    pub amount: Cents,
    pub source: WithdrawalSource,
    pub reference: String,
    pub claim_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(1000), "10.00");
        assert_eq!(format_cents(-1234), "-12.34");
    }

    #[test]
    fn test_transaction_kind_round_trips_through_db_string() {
        for kind in [
            TransactionKind::Game,
            TransactionKind::VoucherRedeem,
            TransactionKind::WithdrawalRefund,
        ] {
            assert_eq!(kind.to_string().parse::<TransactionKind>().unwrap(), kind);
        }
        assert!("deposit".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_clean_balance_never_negative() {
        let account = Account {
            user_id: 1,
            username: None,
            full_name: None,
            balance: 300,
            bonus_balance: 500,
            wager_left: 0,
            wager_total: 0,
            ref_balance: 0,
            ref_earnings: 0,
            ref_count: 0,
            referrer_id: None,
            last_claimed_turnover: 0,
            created_at: Utc::now(),
        };
        assert_eq!(account.clean_balance(), 0);
        assert_eq!(account.spendable_bonus(), 300);
    }
}
