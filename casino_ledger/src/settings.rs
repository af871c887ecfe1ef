//! Tunable money rules, read from the environment with sane defaults.
//!
//! | Variable | Default |
//! |---|---|
//! | `MIN_BET_CENTS` | 30 |
//! | `MAX_BET_CENTS` | 100000 |
//! | `MIN_WITHDRAWAL_CENTS` | 200 |
//! | `MIN_REF_WITHDRAWAL_CENTS` | 300 |
//! | `REFERRAL_SHARE_PERCENT` | 15 |
//! | `TURNOVER_BONUS_STEP_CENTS` | 100000 |
//! | `TURNOVER_BONUS_CENTS` | 750 |
//! | `SETTLEMENT_PACING_MS` | 2000 |
//! | `CREATOR_REDEEMS_FULL_FACE` | true |

use crate::ledger::Cents;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Parse an environment variable, falling back to `default` when it is unset
/// or malformed.
pub(crate) fn env_or<T: FromStr + Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid {}={:?}, using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Cash-out and loyalty rules for the account ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    pub min_withdrawal: Cents,
    pub min_ref_withdrawal: Cents,
    /// Turnover needed per bonus milestone
    pub turnover_bonus_step: Cents,
    /// Credit per milestone reached
    pub turnover_bonus_amount: Cents,
}

impl LedgerSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_withdrawal: env_or("MIN_WITHDRAWAL_CENTS", defaults.min_withdrawal),
            min_ref_withdrawal: env_or("MIN_REF_WITHDRAWAL_CENTS", defaults.min_ref_withdrawal),
            turnover_bonus_step: env_or("TURNOVER_BONUS_STEP_CENTS", defaults.turnover_bonus_step),
            turnover_bonus_amount: env_or("TURNOVER_BONUS_CENTS", defaults.turnover_bonus_amount),
        }
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            min_withdrawal: 200,
            min_ref_withdrawal: 300,
            turnover_bonus_step: 100_000,
            turnover_bonus_amount: 750,
        }
    }
}

/// Accepted stake range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetLimits {
    pub min_bet: Cents,
    pub max_bet: Cents,
}

impl BetLimits {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_bet: env_or("MIN_BET_CENTS", defaults.min_bet),
            max_bet: env_or("MAX_BET_CENTS", defaults.max_bet),
        }
    }

    pub fn contains(&self, amount: Cents) -> bool {
        amount >= self.min_bet && amount <= self.max_bet
    }
}

impl Default for BetLimits {
    fn default() -> Self {
        Self {
            min_bet: 30,
            max_bet: 100_000,
        }
    }
}

/// Settlement loop behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementSettings {
    /// Pause between outcome reveal steps
    pub pacing: Duration,
    /// Share of a winning payout credited to the player's referrer
    pub referral_share_percent: i64,
    /// How often the worker rechecks the queue without being woken
    pub poll_interval: Duration,
}

impl SettlementSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            pacing: Duration::from_millis(env_or(
                "SETTLEMENT_PACING_MS",
                defaults.pacing.as_millis() as u64,
            )),
            referral_share_percent: env_or(
                "REFERRAL_SHARE_PERCENT",
                defaults.referral_share_percent,
            ),
            poll_interval: Duration::from_millis(env_or(
                "SETTLEMENT_POLL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
        }
    }
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(2000),
            referral_share_percent: 15,
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Voucher redemption rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoucherPolicy {
    /// When the creator redeems their own multi-use voucher they receive the
    /// full face amount and the voucher is cashed, regardless of how many
    /// activations other users already made.
    pub creator_redeems_full_face: bool,
}

impl VoucherPolicy {
    pub fn from_env() -> Self {
        Self {
            creator_redeems_full_face: env_or(
                "CREATOR_REDEEMS_FULL_FACE",
                Self::default().creator_redeems_full_face,
            ),
        }
    }
}

impl Default for VoucherPolicy {
    fn default() -> Self {
        Self {
            creator_redeems_full_face: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ledger = LedgerSettings::default();
        assert_eq!(ledger.min_withdrawal, 200);
        assert_eq!(ledger.turnover_bonus_amount, 750);

        let limits = BetLimits::default();
        assert!(limits.contains(30));
        assert!(limits.contains(100_000));
        assert!(!limits.contains(29));
        assert!(!limits.contains(100_001));

        assert_eq!(SettlementSettings::default().referral_share_percent, 15);
        assert!(VoucherPolicy::default().creator_redeems_full_face);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        assert_eq!(env_or("CASINO_LEDGER_TEST_UNSET_VARIABLE", 42_i64), 42);
    }
}
