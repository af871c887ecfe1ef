//! Voucher data models.

use crate::ledger::{Cents, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Voucher ID type
pub type VoucherId = String;

/// Voucher lifecycle. Deleted vouchers are removed, not flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherStatus {
    Active,
    Cashed,
}

impl std::fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoucherStatus::Active => write!(f, "active"),
            VoucherStatus::Cashed => write!(f, "cashed"),
        }
    }
}

impl FromStr for VoucherStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(VoucherStatus::Active),
            "cashed" => Ok(VoucherStatus::Cashed),
            other => Err(format!("unknown voucher status '{}'", other)),
        }
    }
}

/// Voucher kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherKind {
    /// One redemption by anyone
    Single,
    /// `activations_total` redemptions, one per user, each worth an equal share
    Multi,
    /// One redemption by a named user
    Targeted,
}

impl std::fmt::Display for VoucherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoucherKind::Single => write!(f, "single"),
            VoucherKind::Multi => write!(f, "multi"),
            VoucherKind::Targeted => write!(f, "targeted"),
        }
    }
}

impl FromStr for VoucherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(VoucherKind::Single),
            "multi" => Ok(VoucherKind::Multi),
            "targeted" => Ok(VoucherKind::Targeted),
            other => Err(format!("unknown voucher kind '{}'", other)),
        }
    }
}

/// Voucher model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub voucher_id: VoucherId,
    pub creator_id: UserId,
    /// Face value escrowed at creation
    pub amount: Cents,
    pub status: VoucherStatus,
    pub kind: VoucherKind,
    pub cashed_by_id: Option<UserId>,
    pub target_user_id: Option<UserId>,
    pub activations_total: i64,
    pub activations_count: i64,
    pub password_protected: bool,
    pub required_turnover: Cents,
    pub premium_only: bool,
    /// Redeemed funds are bonus-locked with requirement `credited × multiplier`
    pub wagering_multiplier: Decimal,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub cashed_at: Option<DateTime<Utc>>,
}

impl Voucher {
    pub fn is_multi(&self) -> bool {
        self.kind == VoucherKind::Multi
    }

    pub fn remaining_activations(&self) -> i64 {
        match self.status {
            VoucherStatus::Cashed => 0,
            VoucherStatus::Active => (self.activations_total - self.activations_count).max(0),
        }
    }
}

/// Voucher creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVoucher {
    pub creator_id: UserId,
    pub amount: Cents,
    pub kind: VoucherKind,
    pub target_user_id: Option<UserId>,
    /// Ignored unless `kind` is multi
    pub activations_total: i64,
    pub comment: Option<String>,
}

impl NewVoucher {
    pub fn single(creator_id: UserId, amount: Cents) -> Self {
        Self {
            creator_id,
            amount,
            kind: VoucherKind::Single,
            target_user_id: None,
            activations_total: 1,
            comment: None,
        }
    }

    pub fn multi(creator_id: UserId, amount: Cents, activations_total: i64) -> Self {
        Self {
            kind: VoucherKind::Multi,
            activations_total,
            ..Self::single(creator_id, amount)
        }
    }

    pub fn targeted(creator_id: UserId, amount: Cents, target_user_id: UserId) -> Self {
        Self {
            kind: VoucherKind::Targeted,
            target_user_id: Some(target_user_id),
            ..Self::single(creator_id, amount)
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Outcome of a successful redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub voucher_id: VoucherId,
    pub redeemer_id: UserId,
    pub credited: Cents,
    pub remaining_activations: i64,
    /// Credit was locked in the bonus pool
    pub credited_to_bonus: bool,
    /// Stake volume added to the redeemer's requirement
    pub wager_requirement: Cents,
}

/// Facts about the redeemer that the ledger does not store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedeemContext {
    pub is_premium: bool,
    pub password: Option<String>,
}

/// Creator-managed voucher option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "setting", content = "value", rename_all = "snake_case")]
pub enum VoucherSetting {
    /// `None` removes the password
    Password(Option<String>),
    RequiredTurnover(Cents),
    PremiumOnly(bool),
    Comment(Option<String>),
    TargetUser(Option<UserId>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let multi = NewVoucher::multi(1, 1000, 4).with_comment("for the group");
        assert_eq!(multi.kind, VoucherKind::Multi);
        assert_eq!(multi.activations_total, 4);
        assert_eq!(multi.comment.as_deref(), Some("for the group"));

        let targeted = NewVoucher::targeted(1, 500, 2);
        assert_eq!(targeted.target_user_id, Some(2));
        assert_eq!(targeted.activations_total, 1);
    }

    #[test]
    fn test_setting_wire_format() {
        let json = serde_json::to_string(&VoucherSetting::PremiumOnly(true)).unwrap();
        assert_eq!(json, r#"{"setting":"premium_only","value":true}"#);
    }

    #[test]
    fn test_status_and_kind_parse() {
        assert_eq!("cashed".parse::<VoucherStatus>(), Ok(VoucherStatus::Cashed));
        assert_eq!("targeted".parse::<VoucherKind>(), Ok(VoucherKind::Targeted));
        assert!("deleted".parse::<VoucherStatus>().is_err());
    }
}
