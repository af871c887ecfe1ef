//! Voucher manager: escrowed value transfer between users.
//!
//! Create, redeem and delete each run in one exclusive transaction together
//! with the ledger and wagering updates they imply, so a voucher can never be
//! paid out twice or refunded after it was cashed.
#![allow(clippy::needless_raw_string_hashes)]

use super::{
    errors::{VoucherError, VoucherResult},
    models::{
        NewVoucher, RedeemContext, Redemption, Voucher, VoucherKind, VoucherSetting,
        VoucherStatus,
    },
};
use crate::db::ImmediateTransaction;
use crate::ledger::{Cents, TransactionKind, UserId, format_cents, store};
use crate::settings::VoucherPolicy;
use crate::wagering::{self, requirement_for};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use std::str::FromStr;

const VOUCHER_SELECT: &str = r#"
    SELECT v.voucher_id, v.creator_id, v.amount, v.status, v.kind, v.cashed_by_id,
           v.target_user_id, v.activations_total, v.password_hash, v.required_turnover,
           v.premium_only, v.wagering_multiplier, v.comment, v.created_at, v.cashed_at,
           (SELECT COUNT(*) FROM voucher_activations a WHERE a.voucher_id = v.voucher_id)
               AS activations_count
    FROM vouchers v
"#;

fn voucher_from_row(row: &SqliteRow) -> Voucher {
    let voucher_id: String = row.get("voucher_id");

    let status = row
        .get::<String, _>("status")
        .parse()
        .unwrap_or_else(|err| {
            log::warn!("Voucher {}: {}, treating as cashed", voucher_id, err);
            VoucherStatus::Cashed
        });
    let kind = row.get::<String, _>("kind").parse().unwrap_or_else(|err| {
        log::warn!("Voucher {}: {}, treating as single", voucher_id, err);
        VoucherKind::Single
    });
    let wagering_multiplier = Decimal::from_str(&row.get::<String, _>("wagering_multiplier"))
        .unwrap_or_else(|err| {
            log::warn!("Voucher {}: bad wagering multiplier: {}", voucher_id, err);
            Decimal::ZERO
        });

    Voucher {
        creator_id: row.get("creator_id"),
        amount: row.get("amount"),
        status,
        kind,
        cashed_by_id: row.get("cashed_by_id"),
        target_user_id: row.get("target_user_id"),
        activations_total: row.get("activations_total"),
        activations_count: row.get("activations_count"),
        password_protected: row.get::<Option<String>, _>("password_hash").is_some(),
        required_turnover: row.get("required_turnover"),
        premium_only: row.get("premium_only"),
        wagering_multiplier,
        comment: row.get("comment"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        cashed_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("cashed_at")
            .map(|at| at.and_utc()),
        voucher_id,
    }
}

async fn fetch_voucher(conn: &mut SqliteConnection, voucher_id: &str) -> VoucherResult<Voucher> {
    let sql = format!("{} WHERE v.voucher_id = ?", VOUCHER_SELECT);
    let row = sqlx::query(&sql)
        .bind(voucher_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| VoucherError::CheckNotFound(voucher_id.to_string()))?;

    Ok(voucher_from_row(&row))
}

fn hash_password(password: &str) -> VoucherResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| VoucherError::HashingFailed)?
        .to_string())
}

fn verify_password(password: &str, hash: &str) -> VoucherResult<()> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| VoucherError::WrongPassword)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| VoucherError::WrongPassword)
}

/// Target, premium, turnover and password gates, in that order.
///
/// `verified_hash` skips re-hashing when the stored hash is the one the
/// attempt already matched.
async fn check_gates(
    conn: &mut SqliteConnection,
    voucher: &Voucher,
    redeemer_id: UserId,
    ctx: &RedeemContext,
    verified_hash: Option<&str>,
) -> VoucherResult<Option<String>> {
    if VoucherManager::is_addressed_elsewhere(voucher, redeemer_id) {
        return Err(VoucherError::NotTargetUser);
    }

    if voucher.premium_only && !ctx.is_premium {
        return Err(VoucherError::PremiumRequired);
    }

    if voucher.required_turnover > 0 {
        let current = store::turnover(conn, redeemer_id).await?;
        if current < voucher.required_turnover {
            return Err(VoucherError::TurnoverTooLow {
                required: voucher.required_turnover,
                current,
            });
        }
    }

    let password_hash: Option<String> =
        sqlx::query("SELECT password_hash FROM vouchers WHERE voucher_id = ?")
            .bind(&voucher.voucher_id)
            .fetch_one(&mut *conn)
            .await?
            .get("password_hash");

    if let Some(hash) = &password_hash {
        if verified_hash != Some(hash.as_str()) {
            let attempt = ctx.password.as_deref().ok_or(VoucherError::WrongPassword)?;
            verify_password(attempt.trim(), hash)?;
        }
    }

    Ok(password_hash)
}

/// Voucher manager
#[derive(Clone)]
pub struct VoucherManager {
    pool: SqlitePool,
    policy: VoucherPolicy,
}

impl VoucherManager {
    /// Create a new voucher manager with the policy from the environment
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_policy(pool, VoucherPolicy::from_env())
    }

    pub fn with_policy(pool: SqlitePool, policy: VoucherPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn policy(&self) -> &VoucherPolicy {
        &self.policy
    }

    /// Targeted at another user; the creator may always redeem their own.
    fn is_addressed_elsewhere(voucher: &Voucher, redeemer_id: UserId) -> bool {
        voucher.creator_id != redeemer_id
            && voucher
                .target_user_id
                .is_some_and(|target| target != redeemer_id)
    }

    /// Credit for one activation of a multi-use voucher.
    ///
    /// Integer division: the remainder of `amount / activations_total` is
    /// never paid out by activations and only comes back through deletion.
    pub fn per_activation_amount(amount: Cents, activations_total: i64) -> Cents {
        if activations_total <= 1 {
            amount
        } else {
            amount / activations_total
        }
    }

    /// What deleting a multi-use voucher after `activations_count`
    /// redemptions hands back, division remainder included.
    pub fn unredeemed_value(amount: Cents, activations_total: i64, activations_count: i64) -> Cents {
        let share = Self::per_activation_amount(amount, activations_total);
        (amount - activations_count * share).max(0)
    }

    /// Create a voucher, escrowing its face value from the creator
    ///
    /// # Arguments
    ///
    /// * `request` - Creator, face value, kind and options
    ///
    /// # Returns
    ///
    /// * `VoucherResult<Voucher>` - The active voucher
    ///
    /// # Errors
    ///
    /// * `VoucherError::AccountNotFound` - Unknown creator
    /// * `VoucherError::Validation` - Non-positive amount, fewer than two
    ///   activations on a multi voucher, or a target on the wrong kind
    /// * `VoucherError::InsufficientFunds` - Face value exceeds the clean balance
    pub async fn create_voucher(&self, request: NewVoucher) -> VoucherResult<Voucher> {
        let voucher_id = uuid::Uuid::new_v4().simple().to_string();

        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = Self::create_voucher_in(&mut tx, &voucher_id, &request).await;
        let voucher = tx.finish(result).await?;

        log::info!(
            "User {} created {} voucher {} for {}",
            voucher.creator_id,
            voucher.kind,
            voucher.voucher_id,
            format_cents(voucher.amount)
        );
        Ok(voucher)
    }

    async fn create_voucher_in(
        conn: &mut SqliteConnection,
        voucher_id: &str,
        request: &NewVoucher,
    ) -> VoucherResult<Voucher> {
        let account = store::fetch_account(conn, request.creator_id).await?;

        if request.amount <= 0 {
            return Err(VoucherError::Validation(
                "amount must be positive".to_string(),
            ));
        }

        let clean = account.clean_balance();
        if request.amount > clean {
            return Err(VoucherError::InsufficientFunds {
                available: clean,
                required: request.amount,
            });
        }

        let activations_total = match request.kind {
            VoucherKind::Multi => {
                if request.activations_total < 2 {
                    return Err(VoucherError::Validation(
                        "a multi-use voucher needs at least 2 activations".to_string(),
                    ));
                }
                if Self::per_activation_amount(request.amount, request.activations_total) < 1 {
                    return Err(VoucherError::Validation(
                        "amount is too small to split across that many activations".to_string(),
                    ));
                }
                request.activations_total
            }
            VoucherKind::Single | VoucherKind::Targeted => 1,
        };

        match (request.kind, request.target_user_id) {
            (VoucherKind::Targeted, None) => {
                return Err(VoucherError::Validation(
                    "a targeted voucher needs a target user".to_string(),
                ));
            }
            (VoucherKind::Single | VoucherKind::Multi, Some(_)) => {
                return Err(VoucherError::Validation(
                    "only targeted vouchers name a target user".to_string(),
                ));
            }
            _ => {}
        }

        sqlx::query(
            r#"
            INSERT INTO vouchers
                (voucher_id, creator_id, amount, kind, target_user_id, activations_total, comment)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(voucher_id)
        .bind(request.creator_id)
        .bind(request.amount)
        .bind(request.kind.to_string())
        .bind(request.target_user_id)
        .bind(activations_total)
        .bind(request.comment.as_deref())
        .execute(&mut *conn)
        .await?;

        store::adjust_balance(conn, request.creator_id, -request.amount).await?;
        store::record_transaction(
            conn,
            request.creator_id,
            -request.amount,
            TransactionKind::VoucherCreate,
            None,
        )
        .await?;

        fetch_voucher(conn, voucher_id).await
    }

    /// Redeem a voucher
    ///
    /// Multi-use vouchers pay `amount / activations_total` per user. When the
    /// policy allows it, the creator redeeming their own multi voucher takes
    /// the full face value and cashes it. A voucher with a wagering
    /// multiplier locks the credit as bonus.
    ///
    /// # Errors
    ///
    /// * `VoucherError::CheckNotFound` - No such voucher
    /// * `VoucherError::CheckAlreadyActivated` - Redeemer already activated it
    /// * `VoucherError::CheckAlreadyCashed` - Voucher is used up
    /// * `VoucherError::NotTargetUser` - Addressed to somebody else
    pub async fn redeem_voucher(
        &self,
        voucher_id: &str,
        redeemer_id: UserId,
    ) -> VoucherResult<Redemption> {
        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = self.redeem_voucher_in(&mut tx, voucher_id, redeemer_id).await;
        let redemption = tx.finish(result).await?;

        log::info!(
            "User {} redeemed voucher {} for {} ({} activations left)",
            redeemer_id,
            voucher_id,
            format_cents(redemption.credited),
            redemption.remaining_activations
        );
        Ok(redemption)
    }

    async fn redeem_voucher_in(
        &self,
        conn: &mut SqliteConnection,
        voucher_id: &str,
        redeemer_id: UserId,
    ) -> VoucherResult<Redemption> {
        let voucher = fetch_voucher(conn, voucher_id).await?;
        store::fetch_account(conn, redeemer_id).await?;

        let already_activated = sqlx::query(
            "SELECT 1 FROM voucher_activations WHERE voucher_id = ? AND user_id = ?",
        )
        .bind(voucher_id)
        .bind(redeemer_id)
        .fetch_optional(&mut *conn)
        .await?
        .is_some();
        if already_activated {
            return Err(VoucherError::CheckAlreadyActivated);
        }

        if voucher.status == VoucherStatus::Cashed {
            return Err(VoucherError::CheckAlreadyCashed);
        }

        if Self::is_addressed_elsewhere(&voucher, redeemer_id) {
            return Err(VoucherError::NotTargetUser);
        }

        // (credit, voucher is now used up, cashed_by)
        let (credited, cashes, cashed_by) = if voucher.is_multi() {
            if voucher.activations_count >= voucher.activations_total {
                return Err(VoucherError::CheckAlreadyCashed);
            }
            if redeemer_id == voucher.creator_id && self.policy.creator_redeems_full_face {
                (voucher.amount, true, Some(redeemer_id))
            } else {
                let share = Self::per_activation_amount(voucher.amount, voucher.activations_total);
                let cashes = voucher.activations_count + 1 >= voucher.activations_total;
                (share, cashes, None)
            }
        } else {
            (voucher.amount, true, Some(redeemer_id))
        };

        let remaining_activations = if cashes {
            0
        } else {
            voucher.activations_total - voucher.activations_count - 1
        };

        let wager_requirement = requirement_for(credited, voucher.wagering_multiplier);

        sqlx::query(
            r#"
            INSERT INTO voucher_activations (voucher_id, user_id, amount, wagering_left, wagering_total)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(voucher_id)
        .bind(redeemer_id)
        .bind(credited)
        .bind(wager_requirement)
        .bind(wager_requirement)
        .execute(&mut *conn)
        .await?;

        store::adjust_balance(conn, redeemer_id, credited).await?;
        store::record_transaction(
            conn,
            redeemer_id,
            credited,
            TransactionKind::VoucherRedeem,
            None,
        )
        .await?;

        let locked = wagering::engine::lock_bonus_requirement(
            conn,
            redeemer_id,
            credited,
            voucher.wagering_multiplier,
        )
        .await?;

        if cashes {
            sqlx::query(
                r#"
                UPDATE vouchers
                SET status = 'cashed', cashed_by_id = ?, cashed_at = CURRENT_TIMESTAMP
                WHERE voucher_id = ?
                "#,
            )
            .bind(cashed_by)
            .bind(voucher_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(Redemption {
            voucher_id: voucher.voucher_id,
            redeemer_id,
            credited,
            remaining_activations,
            credited_to_bonus: locked > 0,
            wager_requirement: locked,
        })
    }

    /// Redeem after checking the voucher's gates
    ///
    /// Checks, in order: target user (the creator is exempt), premium-only,
    /// required turnover, password. Then redeems as [`Self::redeem_voucher`].
    ///
    /// The gates are checked once up front, so a wrong password costs no
    /// write lock, and again inside the redeem transaction against the
    /// voucher as it stands then.
    ///
    /// # Errors
    ///
    /// * `VoucherError::NotTargetUser`
    /// * `VoucherError::PremiumRequired`
    /// * `VoucherError::TurnoverTooLow`
    /// * `VoucherError::WrongPassword`
    /// * Anything [`Self::redeem_voucher`] returns
    pub async fn redeem_voucher_gated(
        &self,
        voucher_id: &str,
        redeemer_id: UserId,
        ctx: &RedeemContext,
    ) -> VoucherResult<Redemption> {
        let verified_hash = self.precheck_gates(voucher_id, redeemer_id, ctx).await?;
        self.redeem_through_gates(voucher_id, redeemer_id, ctx, verified_hash.as_deref())
            .await
    }

    /// Gate check without the write lock. Returns the password hash the
    /// attempt was verified against.
    async fn precheck_gates(
        &self,
        voucher_id: &str,
        redeemer_id: UserId,
        ctx: &RedeemContext,
    ) -> VoucherResult<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        let voucher = fetch_voucher(&mut conn, voucher_id).await?;
        check_gates(&mut conn, &voucher, redeemer_id, ctx, None).await
    }

    async fn redeem_through_gates(
        &self,
        voucher_id: &str,
        redeemer_id: UserId,
        ctx: &RedeemContext,
        verified_hash: Option<&str>,
    ) -> VoucherResult<Redemption> {
        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = async {
            let voucher = fetch_voucher(&mut tx, voucher_id).await?;
            check_gates(&mut tx, &voucher, redeemer_id, ctx, verified_hash).await?;
            self.redeem_voucher_in(&mut tx, voucher_id, redeemer_id).await
        }
        .await;
        let redemption = tx.finish(result).await?;

        log::info!(
            "User {} redeemed gated voucher {} for {}",
            redeemer_id,
            voucher_id,
            format_cents(redemption.credited)
        );
        Ok(redemption)
    }

    /// Delete an active voucher and refund its unredeemed value
    ///
    /// # Returns
    ///
    /// * `VoucherResult<Cents>` - Amount refunded to the creator
    ///
    /// # Errors
    ///
    /// * `VoucherError::CheckNotFound` - No such voucher
    /// * `VoucherError::CheckPermission` - Requester is not the creator
    /// * `VoucherError::CheckAlreadyCashed` - Nothing left to refund
    pub async fn delete_voucher_with_refund(
        &self,
        voucher_id: &str,
        requester_id: UserId,
    ) -> VoucherResult<Cents> {
        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = Self::delete_voucher_in(&mut tx, voucher_id, requester_id).await;
        let refund = tx.finish(result).await?;

        log::info!(
            "User {} deleted voucher {}, refunded {}",
            requester_id,
            voucher_id,
            format_cents(refund)
        );
        Ok(refund)
    }

    async fn delete_voucher_in(
        conn: &mut SqliteConnection,
        voucher_id: &str,
        requester_id: UserId,
    ) -> VoucherResult<Cents> {
        let voucher = fetch_voucher(conn, voucher_id).await?;
        if voucher.creator_id != requester_id {
            return Err(VoucherError::CheckPermission);
        }
        if voucher.status == VoucherStatus::Cashed {
            return Err(VoucherError::CheckAlreadyCashed);
        }

        let refund = if voucher.is_multi() {
            Self::unredeemed_value(voucher.amount, voucher.activations_total, voucher.activations_count)
        } else {
            voucher.amount
        };

        sqlx::query("DELETE FROM voucher_activations WHERE voucher_id = ?")
            .bind(voucher_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM vouchers WHERE voucher_id = ?")
            .bind(voucher_id)
            .execute(&mut *conn)
            .await?;

        if refund > 0 {
            store::adjust_balance(conn, voucher.creator_id, refund).await?;
            store::record_transaction(
                conn,
                voucher.creator_id,
                refund,
                TransactionKind::VoucherRefund,
                None,
            )
            .await?;
        }

        Ok(refund)
    }

    /// Get a voucher
    pub async fn get_voucher(&self, voucher_id: &str) -> VoucherResult<Voucher> {
        let mut conn = self.pool.acquire().await?;
        fetch_voucher(&mut conn, voucher_id).await
    }

    /// Vouchers created by a user, newest first
    pub async fn list_user_vouchers(
        &self,
        creator_id: UserId,
        limit: i64,
        offset: i64,
    ) -> VoucherResult<Vec<Voucher>> {
        let sql = format!(
            "{} WHERE v.creator_id = ? ORDER BY v.created_at DESC, v.rowid DESC LIMIT ? OFFSET ?",
            VOUCHER_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(creator_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(voucher_from_row).collect())
    }

    pub async fn count_active_vouchers(&self, creator_id: UserId) -> VoucherResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM vouchers WHERE creator_id = ? AND status = 'active'",
        )
        .bind(creator_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("n"))
    }

    /// Change a creator-managed option on an active voucher
    ///
    /// # Errors
    ///
    /// * `VoucherError::CheckPermission` - Requester is not the creator
    /// * `VoucherError::CheckAlreadyCashed` - Voucher is no longer active
    /// * `VoucherError::Validation` - Empty password or negative turnover
    pub async fn update_voucher_setting(
        &self,
        voucher_id: &str,
        requester_id: UserId,
        setting: VoucherSetting,
    ) -> VoucherResult<Voucher> {
        // Hash before taking the write lock.
        let password_hash = match &setting {
            VoucherSetting::Password(Some(password)) => {
                let password = password.trim();
                if password.is_empty() {
                    return Err(VoucherError::Validation(
                        "password must not be empty".to_string(),
                    ));
                }
                Some(hash_password(password)?)
            }
            _ => None,
        };

        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result =
            Self::update_setting_in(&mut tx, voucher_id, requester_id, &setting, password_hash)
                .await;
        let voucher = tx.finish(result).await?;

        log::info!("User {} updated settings of voucher {}", requester_id, voucher_id);
        Ok(voucher)
    }

    async fn update_setting_in(
        conn: &mut SqliteConnection,
        voucher_id: &str,
        requester_id: UserId,
        setting: &VoucherSetting,
        password_hash: Option<String>,
    ) -> VoucherResult<Voucher> {
        let voucher = fetch_voucher(conn, voucher_id).await?;
        if voucher.creator_id != requester_id {
            return Err(VoucherError::CheckPermission);
        }
        if voucher.status == VoucherStatus::Cashed {
            return Err(VoucherError::CheckAlreadyCashed);
        }

        let query = match setting {
            VoucherSetting::Password(_) => {
                sqlx::query("UPDATE vouchers SET password_hash = ? WHERE voucher_id = ?")
                    .bind(password_hash)
            }
            VoucherSetting::RequiredTurnover(turnover) => {
                if *turnover < 0 {
                    return Err(VoucherError::Validation(
                        "required turnover must not be negative".to_string(),
                    ));
                }
                sqlx::query("UPDATE vouchers SET required_turnover = ? WHERE voucher_id = ?")
                    .bind(*turnover)
            }
            VoucherSetting::PremiumOnly(premium_only) => {
                sqlx::query("UPDATE vouchers SET premium_only = ? WHERE voucher_id = ?")
                    .bind(*premium_only)
            }
            VoucherSetting::Comment(comment) => {
                sqlx::query("UPDATE vouchers SET comment = ? WHERE voucher_id = ?")
                    .bind(comment.clone())
            }
            VoucherSetting::TargetUser(target) => {
                sqlx::query("UPDATE vouchers SET target_user_id = ? WHERE voucher_id = ?")
                    .bind(*target)
            }
        };
        query.bind(voucher_id).execute(&mut *conn).await?;

        fetch_voucher(conn, voucher_id).await
    }

    /// Operator control: lock future redemptions of this voucher as bonus
    /// with requirement `credited × multiplier`. Zero disables it.
    pub async fn set_wagering_multiplier(
        &self,
        voucher_id: &str,
        multiplier: Decimal,
    ) -> VoucherResult<Voucher> {
        if multiplier < Decimal::ZERO {
            return Err(VoucherError::Validation(
                "wagering multiplier must not be negative".to_string(),
            ));
        }

        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = Self::set_multiplier_in(&mut tx, voucher_id, multiplier).await;
        tx.finish(result).await
    }

    async fn set_multiplier_in(
        conn: &mut SqliteConnection,
        voucher_id: &str,
        multiplier: Decimal,
    ) -> VoucherResult<Voucher> {
        let voucher = fetch_voucher(conn, voucher_id).await?;
        if voucher.status == VoucherStatus::Cashed {
            return Err(VoucherError::CheckAlreadyCashed);
        }

        sqlx::query("UPDATE vouchers SET wagering_multiplier = ? WHERE voucher_id = ?")
            .bind(multiplier.normalize().to_string())
            .bind(voucher_id)
            .execute(&mut *conn)
            .await?;

        fetch_voucher(conn, voucher_id).await
    }
}
