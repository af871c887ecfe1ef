//! Bonus unlock requirement tracking.
//!
//! All sources share one pool per account: voucher credits add to
//! `bonus_balance`, `wager_left` and `wager_total`, and every stake counts
//! against the combined requirement. Reaching zero releases the whole pool.
#![allow(clippy::needless_raw_string_hashes)]

use super::models::{WagerProgress, WageringInfo};
use crate::db::ImmediateTransaction;
use crate::ledger::{Cents, LedgerError, LedgerResult, UserId, format_cents};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqlitePool};

/// Stake volume needed to unlock `amount` at `multiplier`, rounded up to the
/// next cent. Zero when either factor is not positive.
pub fn requirement_for(amount: Cents, multiplier: Decimal) -> Cents {
    if amount <= 0 || multiplier <= Decimal::ZERO {
        return 0;
    }
    Decimal::from(amount)
        .checked_mul(multiplier)
        .and_then(|product| product.ceil().to_i64())
        .unwrap_or(Cents::MAX)
}

/// Lock `amount` as bonus and add `amount × multiplier` to the requirement.
///
/// # Returns
///
/// * `LedgerResult<Cents>` - Requirement added (zero means nothing locked)
pub async fn lock_bonus_requirement(
    conn: &mut SqliteConnection,
    user_id: UserId,
    amount: Cents,
    multiplier: Decimal,
) -> LedgerResult<Cents> {
    let requirement = requirement_for(amount, multiplier);
    if requirement == 0 {
        return Ok(0);
    }

    let result = sqlx::query(
        r#"
        UPDATE accounts
        SET bonus_balance = bonus_balance + ?1,
            wager_left = wager_left + ?2,
            wager_total = wager_total + ?2
        WHERE user_id = ?3
        "#,
    )
    .bind(amount)
    .bind(requirement)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::AccountNotFound(user_id));
    }

    log::info!(
        "Locked {} bonus for user {} (requirement {})",
        format_cents(amount),
        user_id,
        format_cents(requirement)
    );
    Ok(requirement)
}

/// Count a stake against the requirement; release the pool once it is met.
pub async fn consume_wager(
    conn: &mut SqliteConnection,
    user_id: UserId,
    stake: Cents,
) -> LedgerResult<WagerProgress> {
    let wager_left: Cents = sqlx::query("SELECT wager_left FROM accounts WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(LedgerError::AccountNotFound(user_id))?
        .get("wager_left");

    if stake <= 0 || wager_left <= 0 {
        return Ok(WagerProgress {
            wager_left,
            released: false,
        });
    }

    let remaining = wager_left - stake;
    if remaining <= 0 {
        release(conn, user_id).await?;
        log::info!("User {} met the wagering requirement, bonus released", user_id);
        return Ok(WagerProgress {
            wager_left: 0,
            released: true,
        });
    }

    sqlx::query("UPDATE accounts SET wager_left = ? WHERE user_id = ?")
        .bind(remaining)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(WagerProgress {
        wager_left: remaining,
        released: false,
    })
}

/// Undo [`consume_wager`] for a stake that was refunded unplayed.
///
/// Only an outstanding requirement is restored, capped at `wager_total`.
/// A requirement this stake already released stays released.
pub async fn restore_wager(
    conn: &mut SqliteConnection,
    user_id: UserId,
    stake: Cents,
) -> LedgerResult<Cents> {
    if stake <= 0 {
        return Err(LedgerError::InvalidAmount(stake));
    }
    let wager_left: Option<Cents> = sqlx::query(
        r#"
        UPDATE accounts
        SET wager_left = MIN(wager_left + ?, wager_total)
        WHERE user_id = ? AND wager_total > 0
        RETURNING wager_left
        "#,
    )
    .bind(stake)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(|row| row.get("wager_left"));

    Ok(wager_left.unwrap_or(0))
}

/// Drop the bonus lock when the account can no longer back it
/// (`bonus_balance > 0` and `balance <= bonus_balance`).
///
/// # Returns
///
/// * `LedgerResult<bool>` - Whether the lock was cleared
pub async fn clear_if_underwater(conn: &mut SqliteConnection, user_id: UserId) -> LedgerResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE accounts
        SET bonus_balance = 0, wager_left = 0, wager_total = 0
        WHERE user_id = ? AND bonus_balance > 0 AND balance <= bonus_balance
        "#,
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    let cleared = result.rows_affected() > 0;
    if cleared {
        clear_activation_ledgers(conn, user_id).await?;
        log::warn!("User {} balance fell to the bonus lock, wagering cleared", user_id);
    }
    Ok(cleared)
}

async fn release(conn: &mut SqliteConnection, user_id: UserId) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE accounts SET bonus_balance = 0, wager_left = 0, wager_total = 0 WHERE user_id = ?",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    clear_activation_ledgers(conn, user_id).await
}

async fn clear_activation_ledgers(conn: &mut SqliteConnection, user_id: UserId) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE voucher_activations SET wagering_left = 0 WHERE user_id = ? AND wagering_left > 0",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn wagering_info(conn: &mut SqliteConnection, user_id: UserId) -> LedgerResult<WageringInfo> {
    let row = sqlx::query(
        "SELECT bonus_balance, wager_left, wager_total FROM accounts WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(LedgerError::AccountNotFound(user_id))?;

    let wager_left: Cents = row.get("wager_left");
    let wager_total: Cents = row.get("wager_total");
    Ok(WageringInfo {
        bonus_balance: row.get("bonus_balance"),
        wager_left,
        wager_total: if wager_total > 0 { wager_total } else { wager_left },
    })
}

/// Pool-level entry points, each in its own exclusive transaction.
#[derive(Clone)]
pub struct WageringEngine {
    pool: SqlitePool,
}

impl WageringEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn lock_bonus_requirement(
        &self,
        user_id: UserId,
        amount: Cents,
        multiplier: Decimal,
    ) -> LedgerResult<Cents> {
        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = lock_bonus_requirement(&mut tx, user_id, amount, multiplier).await;
        tx.finish(result).await
    }

    pub async fn consume_wager(&self, user_id: UserId, stake: Cents) -> LedgerResult<WagerProgress> {
        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = consume_wager(&mut tx, user_id, stake).await;
        tx.finish(result).await
    }

    pub async fn clear_if_underwater(&self, user_id: UserId) -> LedgerResult<bool> {
        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = clear_if_underwater(&mut tx, user_id).await;
        tx.finish(result).await
    }

    pub async fn wagering_info(&self, user_id: UserId) -> LedgerResult<WageringInfo> {
        let mut conn = self.pool.acquire().await?;
        wagering_info(&mut conn, user_id).await
    }
}
