//! Connection-level ledger primitives.
//!
//! Each function runs on a caller-supplied connection so voucher and
//! settlement flows can compose several of them inside one
//! [`ImmediateTransaction`](crate::db::ImmediateTransaction).
#![allow(clippy::needless_raw_string_hashes)]

use super::{
    errors::{LedgerError, LedgerResult},
    models::{Account, Cents, TransactionKind, UserId},
};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqliteRow};

pub(crate) fn account_from_row(row: &SqliteRow) -> Account {
    Account {
        user_id: row.get("user_id"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        balance: row.get("balance"),
        bonus_balance: row.get("bonus_balance"),
        wager_left: row.get("wager_left"),
        wager_total: row.get("wager_total"),
        ref_balance: row.get("ref_balance"),
        ref_earnings: row.get("ref_earnings"),
        ref_count: row.get("ref_count"),
        referrer_id: row.get("referrer_id"),
        last_claimed_turnover: row.get("last_claimed_turnover"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    }
}

/// Load an account row.
///
/// # Errors
///
/// * `LedgerError::AccountNotFound` - No such user
pub async fn fetch_account(conn: &mut SqliteConnection, user_id: UserId) -> LedgerResult<Account> {
    let row = sqlx::query("SELECT * FROM accounts WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(LedgerError::AccountNotFound(user_id))?;

    Ok(account_from_row(&row))
}

/// `balance = max(balance + delta, 0)`. Returns the new balance.
pub async fn adjust_balance(
    conn: &mut SqliteConnection,
    user_id: UserId,
    delta: Cents,
) -> LedgerResult<Cents> {
    let row = sqlx::query(
        r#"
        UPDATE accounts
        SET balance = MAX(balance + ?, 0)
        WHERE user_id = ?
        RETURNING balance
        "#,
    )
    .bind(delta)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(LedgerError::AccountNotFound(user_id))?;

    Ok(row.get("balance"))
}

/// `bonus_balance = max(bonus_balance + amount, 0)`. Creates no wagering
/// requirement. Returns the new bonus balance.
pub async fn increase_bonus_balance(
    conn: &mut SqliteConnection,
    user_id: UserId,
    amount: Cents,
) -> LedgerResult<Cents> {
    let row = sqlx::query(
        r#"
        UPDATE accounts
        SET bonus_balance = MAX(bonus_balance + ?, 0)
        WHERE user_id = ?
        RETURNING bonus_balance
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(LedgerError::AccountNotFound(user_id))?;

    Ok(row.get("bonus_balance"))
}

/// Spend `amount` from the bonus pool.
///
/// A single conditional update: both `balance` and `bonus_balance` must cover
/// the amount or nothing changes. Non-positive amounts succeed trivially and
/// unknown users fail.
pub async fn deduct_bonus_funds(
    conn: &mut SqliteConnection,
    user_id: UserId,
    amount: Cents,
) -> Result<bool, sqlx::Error> {
    if amount <= 0 {
        return Ok(true);
    }

    let result = sqlx::query(
        r#"
        UPDATE accounts
        SET balance = balance - ?1,
            bonus_balance = bonus_balance - ?1
        WHERE user_id = ?2 AND balance >= ?1 AND bonus_balance >= ?1
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Inverse of [`deduct_bonus_funds`].
pub async fn refund_bonus_funds(
    conn: &mut SqliteConnection,
    user_id: UserId,
    amount: Cents,
) -> LedgerResult<()> {
    if amount <= 0 {
        return Ok(());
    }

    let result = sqlx::query(
        "UPDATE accounts SET balance = balance + ?1, bonus_balance = bonus_balance + ?1 WHERE user_id = ?2",
    )
    .bind(amount)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::AccountNotFound(user_id));
    }
    Ok(())
}

/// Change the referral balance; positive deltas also count as lifetime
/// referral earnings. Clamped at zero. Returns the new referral balance.
pub async fn update_ref_balance(
    conn: &mut SqliteConnection,
    user_id: UserId,
    delta: Cents,
) -> LedgerResult<Cents> {
    let row = sqlx::query(
        r#"
        UPDATE accounts
        SET ref_balance = MAX(ref_balance + ?1, 0),
            ref_earnings = ref_earnings + MAX(?1, 0)
        WHERE user_id = ?2
        RETURNING ref_balance
        "#,
    )
    .bind(delta)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(LedgerError::AccountNotFound(user_id))?;

    Ok(row.get("ref_balance"))
}

pub async fn referrer_of(
    conn: &mut SqliteConnection,
    user_id: UserId,
) -> Result<Option<UserId>, sqlx::Error> {
    let row = sqlx::query("SELECT referrer_id FROM accounts WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.and_then(|row| row.get::<Option<UserId>, _>("referrer_id")))
}

/// Append a transaction record. Returns its ID.
pub async fn record_transaction(
    conn: &mut SqliteConnection,
    user_id: UserId,
    amount: Cents,
    kind: TransactionKind,
    game: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO transactions (user_id, amount, kind, game)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(kind.to_string())
    .bind(game)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get("id"))
}

/// Total stake volume a user has played; refunded stakes do not count.
pub async fn turnover(conn: &mut SqliteConnection, user_id: UserId) -> Result<Cents, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(SUM(CASE kind WHEN 'game' THEN ABS(amount) ELSE -ABS(amount) END), 0) AS turnover
        FROM transactions
        WHERE user_id = ? AND kind IN ('game', 'stake_refund')
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get("turnover"))
}
