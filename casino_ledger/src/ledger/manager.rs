//! Account ledger manager.
#![allow(clippy::needless_raw_string_hashes)]

use super::{
    cashout::CashoutGateway,
    errors::{LedgerError, LedgerResult},
    models::{
        Account, Cents, LedgerEntry, TransactionKind, UserId, UserStats, WithdrawalReceipt,
        WithdrawalSource, WithdrawalStatus, format_cents,
    },
    store,
};
use crate::db::ImmediateTransaction;
use crate::settings::LedgerSettings;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::Row;

/// Account ledger manager
#[derive(Clone)]
pub struct LedgerManager {
    pool: SqlitePool,
    settings: LedgerSettings,
}

impl LedgerManager {
    /// Create a new ledger manager with settings from the environment
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_settings(pool, LedgerSettings::from_env())
    }

    pub fn with_settings(pool: SqlitePool, settings: LedgerSettings) -> Self {
        Self { pool, settings }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Register an account if it does not exist yet
    ///
    /// A referrer is only recorded when it is an existing account other than
    /// the new user; its `ref_count` is incremented.
    ///
    /// # Returns
    ///
    /// * `LedgerResult<bool>` - `true` if the account was created
    pub async fn create_account(
        &self,
        user_id: UserId,
        username: Option<&str>,
        full_name: Option<&str>,
        referrer_id: Option<UserId>,
    ) -> LedgerResult<bool> {
        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = Self::create_account_in(&mut tx, user_id, username, full_name, referrer_id).await;
        let created = tx.finish(result).await?;

        if created {
            log::info!("Created account for user {}", user_id);
        }
        Ok(created)
    }

    async fn create_account_in(
        conn: &mut SqliteConnection,
        user_id: UserId,
        username: Option<&str>,
        full_name: Option<&str>,
        referrer_id: Option<UserId>,
    ) -> LedgerResult<bool> {
        let referrer_id = match referrer_id {
            Some(referrer) if referrer != user_id => {
                let exists = sqlx::query("SELECT 1 FROM accounts WHERE user_id = ?")
                    .bind(referrer)
                    .fetch_optional(&mut *conn)
                    .await?
                    .is_some();
                exists.then_some(referrer)
            }
            _ => None,
        };

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO accounts (user_id, username, full_name, referrer_id)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(full_name)
        .bind(referrer_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(referrer) = referrer_id {
            sqlx::query("UPDATE accounts SET ref_count = ref_count + 1 WHERE user_id = ?")
                .bind(referrer)
                .execute(&mut *conn)
                .await?;
        }

        Ok(true)
    }

    /// Get an account
    ///
    /// # Errors
    ///
    /// * `LedgerError::AccountNotFound` - No such user
    pub async fn get_account(&self, user_id: UserId) -> LedgerResult<Account> {
        let mut conn = self.pool.acquire().await?;
        store::fetch_account(&mut conn, user_id).await
    }

    pub async fn get_account_by_username(&self, username: &str) -> LedgerResult<Option<Account>> {
        let username = username.trim_start_matches('@');
        let row = sqlx::query("SELECT * FROM accounts WHERE username = ? COLLATE NOCASE")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(store::account_from_row))
    }

    /// Atomically set `balance = max(balance + delta, 0)`
    ///
    /// # Returns
    ///
    /// * `LedgerResult<Cents>` - New balance
    pub async fn adjust_balance(&self, user_id: UserId, delta: Cents) -> LedgerResult<Cents> {
        let mut conn = self.pool.acquire().await?;
        store::adjust_balance(&mut conn, user_id, delta).await
    }

    /// Add to the locked bonus subset without registering a requirement
    pub async fn increase_bonus_balance(&self, user_id: UserId, amount: Cents) -> LedgerResult<Cents> {
        let mut conn = self.pool.acquire().await?;
        store::increase_bonus_balance(&mut conn, user_id, amount).await
    }

    /// Spend from the bonus pool
    ///
    /// # Returns
    ///
    /// * `LedgerResult<bool>` - `false` (and no change) when either `balance`
    ///   or `bonus_balance` is short, or the user is unknown
    pub async fn deduct_bonus_funds(&self, user_id: UserId, amount: Cents) -> LedgerResult<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(store::deduct_bonus_funds(&mut conn, user_id, amount).await?)
    }

    pub async fn refund_bonus_funds(&self, user_id: UserId, amount: Cents) -> LedgerResult<()> {
        let mut conn = self.pool.acquire().await?;
        store::refund_bonus_funds(&mut conn, user_id, amount).await
    }

    pub async fn update_ref_balance(&self, user_id: UserId, delta: Cents) -> LedgerResult<Cents> {
        let mut conn = self.pool.acquire().await?;
        store::update_ref_balance(&mut conn, user_id, delta).await
    }

    pub async fn get_referrer(&self, user_id: UserId) -> LedgerResult<Option<UserId>> {
        let mut conn = self.pool.acquire().await?;
        Ok(store::referrer_of(&mut conn, user_id).await?)
    }

    /// Append a transaction record
    pub async fn add_transaction(
        &self,
        user_id: UserId,
        amount: Cents,
        kind: TransactionKind,
        game: Option<&str>,
    ) -> LedgerResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(store::record_transaction(&mut conn, user_id, amount, kind, game).await?)
    }

    /// Most recent transactions first
    pub async fn get_transactions(&self, user_id: UserId, limit: i64) -> LedgerResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, amount, kind, game, created_at
            FROM transactions
            WHERE user_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .iter()
            .map(|row| {
                let raw_kind: String = row.get("kind");
                let kind = raw_kind.parse().unwrap_or_else(|err| {
                    log::warn!("Transaction {}: {}", row.get::<i64, _>("id"), err);
                    TransactionKind::Adjustment
                });
                LedgerEntry {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    amount: row.get("amount"),
                    kind,
                    game: row.get("game"),
                    created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
                }
            })
            .collect();

        Ok(entries)
    }

    /// Aggregate play statistics from stake and win records
    pub async fn user_stats(&self, user_id: UserId) -> LedgerResult<UserStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE kind WHEN 'game' THEN 1 WHEN 'stake_refund' THEN -1 ELSE 0 END), 0) AS total_games,
                COALESCE(SUM(CASE WHEN kind = 'win' THEN 1 ELSE 0 END), 0) AS wins,
                COALESCE(SUM(CASE kind WHEN 'game' THEN ABS(amount) WHEN 'stake_refund' THEN -ABS(amount) ELSE 0 END), 0) AS turnover,
                COALESCE(SUM(CASE WHEN kind = 'win' THEN amount ELSE 0 END), 0) AS total_won
            FROM transactions
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let total_lost: Cents = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS lost FROM bets WHERE user_id = ? AND won = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?
        .get("lost");

        let total_games: i64 = row.get("total_games");
        let wins: i64 = row.get("wins");

        Ok(UserStats {
            total_games,
            wins,
            losses: (total_games - wins).max(0),
            turnover: row.get("turnover"),
            total_won: row.get("total_won"),
            total_lost,
        })
    }

    /// Credit every turnover milestone reached since the last claim
    ///
    /// # Returns
    ///
    /// * `LedgerResult<Cents>` - Bonus credited to the main balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::NoBonusAvailable` - No new milestone
    pub async fn claim_turnover_bonus(&self, user_id: UserId) -> LedgerResult<Cents> {
        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = self.claim_turnover_bonus_in(&mut tx, user_id).await;
        let bonus = tx.finish(result).await?;

        log::info!("User {} claimed turnover bonus {}", user_id, format_cents(bonus));
        Ok(bonus)
    }

    async fn claim_turnover_bonus_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: UserId,
    ) -> LedgerResult<Cents> {
        let step = self.settings.turnover_bonus_step;
        if step <= 0 {
            return Err(LedgerError::NoBonusAvailable);
        }

        let account = store::fetch_account(conn, user_id).await?;
        let turnover = store::turnover(conn, user_id).await?;
        let reached = turnover / step * step;
        if reached <= account.last_claimed_turnover {
            return Err(LedgerError::NoBonusAvailable);
        }

        let milestones = (reached - account.last_claimed_turnover) / step;
        let bonus = milestones * self.settings.turnover_bonus_amount;

        sqlx::query("UPDATE accounts SET last_claimed_turnover = ? WHERE user_id = ?")
            .bind(reached)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        store::adjust_balance(conn, user_id, bonus).await?;
        store::record_transaction(conn, user_id, bonus, TransactionKind::Bonus, Some("turnover_bonus"))
            .await?;

        Ok(bonus)
    }

    /// Cash out part of the clean main balance
    ///
    /// The debit commits before the gateway is called; a gateway failure
    /// restores it and cancels the withdrawal.
    ///
    /// # Errors
    ///
    /// * `LedgerError::BelowMinimum` - Under the configured minimum
    /// * `LedgerError::InsufficientFunds` - More than the clean balance
    /// * `LedgerError::Gateway` - Payout failed, funds restored
    pub async fn withdraw(
        &self,
        user_id: UserId,
        amount: Cents,
        gateway: &dyn CashoutGateway,
    ) -> LedgerResult<WithdrawalReceipt> {
        if amount < self.settings.min_withdrawal {
            return Err(LedgerError::BelowMinimum {
                minimum: self.settings.min_withdrawal,
                requested: amount,
            });
        }
        self.cash_out(user_id, amount, WithdrawalSource::Main, gateway).await
    }

    /// Cash out the whole referral balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::BelowMinimum` - Referral balance under the minimum
    /// * `LedgerError::Gateway` - Payout failed, funds restored
    pub async fn withdraw_referral_balance(
        &self,
        user_id: UserId,
        gateway: &dyn CashoutGateway,
    ) -> LedgerResult<WithdrawalReceipt> {
        let account = self.get_account(user_id).await?;
        if account.ref_balance < self.settings.min_ref_withdrawal {
            return Err(LedgerError::BelowMinimum {
                minimum: self.settings.min_ref_withdrawal,
                requested: account.ref_balance,
            });
        }
        self.cash_out(user_id, account.ref_balance, WithdrawalSource::Referral, gateway)
            .await
    }

    async fn cash_out(
        &self,
        user_id: UserId,
        amount: Cents,
        source: WithdrawalSource,
        gateway: &dyn CashoutGateway,
    ) -> LedgerResult<WithdrawalReceipt> {
        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = Self::debit_for_withdrawal(&mut tx, user_id, amount, source).await;
        let withdrawal_id = tx.finish(result).await?;

        let description = format!("{} withdrawal #{}", source, withdrawal_id);
        match gateway.create_payout(user_id, amount, &description).await {
            Ok(artifact) => {
                // The payout exists now; a bookkeeping failure must not hide it.
                let marked = sqlx::query(
                    r#"
                    UPDATE withdrawals
                    SET status = ?, reference = ?, processed_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    "#,
                )
                .bind(WithdrawalStatus::Processed.to_string())
                .bind(&artifact.reference)
                .bind(withdrawal_id)
                .execute(&self.pool)
                .await;
                if let Err(e) = marked {
                    log::error!(
                        "Withdrawal {} paid out as {} but left pending: {}",
                        withdrawal_id,
                        artifact.reference,
                        e
                    );
                }

                log::info!(
                    "Withdrawal {} of {} for user {} processed",
                    withdrawal_id,
                    format_cents(amount),
                    user_id
                );

                Ok(WithdrawalReceipt {
                    withdrawal_id,
                    user_id,
                    amount,
                    source,
                    reference: artifact.reference,
                    claim_url: artifact.claim_url,
                })
            }
            Err(gateway_err) => {
                log::error!(
                    "Payout for withdrawal {} failed, restoring {}: {}",
                    withdrawal_id,
                    format_cents(amount),
                    gateway_err
                );
                let mut tx = ImmediateTransaction::begin(&self.pool).await?;
                let restored =
                    Self::restore_withdrawal(&mut tx, withdrawal_id, user_id, amount, source).await;
                tx.finish(restored).await?;

                Err(LedgerError::Gateway(gateway_err.to_string()))
            }
        }
    }

    async fn debit_for_withdrawal(
        conn: &mut SqliteConnection,
        user_id: UserId,
        amount: Cents,
        source: WithdrawalSource,
    ) -> LedgerResult<i64> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let account = store::fetch_account(conn, user_id).await?;
        match source {
            WithdrawalSource::Main => {
                let available = account.clean_balance();
                if amount > available {
                    return Err(LedgerError::InsufficientFunds {
                        available,
                        required: amount,
                    });
                }
                store::adjust_balance(conn, user_id, -amount).await?;
            }
            WithdrawalSource::Referral => {
                if amount > account.ref_balance {
                    return Err(LedgerError::InsufficientFunds {
                        available: account.ref_balance,
                        required: amount,
                    });
                }
                store::update_ref_balance(conn, user_id, -amount).await?;
            }
        }

        let source_name = source.to_string();
        store::record_transaction(
            conn,
            user_id,
            -amount,
            TransactionKind::Withdrawal,
            Some(&source_name),
        )
        .await?;

        let row = sqlx::query(
            "INSERT INTO withdrawals (user_id, amount, source) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(user_id)
        .bind(amount)
        .bind(&source_name)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.get("id"))
    }

    async fn restore_withdrawal(
        conn: &mut SqliteConnection,
        withdrawal_id: i64,
        user_id: UserId,
        amount: Cents,
        source: WithdrawalSource,
    ) -> LedgerResult<()> {
        match source {
            WithdrawalSource::Main => {
                store::adjust_balance(conn, user_id, amount).await?;
            }
            WithdrawalSource::Referral => {
                // Not new earnings, so bypass update_ref_balance.
                sqlx::query("UPDATE accounts SET ref_balance = ref_balance + ? WHERE user_id = ?")
                    .bind(amount)
                    .bind(user_id)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        let source_name = source.to_string();
        store::record_transaction(
            conn,
            user_id,
            amount,
            TransactionKind::WithdrawalRefund,
            Some(&source_name),
        )
        .await?;

        sqlx::query("UPDATE withdrawals SET status = ?, processed_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(WithdrawalStatus::Cancelled.to_string())
            .bind(withdrawal_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}
