//! Stake placement.

use super::{
    actor::SettlementHandle,
    errors::{SettlementError, SettlementResult},
    models::{BetReceipt, Funding, QueueEntry},
    queue,
};
use crate::db::ImmediateTransaction;
use crate::game::Wager;
use crate::ledger::{Cents, TransactionKind, UserId, format_cents, store};
use crate::settings::BetLimits;
use crate::wagering::engine;
use sqlx::sqlite::{SqliteConnection, SqlitePool};

/// Funds stakes and hands them to the settlement worker
#[derive(Clone)]
pub struct BetManager {
    pool: SqlitePool,
    limits: BetLimits,
    settlement: SettlementHandle,
}

impl BetManager {
    pub fn new(pool: SqlitePool, limits: BetLimits, settlement: SettlementHandle) -> Self {
        Self {
            pool,
            limits,
            settlement,
        }
    }

    pub fn limits(&self) -> BetLimits {
        self.limits
    }

    /// Debit a stake and enqueue it for settlement.
    ///
    /// Debit, wagering progress and enqueue commit together. A user may have
    /// at most one pending stake.
    ///
    /// # Errors
    ///
    /// * `SettlementError::BetOutOfRange` - Amount outside the configured limits
    /// * `SettlementError::BetPending` - Previous stake not settled yet
    /// * `SettlementError::InsufficientFunds` - Clean balance below the stake
    /// * `SettlementError::InsufficientBonus` - Bonus pool cannot back the stake
    pub async fn place_bet(
        &self,
        user_id: UserId,
        amount: Cents,
        wager: &Wager,
        funding: Funding,
    ) -> SettlementResult<BetReceipt> {
        if !self.limits.contains(amount) {
            return Err(SettlementError::BetOutOfRange {
                min: self.limits.min_bet,
                max: self.limits.max_bet,
                requested: amount,
            });
        }

        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = fund_and_enqueue(&mut tx, user_id, amount, wager, funding).await;
        let receipt = tx.finish(result).await?;

        log::info!(
            "User {} staked {} on {} (bet #{}, {:?})",
            user_id,
            format_cents(amount),
            wager,
            receipt.queue_id,
            funding
        );

        self.settlement.wake();
        Ok(receipt)
    }

    pub async fn pending_bet(&self, user_id: UserId) -> SettlementResult<Option<QueueEntry>> {
        let mut conn = self.pool.acquire().await?;
        Ok(queue::pending_for_user(&mut conn, user_id).await?)
    }
}

async fn fund_and_enqueue(
    conn: &mut SqliteConnection,
    user_id: UserId,
    amount: Cents,
    wager: &Wager,
    funding: Funding,
) -> SettlementResult<BetReceipt> {
    if let Some(pending) = queue::pending_for_user(conn, user_id).await? {
        return Err(SettlementError::BetPending {
            queue_id: pending.id,
        });
    }

    let account = store::fetch_account(conn, user_id).await?;
    match funding {
        Funding::Main => {
            let available = account.clean_balance();
            if available < amount {
                return Err(SettlementError::InsufficientFunds {
                    available,
                    required: amount,
                });
            }
            store::adjust_balance(conn, user_id, -amount).await?;
        }
        Funding::Bonus => {
            if !store::deduct_bonus_funds(conn, user_id, amount).await? {
                return Err(SettlementError::InsufficientBonus {
                    available: account.spendable_bonus(),
                    required: amount,
                });
            }
        }
    }

    let game = wager.game_key();
    let wagering = engine::consume_wager(conn, user_id, amount).await?;
    engine::clear_if_underwater(conn, user_id).await?;
    store::record_transaction(conn, user_id, -amount, TransactionKind::Game, Some(game)).await?;

    let queue_id = queue::add_to_queue(
        conn,
        user_id,
        amount,
        game,
        &wager.bet_key(),
        funding == Funding::Bonus,
    )
    .await?;

    Ok(BetReceipt {
        queue_id,
        user_id,
        amount,
        wager: *wager,
        funding,
        wagering,
    })
}
