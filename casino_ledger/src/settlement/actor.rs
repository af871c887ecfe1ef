//! Background worker that settles queued stakes one at a time.
#![allow(clippy::needless_raw_string_hashes)]

use super::{
    errors::{SettlementError, SettlementResult},
    messages::{DrainReport, SettlementMessage},
    models::{QueueEntry, SettledBet},
    outcome::{BetObserver, OutcomeSource},
    queue::{self, BetQueue},
};
use crate::db::ImmediateTransaction;
use crate::game::{GameOutcome, Wager};
use crate::ledger::{Cents, TransactionKind, UserId, format_cents, store};
use crate::notify::{Notifier, Recipient, notify_quietly};
use crate::settings::SettlementSettings;
use crate::wagering::engine;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Duration, MissedTickBehavior, interval},
};

/// Handle for waking and stopping the settlement worker
#[derive(Clone)]
pub struct SettlementHandle {
    sender: mpsc::Sender<SettlementMessage>,
}

impl SettlementHandle {
    /// Signal that new work was enqueued.
    ///
    /// Never blocks. A full inbox already holds a pending wake-up.
    pub fn wake(&self) {
        match self.sender.try_send(SettlementMessage::Wake) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::error!("Settlement worker is not running, stake stays queued");
            }
        }
    }

    /// Settle everything pending and wait for the result.
    pub async fn drain(&self) -> SettlementResult<DrainReport> {
        let (response, report) = oneshot::channel();
        self.sender
            .send(SettlementMessage::Drain { response })
            .await
            .map_err(|_| SettlementError::WorkerStopped)?;
        report.await.map_err(|_| SettlementError::WorkerStopped)
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(SettlementMessage::Shutdown).await;
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Single consumer of the bet queue.
///
/// Entries are settled strictly in ID order. An entry that fails stays
/// pending and is never retried by this worker; the startup sweep of the
/// next process, or an operator, resolves it.
pub struct SettlementActor {
    pool: SqlitePool,
    queue: BetQueue,
    inbox: mpsc::Receiver<SettlementMessage>,
    outcome: Arc<dyn OutcomeSource>,
    notifier: Arc<dyn Notifier>,
    observers: Vec<Arc<dyn BetObserver>>,
    settings: SettlementSettings,
    /// Entries that errored; skipped for the life of the worker
    failed: HashSet<i64>,
    settled_total: u64,
}

impl SettlementActor {
    /// Create a new settlement worker
    ///
    /// # Returns
    ///
    /// * `(SettlementActor, SettlementHandle)` - Worker and handle for sending messages
    pub fn new(
        pool: SqlitePool,
        outcome: Arc<dyn OutcomeSource>,
        notifier: Arc<dyn Notifier>,
        settings: SettlementSettings,
    ) -> (Self, SettlementHandle) {
        let (sender, inbox) = mpsc::channel(100);

        let actor = Self {
            queue: BetQueue::new(pool.clone()),
            pool,
            inbox,
            outcome,
            notifier,
            observers: Vec::new(),
            settings,
            failed: HashSet::new(),
            settled_total: 0,
        };

        (actor, SettlementHandle { sender })
    }

    pub fn with_observer(mut self, observer: Arc<dyn BetObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Forfeit entries left by a previous process, then spawn the loop.
    ///
    /// Must complete before the first stake of this process is placed.
    pub async fn start(self) -> SettlementResult<JoinHandle<()>> {
        self.queue.sweep_pending().await?;
        Ok(tokio::spawn(self.run()))
    }

    /// Run the worker event loop
    pub async fn run(mut self) {
        log::info!("Settlement worker starting");

        let mut poll = interval(self.settings.poll_interval.max(Duration::from_millis(100)));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = self.inbox.recv() => match message {
                    Some(SettlementMessage::Wake) => {
                        self.drain().await;
                    }
                    Some(SettlementMessage::Drain { response }) => {
                        let report = self.drain().await;
                        let _ = response.send(report);
                    }
                    Some(SettlementMessage::Shutdown) | None => break,
                },

                _ = poll.tick() => {
                    self.drain().await;
                }
            }
        }

        log::info!("Settlement worker stopped after {} bets", self.settled_total);
    }

    async fn drain(&mut self) -> DrainReport {
        let mut report = DrainReport::default();

        loop {
            let batch = match self.queue.oldest_pending(self.failed.len() as i64 + 1).await {
                Ok(batch) => batch,
                Err(e) => {
                    log::error!("Failed to read bet queue: {}", e);
                    break;
                }
            };
            let Some(entry) = batch.into_iter().find(|e| !self.failed.contains(&e.id)) else {
                break;
            };

            let queue_id = entry.id;
            match self.process(entry).await {
                Ok(Some(bet)) => {
                    report.settled += 1;
                    self.settled_total += 1;
                    self.announce(&bet).await;
                }
                Ok(None) => {}
                Err(SettlementError::AlreadySettled(id)) => {
                    log::warn!("Bet #{} was processed elsewhere, skipping", id);
                }
                Err(e) => {
                    log::error!("Failed to settle bet #{}: {}", queue_id, e);
                    self.failed.insert(queue_id);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Settle one entry. Returns `None` when the entry was voided instead.
    async fn process(&self, entry: QueueEntry) -> SettlementResult<Option<SettledBet>> {
        let wager = match Wager::parse(&entry.game, &entry.bet_type) {
            Ok(wager) => wager,
            Err(e) => {
                log::error!("Bet #{} is unplayable ({}), refunding", entry.id, e);
                let mut tx = ImmediateTransaction::begin(&self.pool).await?;
                let result = void_entry(&mut tx, &entry).await;
                tx.finish(result).await?;
                return Ok(None);
            }
        };

        let rolls = self.outcome.roll(&entry, &wager).await;
        let outcome = wager.settle(entry.amount, &rolls);

        let mut tx = ImmediateTransaction::begin(&self.pool).await?;
        let result = apply_outcome(&mut tx, &entry, &outcome, self.settings.referral_share_percent).await;
        let referral_reward = tx.finish(result).await?;

        log::debug!(
            "Settled bet #{} for user {}: {} -> {}",
            entry.id,
            entry.user_id,
            wager,
            format_cents(outcome.payout)
        );

        Ok(Some(SettledBet {
            queue_id: entry.id,
            user_id: entry.user_id,
            stake: entry.amount,
            wager,
            rolls,
            outcome,
            is_bonus_bet: entry.is_bonus_bet,
            referral_reward,
        }))
    }

    async fn announce(&self, bet: &SettledBet) {
        let text = if bet.outcome.won {
            format!(
                "Bet #{} {}: won {} (x{})",
                bet.queue_id,
                bet.wager,
                format_cents(bet.outcome.payout),
                bet.outcome.multiplier.normalize()
            )
        } else {
            format!(
                "Bet #{} {}: lost {}",
                bet.queue_id,
                bet.wager,
                format_cents(bet.stake)
            )
        };

        notify_quietly(self.notifier.as_ref(), Recipient::User(bet.user_id), &text).await;
        notify_quietly(self.notifier.as_ref(), Recipient::Channel, &text).await;

        if let Some((referrer, reward)) = bet.referral_reward {
            notify_quietly(
                self.notifier.as_ref(),
                Recipient::User(referrer),
                &format!("Referral reward: {}", format_cents(reward)),
            )
            .await;
        }

        for observer in &self.observers {
            if let Err(e) = observer.bet_settled(bet).await {
                log::warn!("Bet #{} observer failed: {:#}", bet.queue_id, e);
            }
        }
    }
}

/// Apply a settled outcome and retire the entry.
///
/// # Returns
///
/// * `SettlementResult<Option<(UserId, Cents)>>` - Referral reward paid, if any
async fn apply_outcome(
    conn: &mut SqliteConnection,
    entry: &QueueEntry,
    outcome: &GameOutcome,
    referral_share_percent: i64,
) -> SettlementResult<Option<(UserId, Cents)>> {
    if !queue::mark_processed(conn, entry.id).await? {
        return Err(SettlementError::AlreadySettled(entry.id));
    }

    let user_id = entry.user_id;
    let mut referral_reward = None;

    if outcome.payout > 0 {
        store::adjust_balance(conn, user_id, outcome.payout).await?;

        // Winnings from bonus stakes stay locked while a requirement is open
        if entry.is_bonus_bet && engine::wagering_info(conn, user_id).await?.is_locked() {
            store::increase_bonus_balance(conn, user_id, outcome.payout).await?;
        }

        store::record_transaction(conn, user_id, outcome.payout, TransactionKind::Win, Some(&entry.game))
            .await?;

        let reward = outcome.payout * referral_share_percent / 100;
        if reward > 0 {
            if let Some(referrer) = store::referrer_of(conn, user_id).await? {
                store::update_ref_balance(conn, referrer, reward).await?;
                referral_reward = Some((referrer, reward));
            }
        }
    } else {
        engine::clear_if_underwater(conn, user_id).await?;
    }

    sqlx::query(
        r#"
        INSERT INTO bets (queue_id, user_id, amount, game, bet_type, is_bonus_bet, won, payout)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id)
    .bind(user_id)
    .bind(entry.amount)
    .bind(&entry.game)
    .bind(&entry.bet_type)
    .bind(entry.is_bonus_bet)
    .bind(outcome.won)
    .bind(outcome.payout)
    .execute(&mut *conn)
    .await?;

    Ok(referral_reward)
}

/// Return the stake of an entry that cannot be played and take it back out
/// of turnover and wagering progress.
async fn void_entry(conn: &mut SqliteConnection, entry: &QueueEntry) -> SettlementResult<()> {
    if !queue::mark_processed(conn, entry.id).await? {
        return Err(SettlementError::AlreadySettled(entry.id));
    }

    if entry.is_bonus_bet {
        store::refund_bonus_funds(conn, entry.user_id, entry.amount).await?;
    } else {
        store::adjust_balance(conn, entry.user_id, entry.amount).await?;
    }
    engine::restore_wager(conn, entry.user_id, entry.amount).await?;
    store::record_transaction(
        conn,
        entry.user_id,
        entry.amount,
        TransactionKind::StakeRefund,
        Some(&entry.game),
    )
    .await?;
    Ok(())
}
