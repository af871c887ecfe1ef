//! Integration tests for stake placement and the settlement worker.
//!
//! Outcomes come from a scripted source so every payout is known up front.

use async_trait::async_trait;
use casino_ledger::db::Database;
use casino_ledger::game::{CubeBet, Rolls, TwoDiceBet, Wager};
use casino_ledger::ledger::{LedgerManager, TransactionKind, UserId};
use casino_ledger::notify::{Notifier, NotifyError, Recipient};
use casino_ledger::settings::{BetLimits, SettlementSettings};
use casino_ledger::settlement::{
    BetManager, BetObserver, BetQueue, Funding, OutcomeSource, QueueEntry, SettledBet,
    SettlementActor, SettlementError, SettlementHandle,
};
use casino_ledger::voucher::{NewVoucher, VoucherManager};
use casino_ledger::wagering::WageringEngine;
use rust_decimal_macros::dec;
use sqlx::Row;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Hands out queued rolls and remembers which entries asked
#[derive(Default)]
struct ScriptedOutcomes {
    rolls: Mutex<VecDeque<Rolls>>,
    seen: Mutex<Vec<i64>>,
}

impl ScriptedOutcomes {
    fn new(rolls: impl IntoIterator<Item = Rolls>) -> Arc<Self> {
        Arc::new(Self {
            rolls: Mutex::new(rolls.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<i64> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutcomeSource for ScriptedOutcomes {
    async fn roll(&self, entry: &QueueEntry, _wager: &Wager) -> Rolls {
        self.seen.lock().unwrap().push(entry.id);
        self.rolls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Rolls::pair(1, 1))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(Recipient, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: Recipient, message: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((recipient, message.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct StakeTally {
    stakes: Mutex<Vec<(UserId, i64)>>,
}

#[async_trait]
impl BetObserver for StakeTally {
    async fn bet_settled(&self, bet: &SettledBet) -> anyhow::Result<()> {
        self.stakes.lock().unwrap().push((bet.user_id, bet.stake));
        Ok(())
    }
}

struct Harness {
    db: Database,
    ledger: LedgerManager,
    bets: BetManager,
    handle: SettlementHandle,
    actor: Option<SettlementActor>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    async fn new(outcomes: Arc<ScriptedOutcomes>) -> Self {
        Self::with_observer(outcomes, None).await
    }

    async fn with_observer(
        outcomes: Arc<ScriptedOutcomes>,
        observer: Option<Arc<dyn BetObserver>>,
    ) -> Self {
        let db = Database::in_memory().await.expect("in-memory database");
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = SettlementSettings {
            pacing: Duration::ZERO,
            poll_interval: Duration::from_secs(60),
            ..SettlementSettings::default()
        };
        let (mut actor, handle) =
            SettlementActor::new(db.pool().clone(), outcomes, notifier.clone(), settings);
        if let Some(observer) = observer {
            actor = actor.with_observer(observer);
        }

        Self {
            ledger: LedgerManager::new(db.pool().clone()),
            bets: BetManager::new(db.pool().clone(), BetLimits::default(), handle.clone()),
            db,
            handle,
            actor: Some(actor),
            notifier,
        }
    }

    async fn account(&self, user_id: UserId, balance: i64) {
        self.account_referred(user_id, balance, None).await;
    }

    async fn account_referred(&self, user_id: UserId, balance: i64, referrer: Option<UserId>) {
        self.ledger
            .create_account(user_id, Some(&format!("user{}", user_id)), None, referrer)
            .await
            .expect("account created");
        if balance > 0 {
            self.ledger.adjust_balance(user_id, balance).await.unwrap();
        }
    }

    /// Spawn the worker loop without the startup sweep.
    fn run_worker(&mut self) {
        if let Some(actor) = self.actor.take() {
            tokio::spawn(actor.run());
        }
    }

    async fn settle_all(&mut self) {
        self.run_worker();
        let report = self.handle.drain().await.expect("worker running");
        assert_eq!(report.failed, 0);
    }
}

const EVEN: Wager = Wager::Cube(CubeBet::Even);

#[tokio::test]
async fn test_place_bet_debits_and_enqueues() {
    let harness = Harness::new(ScriptedOutcomes::new([])).await;
    harness.account(1, 1000).await;

    let receipt = harness.bets.place_bet(1, 300, &EVEN, Funding::Main).await.unwrap();
    assert_eq!(receipt.amount, 300);
    assert!(!receipt.wagering.released);

    assert_eq!(harness.ledger.get_account(1).await.unwrap().balance, 700);
    let pending = harness.bets.pending_bet(1).await.unwrap().expect("queued");
    assert_eq!(pending.id, receipt.queue_id);
    assert_eq!((pending.game.as_str(), pending.bet_type.as_str()), ("cube", "even"));

    let history = harness.ledger.get_transactions(1, 1).await.unwrap();
    assert_eq!(history[0].kind, TransactionKind::Game);
    assert_eq!(history[0].amount, -300);
}

#[tokio::test]
async fn test_second_pending_bet_rejected() {
    let harness = Harness::new(ScriptedOutcomes::new([])).await;
    harness.account(1, 1000).await;

    let first = harness.bets.place_bet(1, 100, &EVEN, Funding::Main).await.unwrap();
    let second = harness.bets.place_bet(1, 100, &EVEN, Funding::Main).await;

    match second {
        Err(SettlementError::BetPending { queue_id }) => assert_eq!(queue_id, first.queue_id),
        other => panic!("expected BetPending, got {:?}", other),
    }
    assert_eq!(harness.ledger.get_account(1).await.unwrap().balance, 900);
}

#[tokio::test]
async fn test_bet_limits_and_funds() {
    let harness = Harness::new(ScriptedOutcomes::new([])).await;
    harness.account(1, 500).await;
    harness.ledger.increase_bonus_balance(1, 100).await.unwrap();

    assert!(matches!(
        harness.bets.place_bet(1, 10, &EVEN, Funding::Main).await,
        Err(SettlementError::BetOutOfRange { min: 30, .. })
    ));
    assert!(matches!(
        harness.bets.place_bet(1, 450, &EVEN, Funding::Main).await,
        Err(SettlementError::InsufficientFunds { available: 400, required: 450 })
    ));
    assert!(matches!(
        harness.bets.place_bet(1, 150, &EVEN, Funding::Bonus).await,
        Err(SettlementError::InsufficientBonus { available: 100, required: 150 })
    ));

    let account = harness.ledger.get_account(1).await.unwrap();
    assert_eq!((account.balance, account.bonus_balance), (500, 100));
    assert!(harness.bets.pending_bet(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_settles_in_queue_order() {
    let outcomes = ScriptedOutcomes::new([
        Rolls::single(2),
        Rolls::single(1),
        Rolls::pair(3, 3),
    ]);
    let tally = Arc::new(StakeTally::default());
    let mut harness = Harness::with_observer(outcomes.clone(), Some(tally.clone())).await;
    for user in 1..=3 {
        harness.account(user, 1000).await;
    }

    let a = harness.bets.place_bet(1, 100, &EVEN, Funding::Main).await.unwrap();
    let b = harness.bets.place_bet(2, 100, &EVEN, Funding::Main).await.unwrap();
    let c = harness
        .bets
        .place_bet(3, 100, &Wager::TwoDice(TwoDiceBet::Draw), Funding::Main)
        .await
        .unwrap();

    harness.settle_all().await;

    assert_eq!(outcomes.seen(), vec![a.queue_id, b.queue_id, c.queue_id]);
    // even on 2 pays 1.85x, even on 1 loses, a double pays 3x
    assert_eq!(harness.ledger.get_account(1).await.unwrap().balance, 1085);
    assert_eq!(harness.ledger.get_account(2).await.unwrap().balance, 900);
    assert_eq!(harness.ledger.get_account(3).await.unwrap().balance, 1200);

    let queue = BetQueue::new(harness.db.pool().clone());
    assert_eq!(queue.pending_count().await.unwrap(), 0);

    let settled: i64 = sqlx::query("SELECT COUNT(*) AS n FROM bets")
        .fetch_one(harness.db.pool())
        .await
        .unwrap()
        .get("n");
    assert_eq!(settled, 3);

    assert_eq!(*tally.stakes.lock().unwrap(), vec![(1, 100), (2, 100), (3, 100)]);

    let sent = harness.notifier.sent.lock().unwrap();
    assert!(sent.iter().any(|(to, _)| *to == Recipient::User(2)));
    assert!(sent.iter().any(|(to, _)| *to == Recipient::Channel));
}

#[tokio::test]
async fn test_settled_user_can_bet_again() {
    let mut harness = Harness::new(ScriptedOutcomes::new([Rolls::single(1)])).await;
    harness.account(1, 1000).await;

    harness.bets.place_bet(1, 100, &EVEN, Funding::Main).await.unwrap();
    harness.settle_all().await;

    assert!(harness.bets.place_bet(1, 100, &EVEN, Funding::Main).await.is_ok());
}

#[tokio::test]
async fn test_win_pays_referral_share() {
    let mut harness = Harness::new(ScriptedOutcomes::new([Rolls::single(4)])).await;
    harness.account(1, 0).await;
    harness.account_referred(2, 1000, Some(1)).await;

    harness.bets.place_bet(2, 1000, &EVEN, Funding::Main).await.unwrap();
    harness.settle_all().await;

    assert_eq!(harness.ledger.get_account(2).await.unwrap().balance, 1850);
    let referrer = harness.ledger.get_account(1).await.unwrap();
    assert_eq!(referrer.ref_balance, 277);
    assert_eq!(referrer.ref_earnings, 277);
    assert_eq!(referrer.balance, 0);

    let stats = harness.ledger.user_stats(2).await.unwrap();
    assert_eq!((stats.total_games, stats.wins, stats.total_won), (1, 1, 1850));
}

#[tokio::test]
async fn test_loss_pays_no_referral_share() {
    let mut harness = Harness::new(ScriptedOutcomes::new([Rolls::single(3)])).await;
    harness.account(1, 0).await;
    harness.account_referred(2, 1000, Some(1)).await;

    harness.bets.place_bet(2, 500, &EVEN, Funding::Main).await.unwrap();
    harness.settle_all().await;

    assert_eq!(harness.ledger.get_account(1).await.unwrap().ref_balance, 0);
    assert_eq!(harness.ledger.user_stats(2).await.unwrap().total_lost, 500);
}

async fn lock_five_dollar_bonus(harness: &Harness, user_id: UserId) {
    harness.account(99, 10_000).await;
    let vouchers = VoucherManager::new(harness.db.pool().clone());
    let voucher = vouchers.create_voucher(NewVoucher::single(99, 500)).await.unwrap();
    vouchers.set_wagering_multiplier(&voucher.voucher_id, dec!(2)).await.unwrap();
    vouchers.redeem_voucher(&voucher.voucher_id, user_id).await.unwrap();
}

#[tokio::test]
async fn test_ten_dollars_of_stakes_release_five_dollar_bonus() {
    let mut harness =
        Harness::new(ScriptedOutcomes::new([Rolls::single(1), Rolls::single(1)])).await;
    harness.account(1, 2000).await;
    lock_five_dollar_bonus(&harness, 1).await;

    let account = harness.ledger.get_account(1).await.unwrap();
    assert_eq!((account.bonus_balance, account.wager_left), (500, 1000));

    let first = harness.bets.place_bet(1, 600, &EVEN, Funding::Main).await.unwrap();
    assert_eq!(first.wagering.wager_left, 400);
    harness.settle_all().await;

    let second = harness.bets.place_bet(1, 400, &EVEN, Funding::Main).await.unwrap();
    assert!(second.wagering.released);
    harness.handle.drain().await.unwrap();

    let account = harness.ledger.get_account(1).await.unwrap();
    assert_eq!(account.balance, 1500);
    assert_eq!((account.bonus_balance, account.wager_left, account.wager_total), (0, 0, 0));
}

#[tokio::test]
async fn test_bonus_win_stays_locked_while_requirement_open() {
    let mut harness = Harness::new(ScriptedOutcomes::new([Rolls::single(2)])).await;
    harness.account(1, 2000).await;
    lock_five_dollar_bonus(&harness, 1).await;

    harness.bets.place_bet(1, 200, &EVEN, Funding::Bonus).await.unwrap();
    let account = harness.ledger.get_account(1).await.unwrap();
    assert_eq!((account.balance, account.bonus_balance, account.wager_left), (2300, 300, 800));

    harness.settle_all().await;

    let account = harness.ledger.get_account(1).await.unwrap();
    assert_eq!(account.balance, 2670);
    assert_eq!(account.bonus_balance, 670);
    assert_eq!(account.clean_balance(), 2000);
}

#[tokio::test]
async fn test_bonus_only_player_loses_lock_at_first_stake() {
    let harness = Harness::new(ScriptedOutcomes::new([])).await;
    harness.account(1, 0).await;
    lock_five_dollar_bonus(&harness, 1).await;

    harness.bets.place_bet(1, 100, &EVEN, Funding::Bonus).await.unwrap();

    let account = harness.ledger.get_account(1).await.unwrap();
    assert_eq!(account.balance, 400);
    assert_eq!((account.bonus_balance, account.wager_left), (0, 0));
}

#[tokio::test]
async fn test_startup_sweep_forfeits_leftovers() {
    let outcomes = ScriptedOutcomes::new([]);
    let mut harness = Harness::new(outcomes.clone()).await;
    harness.account(1, 1000).await;
    harness.account(2, 1000).await;

    harness.bets.place_bet(1, 100, &EVEN, Funding::Main).await.unwrap();
    harness.bets.place_bet(2, 100, &EVEN, Funding::Main).await.unwrap();

    let actor = harness.actor.take().expect("actor not started");
    actor.start().await.expect("worker started");
    let report = harness.handle.drain().await.unwrap();

    assert_eq!(report.settled, 0);
    assert!(outcomes.seen().is_empty());
    assert_eq!(harness.ledger.get_account(1).await.unwrap().balance, 900);
    assert!(harness.bets.pending_bet(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unplayable_entry_is_refunded() {
    let mut harness = Harness::new(ScriptedOutcomes::new([])).await;
    harness.account(1, 1000).await;

    let queue = BetQueue::new(harness.db.pool().clone());
    harness.ledger.adjust_balance(1, -100).await.unwrap();
    queue.add_to_queue(1, 100, "roulette", "red", false).await.unwrap();

    harness.settle_all().await;

    assert_eq!(harness.ledger.get_account(1).await.unwrap().balance, 1000);
    assert_eq!(queue.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_refunded_stake_leaves_no_turnover_or_wager_progress() {
    let mut harness = Harness::new(ScriptedOutcomes::new([])).await;
    harness.account(1, 2000).await;
    lock_five_dollar_bonus(&harness, 1).await;

    // Placement side of a stake on a game the worker cannot play
    let wagering = WageringEngine::new(harness.db.pool().clone());
    harness.ledger.adjust_balance(1, -300).await.unwrap();
    harness
        .ledger
        .add_transaction(1, -300, TransactionKind::Game, Some("roulette"))
        .await
        .unwrap();
    assert_eq!(wagering.consume_wager(1, 300).await.unwrap().wager_left, 700);
    BetQueue::new(harness.db.pool().clone())
        .add_to_queue(1, 300, "roulette", "red", false)
        .await
        .unwrap();

    harness.settle_all().await;

    let account = harness.ledger.get_account(1).await.unwrap();
    assert_eq!(account.balance, 2500);
    assert_eq!((account.wager_left, account.wager_total), (1000, 1000));

    let stats = harness.ledger.user_stats(1).await.unwrap();
    assert_eq!((stats.total_games, stats.turnover), (0, 0));

    let last = &harness.ledger.get_transactions(1, 1).await.unwrap()[0];
    assert_eq!(last.kind, TransactionKind::StakeRefund);
    assert_eq!(last.amount, 300);
}

#[tokio::test]
async fn test_drain_after_shutdown_reports_stopped() {
    let mut harness = Harness::new(ScriptedOutcomes::new([])).await;
    harness.run_worker();

    harness.handle.shutdown().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(matches!(
        harness.handle.drain().await,
        Err(SettlementError::WorkerStopped)
    ));
}
