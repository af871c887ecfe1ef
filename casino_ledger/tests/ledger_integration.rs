//! Integration tests for the account ledger.
//!
//! Balances, bonus pool spending, turnover bonuses and the two-phase
//! withdrawal flow against an in-memory database.

use async_trait::async_trait;
use casino_ledger::db::Database;
use casino_ledger::ledger::{
    CashoutArtifact, CashoutGateway, GatewayError, LedgerError, LedgerManager, ManualPayoutGateway,
    TransactionKind, UserId,
};
use casino_ledger::settings::LedgerSettings;
use sqlx::Row;
use std::sync::atomic::{AtomicUsize, Ordering};

async fn setup() -> (Database, LedgerManager) {
    let db = Database::in_memory().await.expect("in-memory database");
    let ledger = LedgerManager::new(db.pool().clone());
    (db, ledger)
}

async fn funded_account(ledger: &LedgerManager, user_id: UserId, balance: i64) {
    ledger
        .create_account(user_id, Some(&format!("user{}", user_id)), None, None)
        .await
        .expect("account created");
    if balance > 0 {
        ledger.adjust_balance(user_id, balance).await.expect("funded");
    }
}

/// Gateway that always fails and counts calls
#[derive(Default)]
struct DownGateway {
    calls: AtomicUsize,
}

#[async_trait]
impl CashoutGateway for DownGateway {
    async fn create_payout(
        &self,
        _user_id: UserId,
        _amount: i64,
        _description: &str,
    ) -> Result<CashoutArtifact, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GatewayError::Unavailable("maintenance".to_string()))
    }
}

#[tokio::test]
async fn test_create_account_is_idempotent() {
    let (_db, ledger) = setup().await;

    assert!(ledger.create_account(1, Some("alice"), Some("Alice"), None).await.unwrap());
    assert!(!ledger.create_account(1, Some("alice"), None, None).await.unwrap());

    let account = ledger.get_account(1).await.unwrap();
    assert_eq!(account.balance, 0);
    assert_eq!(account.username.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_referrer_recorded_only_when_valid() {
    let (_db, ledger) = setup().await;
    funded_account(&ledger, 1, 0).await;

    ledger.create_account(2, Some("bob"), None, Some(1)).await.unwrap();
    ledger.create_account(3, Some("carol"), None, Some(3)).await.unwrap();
    ledger.create_account(4, Some("dave"), None, Some(999)).await.unwrap();

    assert_eq!(ledger.get_referrer(2).await.unwrap(), Some(1));
    assert_eq!(ledger.get_referrer(3).await.unwrap(), None);
    assert_eq!(ledger.get_referrer(4).await.unwrap(), None);
    assert_eq!(ledger.get_account(1).await.unwrap().ref_count, 1);
}

#[tokio::test]
async fn test_lookup_by_username_ignores_at_and_case() {
    let (_db, ledger) = setup().await;
    ledger.create_account(7, Some("Alice"), None, None).await.unwrap();

    let found = ledger.get_account_by_username("@alice").await.unwrap();
    assert_eq!(found.map(|a| a.user_id), Some(7));
    assert!(ledger.get_account_by_username("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_adjust_balance_clamps_at_zero() {
    let (_db, ledger) = setup().await;
    funded_account(&ledger, 1, 500).await;

    assert_eq!(ledger.adjust_balance(1, -800).await.unwrap(), 0);
    assert!(matches!(
        ledger.adjust_balance(42, 100).await,
        Err(LedgerError::AccountNotFound(42))
    ));
}

#[tokio::test]
async fn test_deduct_bonus_funds_is_all_or_nothing() {
    let (_db, ledger) = setup().await;
    funded_account(&ledger, 1, 1000).await;
    ledger.increase_bonus_balance(1, 300).await.unwrap();

    // Bonus pool short
    assert!(!ledger.deduct_bonus_funds(1, 400).await.unwrap());
    let account = ledger.get_account(1).await.unwrap();
    assert_eq!((account.balance, account.bonus_balance), (1000, 300));

    assert!(ledger.deduct_bonus_funds(1, 300).await.unwrap());
    let account = ledger.get_account(1).await.unwrap();
    assert_eq!((account.balance, account.bonus_balance), (700, 0));

    // Main balance short
    ledger.adjust_balance(1, -650).await.unwrap();
    ledger.increase_bonus_balance(1, 100).await.unwrap();
    assert!(!ledger.deduct_bonus_funds(1, 80).await.unwrap());
    let account = ledger.get_account(1).await.unwrap();
    assert_eq!((account.balance, account.bonus_balance), (50, 100));

    assert!(ledger.deduct_bonus_funds(1, 0).await.unwrap());
    assert!(!ledger.deduct_bonus_funds(99, 10).await.unwrap());
}

#[tokio::test]
async fn test_refund_bonus_funds_restores_both_balances() {
    let (_db, ledger) = setup().await;
    funded_account(&ledger, 1, 500).await;
    ledger.increase_bonus_balance(1, 200).await.unwrap();

    assert!(ledger.deduct_bonus_funds(1, 150).await.unwrap());
    ledger.refund_bonus_funds(1, 150).await.unwrap();

    let account = ledger.get_account(1).await.unwrap();
    assert_eq!((account.balance, account.bonus_balance), (500, 200));
}

#[tokio::test]
async fn test_transactions_newest_first() {
    let (_db, ledger) = setup().await;
    funded_account(&ledger, 1, 0).await;

    ledger.add_transaction(1, -100, TransactionKind::Game, Some("cube")).await.unwrap();
    ledger.add_transaction(1, 185, TransactionKind::Win, Some("cube")).await.unwrap();

    let history = ledger.get_transactions(1, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, TransactionKind::Win);
    assert_eq!(history[1].amount, -100);
    assert_eq!(history[1].game.as_deref(), Some("cube"));

    let stats = ledger.user_stats(1).await.unwrap();
    assert_eq!(stats.total_games, 1);
    assert_eq!(stats.wins, 1);
    assert_eq!(stats.turnover, 100);
    assert_eq!(stats.total_won, 185);
}

#[tokio::test]
async fn test_turnover_bonus_pays_each_milestone_once() {
    let (db, _) = setup().await;
    let settings = LedgerSettings {
        turnover_bonus_step: 10_000,
        turnover_bonus_amount: 500,
        ..LedgerSettings::default()
    };
    let ledger = LedgerManager::with_settings(db.pool().clone(), settings);
    funded_account(&ledger, 1, 0).await;

    assert!(matches!(
        ledger.claim_turnover_bonus(1).await,
        Err(LedgerError::NoBonusAvailable)
    ));

    ledger.add_transaction(1, -25_000, TransactionKind::Game, Some("cube")).await.unwrap();
    assert_eq!(ledger.claim_turnover_bonus(1).await.unwrap(), 1000);
    assert!(matches!(
        ledger.claim_turnover_bonus(1).await,
        Err(LedgerError::NoBonusAvailable)
    ));

    ledger.add_transaction(1, -5_000, TransactionKind::Game, Some("cube")).await.unwrap();
    assert_eq!(ledger.claim_turnover_bonus(1).await.unwrap(), 500);

    let account = ledger.get_account(1).await.unwrap();
    assert_eq!(account.balance, 1500);
    assert_eq!(account.last_claimed_turnover, 30_000);
}

#[tokio::test]
async fn test_withdraw_debits_and_records() {
    let (db, ledger) = setup().await;
    funded_account(&ledger, 1, 5000).await;

    let receipt = ledger.withdraw(1, 1200, &ManualPayoutGateway).await.unwrap();
    assert_eq!(receipt.amount, 1200);
    assert!(receipt.reference.starts_with("manual-"));
    assert_eq!(ledger.get_account(1).await.unwrap().balance, 3800);

    let status: String = sqlx::query("SELECT status FROM withdrawals WHERE id = ?")
        .bind(receipt.withdrawal_id)
        .fetch_one(db.pool())
        .await
        .unwrap()
        .get("status");
    assert_eq!(status, "processed");
}

#[tokio::test]
async fn test_issued_payout_survives_bookkeeping_failure() {
    let (db, ledger) = setup().await;
    funded_account(&ledger, 1, 5000).await;
    sqlx::query(
        "CREATE TRIGGER freeze_withdrawals BEFORE UPDATE ON withdrawals \
         BEGIN SELECT RAISE(ABORT, 'withdrawals frozen'); END",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let receipt = ledger.withdraw(1, 1200, &ManualPayoutGateway).await.unwrap();
    assert!(receipt.reference.starts_with("manual-"));
    assert_eq!(ledger.get_account(1).await.unwrap().balance, 3800);

    let status: String = sqlx::query("SELECT status FROM withdrawals WHERE id = ?")
        .bind(receipt.withdrawal_id)
        .fetch_one(db.pool())
        .await
        .unwrap()
        .get("status");
    assert_eq!(status, "pending");
}

#[tokio::test]
async fn test_withdraw_limits() {
    let (_db, ledger) = setup().await;
    funded_account(&ledger, 1, 1000).await;
    ledger.increase_bonus_balance(1, 600).await.unwrap();

    assert!(matches!(
        ledger.withdraw(1, 100, &ManualPayoutGateway).await,
        Err(LedgerError::BelowMinimum { minimum: 200, requested: 100 })
    ));
    // Locked bonus is not withdrawable
    assert!(matches!(
        ledger.withdraw(1, 500, &ManualPayoutGateway).await,
        Err(LedgerError::InsufficientFunds { available: 400, required: 500 })
    ));
}

#[tokio::test]
async fn test_failed_payout_restores_funds() {
    let (db, ledger) = setup().await;
    funded_account(&ledger, 1, 5000).await;
    let gateway = DownGateway::default();

    let result = ledger.withdraw(1, 2000, &gateway).await;
    assert!(matches!(result, Err(LedgerError::Gateway(_))), "got {:?}", result);
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.get_account(1).await.unwrap().balance, 5000);

    let status: String = sqlx::query("SELECT status FROM withdrawals WHERE user_id = 1")
        .fetch_one(db.pool())
        .await
        .unwrap()
        .get("status");
    assert_eq!(status, "cancelled");

    let kinds: Vec<TransactionKind> = ledger
        .get_transactions(1, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(kinds[..2], [TransactionKind::WithdrawalRefund, TransactionKind::Withdrawal]);
}

#[tokio::test]
async fn test_referral_withdrawal_takes_whole_balance() {
    let (_db, ledger) = setup().await;
    funded_account(&ledger, 1, 0).await;

    ledger.update_ref_balance(1, 250).await.unwrap();
    assert!(matches!(
        ledger.withdraw_referral_balance(1, &ManualPayoutGateway).await,
        Err(LedgerError::BelowMinimum { minimum: 300, requested: 250 })
    ));

    ledger.update_ref_balance(1, 150).await.unwrap();
    let receipt = ledger.withdraw_referral_balance(1, &ManualPayoutGateway).await.unwrap();
    assert_eq!(receipt.amount, 400);

    let account = ledger.get_account(1).await.unwrap();
    assert_eq!(account.ref_balance, 0);
    assert_eq!(account.ref_earnings, 400);
}

#[tokio::test]
async fn test_failed_referral_payout_keeps_earnings_unchanged() {
    let (_db, ledger) = setup().await;
    funded_account(&ledger, 1, 0).await;
    ledger.update_ref_balance(1, 500).await.unwrap();

    let gateway = DownGateway::default();
    assert!(ledger.withdraw_referral_balance(1, &gateway).await.is_err());

    let account = ledger.get_account(1).await.unwrap();
    assert_eq!(account.ref_balance, 500);
    assert_eq!(account.ref_earnings, 500);
}
