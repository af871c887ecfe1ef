//! Prometheus metrics for money movement and settlement.
//!
//! Nothing is exported unless `METRICS_ADDR` is set; the recording helpers
//! are no-ops until [`init_metrics`] installs the recorder.

use async_trait::async_trait;
use casino_ledger::settlement::{BetObserver, SettledBet};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;

/// Payout buckets in cents, from a minimum-stake win to a large jackpot.
const PAYOUT_BUCKETS: &[f64] = &[
    100.0, 500.0, 1_000.0, 5_000.0, 10_000.0, 50_000.0, 100_000.0, 500_000.0,
];

/// Serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full("payout_cents".to_owned()), PAYOUT_BUCKETS)
        .and_then(|builder| builder.with_http_listener(addr).install())
        .map_err(|e| format!("metrics exporter on {addr}: {e}"))
}

pub fn http_request(method: &str, route: &str, status: u16) {
    counter!(
        "http_requests_total",
        "method" => method.to_owned(),
        "route" => route.to_owned(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn bet_placed(game: &'static str, funding: &'static str) {
    counter!("bets_placed_total", "game" => game, "funding" => funding).increment(1);
}

pub fn settlement_queue_depth(pending: i64) {
    gauge!("settlement_queue_depth").set(pending as f64);
}

pub fn voucher_created(kind: &str) {
    counter!("vouchers_created_total", "kind" => kind.to_owned()).increment(1);
}

pub fn voucher_redeemed(to_bonus: bool) {
    let target = if to_bonus { "bonus" } else { "main" };
    counter!("vouchers_redeemed_total", "target" => target).increment(1);
}

pub fn withdrawal(source: &str, success: bool) {
    let result = if success { "ok" } else { "failed" };
    counter!("withdrawals_total", "source" => source.to_owned(), "result" => result).increment(1);
}

/// Counts settled bets and records payout sizes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SettlementMetrics;

#[async_trait]
impl BetObserver for SettlementMetrics {
    async fn bet_settled(&self, bet: &SettledBet) -> anyhow::Result<()> {
        let result = if bet.outcome.won { "win" } else { "loss" };
        counter!("bets_settled_total", "game" => bet.wager.game_key(), "result" => result)
            .increment(1);
        if bet.outcome.payout > 0 {
            histogram!("payout_cents").record(bet.outcome.payout as f64);
        }
        Ok(())
    }
}
