//! Casino ledger server.
//!
//! Starts the settlement worker, then serves the HTTP API until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use casino_ledger::{
    BetManager, Database, LedgerManager, LogNotifier, Notifier, SettlementActor, VoucherManager,
    ledger::ManualPayoutGateway, settlement::RandomOutcomeSource,
};
use cl_server::{
    api::{AppState, create_router},
    config::ServerConfig,
    logging, metrics,
};
use log::info;
use pico_args::Arguments;

const HELP: &str = "\
Run the casino ledger server

USAGE:
  cl_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or sqlite://casino_ledger.db]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  API_TOKEN                Bearer token the chat front-end must present (min 32 chars)
  METRICS_ADDR             Prometheus listener, e.g. 127.0.0.1:9090
  MIN_BET_CENTS            Smallest stake
  MAX_BET_CENTS            Largest stake
  SETTLEMENT_PACING_MS     Delay between announced rolls
  SETTLEMENT_POLL_MS       Interval between queue polls
  REFERRAL_SHARE_PERCENT   Share of each win credited to the referrer
  MIN_WITHDRAWAL_CENTS     Smallest main-balance cash-out
  MIN_REF_WITHDRAWAL_CENTS Smallest referral cash-out
  TURNOVER_BONUS_STEP_CENTS, TURNOVER_BONUS_CENTS
                           Turnover milestone size and reward
  CREATOR_REDEEMS_FULL_FACE
                           Creator redeeming their own voucher takes the full face
  DB_MAX_CONNECTIONS, DB_CONNECTION_TIMEOUT, DB_BUSY_TIMEOUT
  RUST_LOG, LOG_FORMAT     Log filter and output style (LOG_FORMAT=compact)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;

    logging::init();

    let config = ServerConfig::from_env(bind, database_url)?;
    config.validate()?;

    if let Some(addr) = config.metrics_addr {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics listening on {}", addr);
    }

    info!("Connecting to database: {}", config.database.database_url);
    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    db.migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to apply schema: {}", e))?;
    info!("Database ready");

    let pool = db.pool().clone();
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let outcome = Arc::new(RandomOutcomeSource::new(
        notifier.clone(),
        config.settlement.pacing,
    ));

    let (actor, settlement) =
        SettlementActor::new(pool.clone(), outcome, notifier, config.settlement);
    let worker = actor
        .with_observer(Arc::new(metrics::SettlementMetrics))
        .start()
        .await?;
    info!("Settlement worker started");

    let state = AppState::new(
        pool.clone(),
        LedgerManager::with_settings(pool.clone(), config.ledger),
        VoucherManager::with_policy(pool.clone(), config.vouchers),
        BetManager::new(pool.clone(), config.bet_limits, settlement.clone()),
        Arc::new(ManualPayoutGateway),
        settlement.clone(),
        config.security.api_token.clone(),
    );
    if state.api_token.is_none() {
        tracing::warn!("API_TOKEN is not set; the API accepts unauthenticated calls");
    }

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Casino ledger listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopping settlement worker");
    settlement.shutdown().await;
    if let Err(e) = worker.await {
        tracing::error!("Settlement worker ended abnormally: {}", e);
    }
    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
