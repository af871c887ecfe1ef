//! HTTP API consumed by the chat front-end.
//!
//! The bot process owns the chat transport and calls this service for every
//! money movement. Handlers are thin: they decode the request, call one
//! manager operation and map its error onto a status code.
//!
//! # Routes
//!
//! ```text
//! GET    /health                                     - Health check (public)
//! POST   /api/v1/accounts                            - Register account
//! GET    /api/v1/accounts/{id}                       - Balances
//! GET    /api/v1/accounts/{id}/transactions?limit=   - History, newest first
//! GET    /api/v1/accounts/{id}/stats                 - Play statistics
//! GET    /api/v1/accounts/{id}/wagering              - Bonus lock
//! GET    /api/v1/accounts/{id}/pending-bet           - Unsettled stake
//! GET    /api/v1/accounts/{id}/vouchers              - Vouchers created by the user
//! POST   /api/v1/accounts/{id}/turnover-bonus        - Claim turnover milestones
//! POST   /api/v1/accounts/{id}/withdrawals           - Cash out main balance
//! POST   /api/v1/accounts/{id}/referral-withdrawals  - Cash out referral balance
//! POST   /api/v1/vouchers                            - Create voucher
//! GET    /api/v1/vouchers/{id}                       - Voucher details
//! POST   /api/v1/vouchers/{id}/redeem                - Redeem voucher
//! DELETE /api/v1/vouchers/{id}?requester_id=         - Delete and refund
//! PATCH  /api/v1/vouchers/{id}/settings              - Creator settings
//! PUT    /api/v1/vouchers/{id}/wagering              - Operator wagering multiplier
//! POST   /api/v1/bets                                - Place a stake
//! ```
//!
//! Every `/api/v1` route requires `Authorization: Bearer <API_TOKEN>` when a
//! token is configured.

pub mod accounts;
pub mod bets;
pub mod errors;
pub mod middleware;
pub mod request_id;
pub mod vouchers;

pub use errors::{ApiError, ApiResult, ErrorResponse};

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, patch, post, put},
};
use casino_ledger::{
    BetManager, LedgerManager, SettlementHandle, VoucherManager, WageringEngine,
    ledger::CashoutGateway, settlement::BetQueue,
};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// State shared by all handlers. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerManager>,
    pub vouchers: Arc<VoucherManager>,
    pub bets: Arc<BetManager>,
    pub wagering: Arc<WageringEngine>,
    pub gateway: Arc<dyn CashoutGateway>,
    pub settlement: SettlementHandle,
    pub pool: SqlitePool,
    /// Shared secret for `/api/v1`; open when `None`
    pub api_token: Option<Arc<str>>,
}

impl AppState {
    /// Build every manager on one pool.
    pub fn new(
        pool: SqlitePool,
        ledger: LedgerManager,
        vouchers: VoucherManager,
        bets: BetManager,
        gateway: Arc<dyn CashoutGateway>,
        settlement: SettlementHandle,
        api_token: Option<String>,
    ) -> Self {
        Self {
            ledger: Arc::new(ledger),
            vouchers: Arc::new(vouchers),
            bets: Arc::new(bets),
            wagering: Arc::new(WageringEngine::new(pool.clone())),
            gateway,
            settlement,
            pool,
            api_token: api_token.map(Arc::from),
        }
    }
}

/// `/health` plus the authenticated `/api/v1` tree.
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/accounts", post(accounts::create_account))
        .route("/accounts/{user_id}", get(accounts::get_account))
        .route(
            "/accounts/{user_id}/transactions",
            get(accounts::list_transactions),
        )
        .route("/accounts/{user_id}/stats", get(accounts::get_stats))
        .route("/accounts/{user_id}/wagering", get(accounts::get_wagering))
        .route("/accounts/{user_id}/pending-bet", get(bets::pending_bet))
        .route("/accounts/{user_id}/vouchers", get(vouchers::list_user_vouchers))
        .route(
            "/accounts/{user_id}/turnover-bonus",
            post(accounts::claim_turnover_bonus),
        )
        .route("/accounts/{user_id}/withdrawals", post(accounts::withdraw))
        .route(
            "/accounts/{user_id}/referral-withdrawals",
            post(accounts::withdraw_referral),
        )
        .route("/vouchers", post(vouchers::create_voucher))
        .route(
            "/vouchers/{voucher_id}",
            get(vouchers::get_voucher).delete(vouchers::delete_voucher),
        )
        .route("/vouchers/{voucher_id}/redeem", post(vouchers::redeem_voucher))
        .route(
            "/vouchers/{voucher_id}/settings",
            patch(vouchers::update_setting),
        )
        .route("/vouchers/{voucher_id}/wagering", put(vouchers::set_wagering))
        .route("/bets", post(bets::place_bet))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::api_token_middleware,
        ))
}

/// Health check for monitoring and load balancers.
///
/// Returns `503 Service Unavailable` when the database is unreachable or the
/// settlement worker has stopped.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = sqlx::query("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    let worker_running = state.settlement.is_running();
    let pending = BetQueue::new(state.pool.clone())
        .pending_count()
        .await
        .unwrap_or(-1);
    crate::metrics::settlement_queue_depth(pending);

    let overall_healthy = db_healthy && worker_running;
    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "settlement": {
            "running": worker_running,
            "pending": pending,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
