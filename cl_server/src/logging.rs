//! Structured logging setup.
//!
//! The ledger crate logs through `log`; the subscriber picks those records
//! up alongside the server's own `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn,casino_ledger::settlement=debug";

/// Install the global subscriber. `RUST_LOG` overrides the default filter and
/// `LOG_FORMAT=compact` switches to single-line output.
///
/// ```no_run
/// cl_server::logging::init();
/// tracing::info!("Server starting");
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let compact = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("compact"));

    let registry = tracing_subscriber::registry().with(filter);
    if compact {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_target(false))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_line_number(true))
            .init();
    }
}

/// Rejected or suspicious calls; `user_id` when the caller named one.
pub fn log_security_event(event_type: &str, user_id: Option<i64>, message: &str) {
    tracing::warn!(target: "security", event_type, user_id, "{}", message);
}

/// Completed money movement, one event per committed operation.
pub fn log_money_event(operation: &str, user_id: i64, amount_cents: i64) {
    tracing::info!(target: "money", operation, user_id, amount_cents, "{} {}", operation, amount_cents);
}
