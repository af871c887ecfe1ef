//! SQLite pool setup and schema creation.
//!
//! Every money-moving operation runs inside an [`ImmediateTransaction`], which
//! takes SQLite's write lock up front so concurrent read-check-write sequences
//! serialise instead of deadlocking on lock upgrade.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

pub mod config;
pub mod schema;
pub mod transaction;

pub use config::DatabaseConfig;
pub use transaction::ImmediateTransaction;

/// Owns the pool; clone [`Database::pool`] into the managers.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect, creating the file if needed. In-memory URLs get exactly one
    /// connection that never expires: the database lives only as long as it.
    ///
    /// ```no_run
    /// # async fn open() -> Result<(), sqlx::Error> {
    /// use casino_ledger::db::{Database, DatabaseConfig};
    ///
    /// let db = Database::new(&DatabaseConfig::from_env()).await?;
    /// db.migrate().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

        let pool_options =
            SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(config.connection_timeout_secs));

        let pool_options = if config.is_in_memory() {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(config.max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        log::info!("Connected to {}", config.database_url);

        Ok(Self { pool })
    }

    /// Open a fresh, migrated in-memory database.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let config = DatabaseConfig {
            database_url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::development()
        };
        let db = Self::new(&config).await?;
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create all tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        log::info!("Database schema is up to date");
        Ok(())
    }

    /// Wait for checked-out connections to return, then close them.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::in_memory().await.expect("in-memory database");

        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name IN \
             ('accounts', 'transactions', 'vouchers', 'voucher_activations', 'bet_queue')",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 5);

        db.close().await;
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.expect("second migration should be a no-op");
    }
}
