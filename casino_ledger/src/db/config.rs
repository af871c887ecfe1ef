//! Connection settings for the SQLite pool.

use crate::settings::env_or;
use std::env;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection URL (`sqlite://ledger.db`, `sqlite::memory:`)
    pub database_url: String,

    /// Pool size; ignored for in-memory URLs
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    pub connection_timeout_secs: u64,

    /// How long a connection waits on a locked database before failing, in seconds
    pub busy_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Reads `DATABASE_URL`, `DB_MAX_CONNECTIONS`, `DB_CONNECTION_TIMEOUT` and
    /// `DB_BUSY_TIMEOUT`. Missing or unparsable numbers keep the
    /// [`development`](Self::development) values.
    pub fn from_env() -> Self {
        let defaults = Self::development();
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: env_or("DB_MAX_CONNECTIONS", defaults.max_connections),
            connection_timeout_secs: env_or(
                "DB_CONNECTION_TIMEOUT",
                defaults.connection_timeout_secs,
            ),
            busy_timeout_secs: env_or("DB_BUSY_TIMEOUT", defaults.busy_timeout_secs),
        }
    }

    /// `casino_ledger.db` in the working directory, 8 connections.
    pub fn development() -> Self {
        Self {
            database_url: "sqlite://casino_ledger.db".to_string(),
            max_connections: 8,
            connection_timeout_secs: 30,
            busy_timeout_secs: 10,
        }
    }

    /// Whether the URL points at a private in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.database_url, "sqlite://casino_ledger.db");
        assert_eq!(config.max_connections, 8);
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_in_memory_detection() {
        let config = DatabaseConfig {
            database_url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::development()
        };
        assert!(config.is_in_memory());
    }
}
