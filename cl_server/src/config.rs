//! Process configuration.
//!
//! Every environment variable the server reads is resolved here, once, at
//! start-up. CLI flags win over the environment.

use casino_ledger::{
    db::DatabaseConfig,
    settings::{BetLimits, LedgerSettings, SettlementSettings, VoucherPolicy},
};
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    /// Prometheus scrape address; metrics are off when unset
    pub metrics_addr: Option<SocketAddr>,
    pub ledger: LedgerSettings,
    pub bet_limits: BetLimits,
    pub settlement: SettlementSettings,
    pub vouchers: VoucherPolicy,
}

#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    /// Shared bearer token the chat front-end presents. Open API when unset.
    pub api_token: Option<String>,
}

impl ServerConfig {
    /// Resolve the configuration. `bind` and `database_url` come from the
    /// command line and take precedence over `SERVER_BIND` / `DATABASE_URL`.
    ///
    /// Fails when a variable is set but unparsable, or when `API_TOKEN` is
    /// shorter than 32 characters.
    pub fn from_env(bind: Option<SocketAddr>, database_url: Option<String>) -> Result<Self, ConfigError> {
        let bind = match bind {
            Some(bind) => bind,
            None => parse_optional_env("SERVER_BIND")?
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 6969))),
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url {
            database.database_url = url;
        }

        let api_token = std::env::var("API_TOKEN").ok().filter(|t| !t.is_empty());
        if api_token.as_ref().is_some_and(|t| t.len() < MIN_TOKEN_LEN) {
            return Err(ConfigError::invalid(
                "API_TOKEN",
                format!("needs at least {MIN_TOKEN_LEN} characters"),
            ));
        }

        Ok(ServerConfig {
            bind,
            database,
            security: SecurityConfig { api_token },
            metrics_addr: parse_optional_env("METRICS_ADDR")?,
            ledger: LedgerSettings::from_env(),
            bet_limits: BetLimits::from_env(),
            settlement: SettlementSettings::from_env(),
            vouchers: VoucherPolicy::from_env(),
        })
    }

    /// Cross-field checks the individual parsers cannot make.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.bet_limits;
        if limits.min_bet <= 0 {
            return Err(ConfigError::invalid("MIN_BET_CENTS", "must be positive"));
        }
        if limits.max_bet < limits.min_bet {
            return Err(ConfigError::invalid(
                "MAX_BET_CENTS",
                format!("below MIN_BET_CENTS ({})", limits.min_bet),
            ));
        }
        if !(0..=100).contains(&self.settlement.referral_share_percent) {
            return Err(ConfigError::invalid("REFERRAL_SHARE_PERCENT", "must be 0..=100"));
        }
        if self.ledger.min_withdrawal <= 0 {
            return Err(ConfigError::invalid("MIN_WITHDRAWAL_CENTS", "must be positive"));
        }
        if self.ledger.min_ref_withdrawal <= 0 {
            return Err(ConfigError::invalid("MIN_REF_WITHDRAWAL_CENTS", "must be positive"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid("DB_MAX_CONNECTIONS", "must be positive"));
        }
        Ok(())
    }
}

const MIN_TOKEN_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

/// Parse a variable that may be absent. Present but malformed is an error.
fn parse_optional_env<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| ConfigError::invalid(key, e.to_string()))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            database: DatabaseConfig::development(),
            security: SecurityConfig::default(),
            metrics_addr: None,
            ledger: LedgerSettings::default(),
            bet_limits: BetLimits::default(),
            settlement: SettlementSettings::default(),
            vouchers: VoucherPolicy::default(),
        }
    }

    #[test]
    fn test_error_names_the_variable() {
        let text = ConfigError::invalid("API_TOKEN", "too short").to_string();
        assert_eq!(text, "API_TOKEN: too short");
    }

    #[test]
    fn test_defaults_validate() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_zero_min_bet_rejected() {
        let mut config = valid_config();
        config.bet_limits.min_bet = 0;

        let ConfigError::Invalid { var, .. } = config.validate().unwrap_err();
        assert_eq!(var, "MIN_BET_CENTS");
    }

    #[test]
    fn test_inverted_bet_limits_rejected() {
        let mut config = valid_config();
        config.bet_limits = BetLimits {
            min_bet: 500,
            max_bet: 100,
        };

        let ConfigError::Invalid { var, .. } = config.validate().unwrap_err();
        assert_eq!(var, "MAX_BET_CENTS");
    }

    #[test]
    fn test_referral_share_over_100_rejected() {
        let mut config = valid_config();
        config.settlement.referral_share_percent = 150;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unset_variable_is_none() {
        let value: Option<SocketAddr> =
            parse_optional_env("CL_SERVER_TEST_SURELY_UNSET").unwrap();
        assert!(value.is_none());
    }
}
