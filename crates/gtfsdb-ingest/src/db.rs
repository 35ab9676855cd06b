//! Database configuration and connection pool

use gtfsdb_common::env::{process_env, EnvReader};
use gtfsdb_common::ConfigError;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// `DB_SSL=true` requires TLS; otherwise TLS is used when offered
    pub require_ssl: bool,
    pub max_connections: u32,
    pub idle_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
}

impl DbConfig {
    /// Read `DB_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    /// Every missing required variable is reported in one error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = EnvReader::new(lookup);

        let host = env.require("DB_HOST");
        let port_raw = env.require("DB_PORT");
        let user = env.require("DB_USER");
        let password = env.require("DB_PASSWORD");
        let database = env.require("DB_NAME");

        let require_ssl = env
            .optional("DB_SSL")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let max_connections = env.parse_or("DB_MAX_CONNECTIONS", 5u32)?;
        let idle_timeout_secs = env.parse_or("DB_IDLE_TIMEOUT_SECS", 30u64)?;
        let acquire_timeout_secs = env.parse_or("DB_ACQUIRE_TIMEOUT_SECS", 30u64)?;

        env.finish()?;

        let port = port_raw
            .parse()
            .map_err(|_| ConfigError::invalid("DB_PORT", &port_raw, "not a port number"))?;
        if max_connections == 0 {
            return Err(ConfigError::invalid(
                "DB_MAX_CONNECTIONS",
                "0",
                "must be at least 1",
            ));
        }

        Ok(Self {
            host,
            port,
            user,
            password,
            database,
            require_ssl,
            max_connections,
            idle_timeout_secs,
            acquire_timeout_secs,
        })
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(if self.require_ssl {
                PgSslMode::Require
            } else {
                PgSslMode::Prefer
            })
    }
}

pub async fn create_pool(config: &DbConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_with(config.connect_options())
        .await?;

    tracing::info!(
        host = %config.host,
        database = %config.database,
        max_connections = config.max_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const COMPLETE: &[(&str, &str)] = &[
        ("DB_HOST", "localhost"),
        ("DB_PORT", "5432"),
        ("DB_USER", "gtfs"),
        ("DB_PASSWORD", "secret"),
        ("DB_NAME", "transit"),
    ];

    #[test]
    fn test_complete_config_with_defaults() {
        let config = DbConfig::from_lookup(lookup(COMPLETE)).unwrap();
        assert_eq!(config.port, 5432);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.idle_timeout_secs, 30);
        assert!(!config.require_ssl);
    }

    #[test]
    fn test_every_missing_variable_reported_at_once() {
        let err = DbConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(
            err.missing_keys(),
            ["DB_HOST", "DB_PORT", "DB_USER", "DB_PASSWORD", "DB_NAME"]
        );
    }

    #[test]
    fn test_partial_config_lists_only_missing() {
        let err = DbConfig::from_lookup(lookup(&[("DB_HOST", "db"), ("DB_NAME", "")])).unwrap_err();
        assert_eq!(err.missing_keys(), ["DB_PORT", "DB_USER", "DB_PASSWORD", "DB_NAME"]);
    }

    #[test]
    fn test_ssl_and_pool_settings() {
        let mut pairs = COMPLETE.to_vec();
        pairs.push(("DB_SSL", "TRUE"));
        pairs.push(("DB_MAX_CONNECTIONS", "12"));
        let config = DbConfig::from_lookup(lookup(&pairs)).unwrap();
        assert!(config.require_ssl);
        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn test_bad_port() {
        let mut pairs = COMPLETE.to_vec();
        pairs.retain(|(k, _)| *k != "DB_PORT");
        pairs.push(("DB_PORT", "fifty"));
        let err = DbConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "DB_PORT"));
    }
}
