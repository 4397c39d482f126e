//! Configuration loading and representation.
//!
//! Everything is read from environment variables. Unset variables fall back to
//! defaults; set-but-malformed variables are errors (never silently ignored).

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Ledger tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Upper bound on waiting for a product's lock before reporting a transient failure.
    pub lock_timeout: Duration,
    /// Largest page `recent_history` will return.
    pub max_recent_limit: usize,
    /// Actor recorded when a movement does not name one.
    pub system_actor: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            max_recent_limit: 100,
            system_actor: "system".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Process configuration for the API binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// `None` runs against in-memory stores (dev/test).
    pub database: Option<DatabaseConfig>,
    pub ledger: LedgerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database: None,
            ledger: LedgerConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr = get("BIND_ADDR").unwrap_or(defaults.bind_addr);

        let database = match get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_var(
                    "DATABASE_MAX_CONNECTIONS",
                    get("DATABASE_MAX_CONNECTIONS"),
                    10u32,
                )?,
            }),
            None => None,
        };

        let lock_timeout_ms: u64 = parse_var(
            "LEDGER_LOCK_TIMEOUT_MS",
            get("LEDGER_LOCK_TIMEOUT_MS"),
            defaults.ledger.lock_timeout.as_millis() as u64,
        )?;
        if lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "LEDGER_LOCK_TIMEOUT_MS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let max_recent_limit: usize = parse_var(
            "LEDGER_MAX_RECENT",
            get("LEDGER_MAX_RECENT"),
            defaults.ledger.max_recent_limit,
        )?;
        if max_recent_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "LEDGER_MAX_RECENT",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let system_actor = get("LEDGER_SYSTEM_ACTOR")
            .map(|v| v.trim().to_string())
            .unwrap_or(defaults.ledger.system_actor);

        Ok(Self {
            bind_addr,
            database,
            ledger: LedgerConfig {
                lock_timeout: Duration::from_millis(lock_timeout_ms),
                max_recent_limit,
                system_actor,
            },
        })
    }
}

fn parse_var<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn empty_environment_uses_in_memory_defaults() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert!(cfg.database.is_none());
    }

    #[test]
    fn database_and_ledger_settings_are_parsed() {
        let cfg = config_from(&[
            ("DATABASE_URL", "postgres://localhost/stock"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("LEDGER_LOCK_TIMEOUT_MS", "250"),
            ("LEDGER_MAX_RECENT", "20"),
            ("LEDGER_SYSTEM_ACTOR", " admin "),
        ])
        .unwrap();

        let db = cfg.database.unwrap();
        assert_eq!(db.url, "postgres://localhost/stock");
        assert_eq!(db.max_connections, 4);
        assert_eq!(cfg.ledger.lock_timeout, Duration::from_millis(250));
        assert_eq!(cfg.ledger.max_recent_limit, 20);
        assert_eq!(cfg.ledger.system_actor, "admin");
    }

    #[test]
    fn malformed_values_are_errors() {
        let err = config_from(&[("LEDGER_MAX_RECENT", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "LEDGER_MAX_RECENT", .. }));

        let err = config_from(&[("LEDGER_LOCK_TIMEOUT_MS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "LEDGER_LOCK_TIMEOUT_MS", .. }));
    }
}
