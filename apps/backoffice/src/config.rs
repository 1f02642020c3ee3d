//! # Back Office Configuration
//!
//! Loaded from environment variables with fallback to defaults.
//!
//! | Variable                     | Default                         |
//! |------------------------------|---------------------------------|
//! | `TIENDA_DB_PATH`             | platform data dir / `tienda.db` |
//! | `TIENDA_DB_MAX_CONNECTIONS`  | `5`                             |
//! | `LOYALTY_POINTS_RATE`        | `0.01` (1% of the sale total)   |
//! | `TIENDA_MAX_TX_RETRIES`      | `3`                             |
//! | `TIENDA_STORE_NAME`          | `Tienda`                        |

use directories::ProjectDirs;
use serde::Serialize;
use std::env;
use std::path::PathBuf;

use tienda_core::LoyaltyRate;
use tienda_db::{DbConfig, SaleSettings, DEFAULT_MAX_RETRIES};

const DEFAULT_DB_FILE: &str = "tienda.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_STORE_NAME: &str = "Tienda";

/// Back-office configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub database_path: PathBuf,

    pub max_connections: u32,

    /// Share of each sale total credited as loyalty points.
    pub loyalty_rate: LoyaltyRate,

    /// Replays of a unit of work after a transient lock failure.
    pub max_tx_retries: u32,

    /// Shown in reports.
    pub store_name: String,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`, so tests don't touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = match lookup("TIENDA_DB_PATH") {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
            _ => default_database_path(),
        };

        let max_connections = match lookup("TIENDA_DB_MAX_CONNECTIONS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => return Err(ConfigError::InvalidValue("TIENDA_DB_MAX_CONNECTIONS".to_string())),
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let loyalty_rate = match lookup("LOYALTY_POINTS_RATE") {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| *f <= 1.0)
                .and_then(LoyaltyRate::from_fraction)
                .ok_or_else(|| ConfigError::InvalidValue("LOYALTY_POINTS_RATE".to_string()))?,
            None => LoyaltyRate::default(),
        };

        let max_tx_retries = match lookup("TIENDA_MAX_TX_RETRIES") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidValue("TIENDA_MAX_TX_RETRIES".to_string()))?,
            None => DEFAULT_MAX_RETRIES,
        };

        let store_name = lookup("TIENDA_STORE_NAME")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_STORE_NAME.to_string());

        Ok(AppConfig {
            database_path,
            max_connections,
            loyalty_rate,
            max_tx_retries,
            store_name,
        })
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path).max_connections(self.max_connections)
    }

    pub fn sale_settings(&self) -> SaleSettings {
        SaleSettings {
            loyalty_rate: self.loyalty_rate,
            max_retries: self.max_tx_retries,
        }
    }
}

/// `tienda.db` in the platform data directory, or the working directory
/// when none can be determined.
///
/// - **macOS**: `~/Library/Application Support/com.tienda.pos/tienda.db`
/// - **Windows**: `%APPDATA%\tienda\pos\data\tienda.db`
/// - **Linux**: `~/.local/share/pos/tienda.db`
fn default_database_path() -> PathBuf {
    match ProjectDirs::from("com", "tienda", "pos") {
        Some(dirs) => dirs.data_dir().join(DEFAULT_DB_FILE),
        None => PathBuf::from(DEFAULT_DB_FILE),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
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

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.loyalty_rate.bps(), 100);
        assert_eq!(config.max_tx_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.store_name, "Tienda");
        assert!(config.database_path.ends_with("tienda.db"));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TIENDA_DB_PATH", "/var/lib/tienda/main.db"),
            ("TIENDA_DB_MAX_CONNECTIONS", "8"),
            ("LOYALTY_POINTS_RATE", "0.025"),
            ("TIENDA_MAX_TX_RETRIES", "0"),
            ("TIENDA_STORE_NAME", "Almacén Don Pepe"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/tienda/main.db"));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.loyalty_rate.bps(), 250);
        assert_eq!(config.sale_settings().max_retries, 0);
        assert_eq!(config.store_name, "Almacén Don Pepe");
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("TIENDA_DB_MAX_CONNECTIONS", "0"),
            ("TIENDA_DB_MAX_CONNECTIONS", "many"),
            ("LOYALTY_POINTS_RATE", "-0.01"),
            ("LOYALTY_POINTS_RATE", "1.5"),
            ("LOYALTY_POINTS_RATE", "NaN"),
            ("TIENDA_MAX_TX_RETRIES", "-1"),
        ] {
            let err = AppConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(ref k) if k == key), "{key}={value}");
        }
    }
}
