//! # Tienda Back Office Library
//!
//! Command layer consumed by the HTTP front end. Each command is one
//! logical operation: it takes a camelCase request DTO, runs one unit of
//! work in `tienda-db` and answers with a response DTO or an [`ApiError`].
//!
//! ## Module Organization
//! ```text
//! tienda_backoffice/
//! ├── lib.rs          ◄─── You are here (Backoffice handle, tracing)
//! ├── config.rs       ◄─── AppConfig from environment
//! ├── error.rs        ◄─── ApiError { code, status, message }
//! └── commands/
//!     ├── mod.rs      ◄─── Command exports
//!     ├── sale.rs     ◄─── Create, get, cancel, update sales
//!     ├── pricing.rs  ◄─── Price recalculation, margins, profit report
//!     ├── inventory.rs◄─── Ledger history, receiving, stock counts
//!     └── customer.rs ◄─── Loyalty balance and redemption
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. init_tracing()        RUST_LOG or "info,tienda=debug,sqlx=warn"    │
//! │  2. AppConfig::from_env() TIENDA_DB_PATH, LOYALTY_POINTS_RATE, ...     │
//! │  3. Backoffice::open()    create data dir, connect, run migrations     │
//! │  4. commands::*(&app, request)                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod error;

use tracing::info;
use tracing_subscriber::EnvFilter;

use tienda_db::{Database, InventoryService, LoyaltyService, PricingService, SaleService};

pub use config::{AppConfig, ConfigError};
pub use error::{ApiError, ErrorCode};

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tienda=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=tienda_db=trace` - Trace the database layer only
///
/// Calling it twice is harmless; the first subscriber stays installed.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Open database plus the configuration commands run under.
#[derive(Debug, Clone)]
pub struct Backoffice {
    db: Database,
    config: AppConfig,
}

impl Backoffice {
    /// Creates the data directory if needed, connects and migrates.
    pub async fn open(config: AppConfig) -> Result<Self, ApiError> {
        if let Some(dir) = config.database_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    tracing::error!(?dir, "Cannot create data directory: {}", e);
                    ApiError::database("Cannot create data directory")
                })?;
            }
        }

        info!(path = ?config.database_path, store = %config.store_name, "Opening back office");
        let db = Database::new(config.db_config()).await?;
        Ok(Backoffice { db, config })
    }

    /// Wraps an already open database.
    pub fn with_database(db: Database, config: AppConfig) -> Self {
        Backoffice { db, config }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn sales(&self) -> SaleService {
        self.db.sale_service(self.config.sale_settings())
    }

    pub fn pricing(&self) -> PricingService {
        self.db.pricing_service(self.config.max_tx_retries)
    }

    pub fn inventory(&self) -> InventoryService {
        self.db.inventory_service(self.config.max_tx_retries)
    }

    pub fn loyalty(&self) -> LoyaltyService {
        self.db.loyalty_service(self.config.max_tx_retries)
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}
