//! # tienda-db: Database Layer for Tienda POS
//!
//! SQLite storage for the back office through sqlx: the connection pool,
//! embedded migrations, repositories and the transactional services that
//! implement CreateSale, CancelSale and the pricing operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tienda POS Data Flow                             │
//! │                                                                         │
//! │  backoffice command (create_sale)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tienda-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Services    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (service/*)   │    │ (repository/*)│    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SaleService   │───►│ product, sale │    │ 001_init.sql │  │   │
//! │  │   │ PricingSvc    │    │ ledger, ...   │    │ 002_guards   │  │   │
//! │  │   │ one tx each   │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                SQLite Database (WAL, foreign keys)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Row-level reads and writes per table
//! - [`service`] - Units of work (sale, pricing, inventory, loyalty)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tienda_db::{Database, DbConfig, SaleSettings};
//!
//! let db = Database::new(DbConfig::new("tienda.db")).await?;
//!
//! let sale = db.sale_service(SaleSettings::default()).create_sale(&request).await?;
//! let report = db.pricing_service(3).profit_analysis().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use service::{ServiceError, ServiceResult, SaleSettings, DEFAULT_MAX_RETRIES};

pub use repository::category::CategoryRepository;
pub use repository::cost_history::CostHistoryRepository;
pub use repository::customer::CustomerRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::user::UserRepository;

pub use service::inventory::InventoryService;
pub use service::loyalty::LoyaltyService;
pub use service::pricing::PricingService;
pub use service::sale::{CancelledSale, RestoredStock, SaleService, SaleUpdate};
