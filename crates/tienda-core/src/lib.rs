//! # tienda-core: Pure Business Logic for Tienda POS
//!
//! Everything the back office decides about prices, stock and sale totals
//! lives here as pure functions. The database layer (`tienda-db`) feeds
//! current rows in and persists what comes out.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Tienda POS Back Office                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP layer + browser client (external)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 apps/backoffice (commands)                      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tienda-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐   │   │
//! │  │   │  money   │  │ pricing  │  │  ledger  │  │     sale     │   │   │
//! │  │   │  Money   │  │ margins  │  │ in / out │  │ totals, pts  │   │   │
//! │  │   └──────────┘  └──────────┘  └──────────┘  └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        tienda-db (SQLite, repositories, units of work)          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, Customer, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`pricing`] - Cost-plus-margin pricing and profit analysis
//! - [`ledger`] - Inventory movement arithmetic and replay
//! - [`sale`] - Sale request validation, totals, loyalty points, invoices
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tienda_core::money::Money;
//! use tienda_core::pricing::recompute_calculated_price;
//!
//! // $70.00 cost at a 30% margin sells for $100.00
//! let price = recompute_calculated_price(Money::from_cents(7000), 3000).unwrap();
//! assert_eq!(price.cents(), 10000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod pricing;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use ledger::{LedgerEntry, MovementType, NewLedgerEntry, StockSummary};
pub use money::Money;
pub use pricing::{MarginUpdate, PriceSource, ProfitAnalysis};
pub use sale::{NewSale, PricedLine, SaleItemRequest, SaleTotals};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default loyalty rate: 1% of the sale total becomes points.
pub const DEFAULT_LOYALTY_RATE_BPS: u32 = 100;

/// Products under this margin show up in the low-margin report (20%).
pub const LOW_MARGIN_THRESHOLD_BPS: u32 = 2000;

/// How many products the profit analysis ranks by total profit.
pub const DEFAULT_TOP_PROFITABLE: usize = 10;

/// Default page size for inventory history queries.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Upper bound on a single line item quantity.
///
/// Catches typing 1000 instead of 10 at the register.
pub const MAX_ITEM_QUANTITY: i64 = 9999;

/// Maximum distinct line items in one sale.
pub const MAX_SALE_ITEMS: usize = 200;

/// Cancelling a sale leaves earned loyalty points with the customer.
pub const REVERSE_LOYALTY_ON_CANCEL: bool = false;
