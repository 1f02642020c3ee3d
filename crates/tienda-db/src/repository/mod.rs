//! # Repository Module
//!
//! Database repository implementations for Tienda POS.
//!
//! ## Two Entry Points Per Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Standalone reads                      Inside a unit of work            │
//! │  ─────────────────                     ─────────────────────            │
//! │  db.products().get_by_id(id)           product::fetch(&mut *tx, id)     │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  ProductRepository { pool }            free fn on &mut SqliteConnection │
//! │       │  acquires a connection              │  runs on the caller's     │
//! │       └──────────────► same free fn ◄───────┘  transaction              │
//! │                                                                         │
//! │  Services (service/*.rs) open the transaction and call the free        │
//! │  functions; nothing inside a transaction touches the pool again.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog and stock
//! - [`CategoryRepository`](category::CategoryRepository)
//! - [`CustomerRepository`](customer::CustomerRepository) - Loyalty balances
//! - [`UserRepository`](user::UserRepository) - Operators
//! - [`SaleRepository`](sale::SaleRepository) - Sales, line items, invoices
//! - [`LedgerRepository`](ledger::LedgerRepository) - Inventory ledger
//! - [`CostHistoryRepository`](cost_history::CostHistoryRepository)

pub mod category;
pub mod cost_history;
pub mod customer;
pub mod ledger;
pub mod product;
pub mod sale;
pub mod user;

/// Generates a new entity id (UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
