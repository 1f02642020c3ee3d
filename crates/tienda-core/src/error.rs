//! # Error Types
//!
//! Domain-specific error types for tienda-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tienda-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Malformed input                                │
//! │                                                                         │
//! │  tienda-db errors                                                      │
//! │  ├── DbError          - Storage failures                               │
//! │  └── ServiceError     - CoreError | DbError | retries exhausted        │
//! │                                                                         │
//! │  backoffice errors                                                     │
//! │  └── ApiError         - What the HTTP layer serializes                 │
//! │                                                                         │
//! │  Every error is classified into one ErrorKind:                         │
//! │  Validation (fix input) • NotFound • Conflict (state) • Internal       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input. Fix the request and retry.
    Validation,
    /// A referenced product, customer, user or sale does not exist.
    NotFound,
    /// The request conflicts with current state (stock ran out, already cancelled).
    Conflict,
    /// Storage failure unrelated to business rules.
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A sale was submitted with no line items.
    #[error("Sale must contain at least one item")]
    EmptyOrder,

    /// Quantity below 1 (or above the per-line maximum).
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: String, quantity: i64 },

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Insufficient stock to complete a sale.
    ///
    /// ## User Workflow
    /// ```text
    /// CreateSale (qty: 5)
    ///      │
    ///      ▼
    /// Stock check inside the unit of work: available=1
    ///      │
    ///      ▼
    /// InsufficientStock { name: "Yerba 1kg", available: 1, requested: 5 }
    ///      │
    ///      ▼
    /// Nothing written, UI shows "Only 1 Yerba 1kg in stock"
    /// ```
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        name: String,
        available: i64,
        requested: i64,
    },

    /// Negative total, discount or tax.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("Sale {invoice_number} is already cancelled")]
    AlreadyCancelled {
        sale_id: String,
        invoice_number: String,
    },

    /// Status change the sale state machine does not allow.
    #[error("Sale {sale_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        sale_id: String,
        from: String,
        to: String,
    },

    /// Margin outside `0 <= margin < 100%` (expressed in basis points).
    #[error("Invalid profit margin: {bps} bps (must be 0 to 9999)")]
    InvalidMargin { bps: i64 },

    #[error("Invalid price: {cents} cents (must not be negative)")]
    InvalidPrice { cents: i64 },

    /// Ledger snapshot that doesn't add up for its movement type.
    #[error("Invalid stock snapshot for {movement}: {previous} -> {new} (qty {quantity})")]
    InvalidStockSnapshot {
        movement: String,
        previous: i64,
        new: i64,
        quantity: i64,
    },

    #[error("Insufficient loyalty points: balance {balance}, requested {requested}")]
    InsufficientLoyaltyPoints { balance: i64, requested: i64 },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies the error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::EmptyOrder
            | CoreError::InvalidQuantity { .. }
            | CoreError::InvalidAmount { .. }
            | CoreError::InvalidMargin { .. }
            | CoreError::InvalidPrice { .. }
            | CoreError::InvalidStockSnapshot { .. }
            | CoreError::InvalidStatusTransition { .. }
            | CoreError::Validation(_) => ErrorKind::Validation,

            CoreError::ProductNotFound(_)
            | CoreError::CustomerNotFound(_)
            | CoreError::UserNotFound(_)
            | CoreError::SaleNotFound(_) => ErrorKind::NotFound,

            CoreError::InsufficientStock { .. }
            | CoreError::AlreadyCancelled { .. }
            | CoreError::InsufficientLoyaltyPoints { .. } => ErrorKind::Conflict,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic or storage access happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
