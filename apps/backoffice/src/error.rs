//! # API Error Type
//!
//! Unified error type for back-office commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Tienda POS                             │
//! │                                                                         │
//! │  HTTP layer                  Rust Backend                               │
//! │  ──────────                  ────────────                               │
//! │                                                                         │
//! │  POST /sales                                                            │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Business rule? ─── CoreError::InsufficientStock ───┐           │  │
//! │  │         │                                           │           │  │
//! │  │         ▼                                           ▼           │  │
//! │  │  Storage failure? ─── DbError / RetriesExhausted ── ApiError ──►│  │
//! │  │         │                                     { code, status } │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  status: 400 validation / conflict, 404 not found, 500 internal        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage failures are logged here with their detail and reach the caller
//! as a generic message.

use serde::Serialize;
use tienda_core::{CoreError, ErrorKind};
use tienda_db::{DbError, ServiceError};

use crate::config::ConfigError;

/// API error returned from commands.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "status": 400,
///   "message": "Insufficient stock for Yerba 1kg: available 1, requested 5"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// HTTP status the endpoint answers with
    pub status: u16,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Sale with no line items (400)
    EmptyOrder,

    /// Line quantity out of range (400)
    InvalidQuantity,

    /// Negative margin or margin of 100% or more (400)
    InvalidMargin,

    /// Negative price (400)
    InvalidPrice,

    /// Resource not found (404)
    NotFound,

    /// Not enough units on hand (400)
    InsufficientStock,

    /// Sale was cancelled before (400)
    AlreadyCancelled,

    /// Redemption exceeds the balance (400)
    InsufficientLoyaltyPoints,

    /// Database operation failed (500)
    DatabaseError,

    /// Misconfigured deployment (500)
    ConfigError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    /// HTTP status for this code.
    pub const fn status(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::DatabaseError | ErrorCode::ConfigError | ErrorCode::Internal => 500,
            _ => 400,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            status: code.status(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// Generic storage failure.
    pub fn database(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::DatabaseError, message)
    }

    /// The error class this maps back to.
    pub fn kind(&self) -> ErrorKind {
        match self.code {
            ErrorCode::NotFound => ErrorKind::NotFound,
            ErrorCode::InsufficientStock
            | ErrorCode::AlreadyCancelled
            | ErrorCode::InsufficientLoyaltyPoints => ErrorKind::Conflict,
            ErrorCode::DatabaseError | ErrorCode::ConfigError | ErrorCode::Internal => {
                ErrorKind::Internal
            }
            _ => ErrorKind::Validation,
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let code = match &err {
            CoreError::EmptyOrder => ErrorCode::EmptyOrder,
            CoreError::InvalidQuantity { .. } => ErrorCode::InvalidQuantity,
            CoreError::InvalidMargin { .. } => ErrorCode::InvalidMargin,
            CoreError::InvalidPrice { .. } => ErrorCode::InvalidPrice,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::AlreadyCancelled { .. } => ErrorCode::AlreadyCancelled,
            CoreError::InsufficientLoyaltyPoints { .. } => ErrorCode::InsufficientLoyaltyPoints,
            CoreError::ProductNotFound(_)
            | CoreError::CustomerNotFound(_)
            | CoreError::UserNotFound(_)
            | CoreError::SaleNotFound(_) => ErrorCode::NotFound,
            CoreError::InvalidAmount { .. }
            | CoreError::InvalidStockSnapshot { .. }
            | CoreError::InvalidStatusTransition { .. }
            | CoreError::Validation(_) => ErrorCode::ValidationError,
        };
        ApiError::new(code, message)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => {
                ApiError::validation(format!("{} '{}' already exists", field, value))
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::CheckViolation { message } => {
                tracing::error!("Constraint violation: {}", message);
                ApiError::database("Database rejected the change")
            }
            DbError::Busy(e) => {
                tracing::error!("Database busy: {}", e);
                ApiError::database("Database is busy")
            }
            DbError::ConnectionFailed(_) => ApiError::database("Database connection failed"),
            DbError::MigrationFailed(_) => ApiError::database("Database migration failed"),
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::database("Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::database("Database transaction failed")
            }
            DbError::PoolExhausted => ApiError::database("Database pool exhausted"),
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::database("Database operation failed")
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Core(e) => e.into(),
            ServiceError::Db(e) => e.into(),
            ServiceError::RetriesExhausted { attempts, last } => {
                tracing::error!(attempts, error = %last, "Unit of work gave up after retries");
                ApiError::database("Database is busy, try again")
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        tracing::error!("Configuration error: {}", err);
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {:?}] {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tienda_core::ValidationError;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(CoreError, ErrorCode, u16)> = vec![
            (CoreError::EmptyOrder, ErrorCode::EmptyOrder, 400),
            (
                CoreError::InvalidQuantity {
                    product_id: "p".into(),
                    quantity: 0,
                },
                ErrorCode::InvalidQuantity,
                400,
            ),
            (CoreError::ProductNotFound("p".into()), ErrorCode::NotFound, 404),
            (CoreError::CustomerNotFound("c".into()), ErrorCode::NotFound, 404),
            (CoreError::SaleNotFound("s".into()), ErrorCode::NotFound, 404),
            (
                CoreError::InsufficientStock {
                    product_id: "p".into(),
                    name: "Yerba".into(),
                    available: 1,
                    requested: 5,
                },
                ErrorCode::InsufficientStock,
                400,
            ),
            (
                CoreError::AlreadyCancelled {
                    sale_id: "s".into(),
                    invoice_number: "INV-20260101-000001".into(),
                },
                ErrorCode::AlreadyCancelled,
                400,
            ),
            (CoreError::InvalidMargin { bps: 10000 }, ErrorCode::InvalidMargin, 400),
            (CoreError::InvalidPrice { cents: -1 }, ErrorCode::InvalidPrice, 400),
        ];

        for (err, code, status) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.code, code);
            assert_eq!(api.status, status);
        }
    }

    #[test]
    fn test_kind_round_trips_the_core_classification() {
        let err = CoreError::Validation(ValidationError::Required {
            field: "reason".into(),
        });
        let kind = err.kind();
        let api: ApiError = err.into();
        assert_eq!(api.kind(), kind);
        assert_eq!(api.message, "Validation error: reason is required");
    }

    #[test]
    fn test_storage_failures_are_internal() {
        let api: ApiError = ServiceError::RetriesExhausted {
            attempts: 4,
            last: DbError::Busy("database is locked".into()),
        }
        .into();
        assert_eq!(api.status, 500);
        assert_eq!(api.kind(), ErrorKind::Internal);
        assert!(!api.message.contains("locked"));

        let api: ApiError = ServiceError::Db(DbError::QueryFailed("syntax error".into())).into();
        assert_eq!(api.code, ErrorCode::DatabaseError);
        assert_eq!(api.message, "Database operation failed");
    }

    #[test]
    fn test_serialization() {
        let api = ApiError::not_found("Sale", "s-1");
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["status"], 404);
        assert_eq!(json["message"], "Sale not found: s-1");
    }
}
