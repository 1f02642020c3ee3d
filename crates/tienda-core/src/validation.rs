//! # Validation Module
//!
//! Input validation utilities for Tienda POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP layer (external)                                        │
//! │  └── JSON shape, types                                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Pure checks (Rust)                                           │
//! │  └── THIS MODULE + NewSale::validate, ProfitMargin::from_bps           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0), CHECK (quantity >= 1)                         │
//! │  ├── UNIQUE (invoice_number)                                           │
//! │  └── Foreign key constraints, append-only triggers                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_ID_LEN: usize = 64;
const MAX_NAME_LEN: usize = 200;
const MAX_NOTES_LEN: usize = 1000;
const MAX_REASON_LEN: usize = 500;

/// Largest page a history query may request.
pub const MAX_HISTORY_LIMIT: u32 = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an entity reference: non-blank, at most 64 characters.
pub fn validate_required_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if id.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LEN,
        });
    }
    Ok(())
}

/// Validates a SKU: 1-50 characters of letters, digits, `-` and `_`.
///
/// ## Example
/// ```rust
/// use tienda_core::validation::validate_sku;
///
/// assert!(validate_sku("YERBA-1KG").is_ok());
/// assert!(validate_sku("").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Free-text sale notes: optional, at most 1000 characters.
pub fn validate_notes(notes: &str) -> ValidationResult<()> {
    if notes.len() > MAX_NOTES_LEN {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LEN,
        });
    }
    Ok(())
}

/// Validates a mandatory reason (cancellations, stock adjustments).
///
/// ## Returns
/// The trimmed reason.
pub fn validate_reason(reason: &str) -> ValidationResult<&str> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(reason)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a stock movement quantity (receiving, counting).
pub fn validate_stock_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 1 || qty > 1_000_000 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: 1_000_000,
        });
    }
    Ok(())
}

/// Validates a counted stock level for adjustments (zero allowed).
pub fn validate_stock_level(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a history page size.
pub fn validate_limit(limit: u32) -> ValidationResult<()> {
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_HISTORY_LIMIT as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
