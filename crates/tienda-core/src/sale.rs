//! # Sale Logic
//!
//! Request validation, totals, invoice numbering and status rules for sales.
//! The unit of work that persists a sale lives in `tienda-db`; everything it
//! decides comes from here.
//!
//! ## CreateSale Pipeline
//! ```text
//! NewSale ──► validate() ──► quantities_by_product() ──► stock check (db)
//!                                                            │
//!            SaleTotals::compute(lines, discount, tax) ◄─────┘
//!                      │
//!                      ▼
//!            total >= 0 ? ──no──► InvalidAmount
//!                      │
//!                      ▼
//!            LoyaltyRate::points_for(total) ──► persisted atomically
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentMethod, SaleStatus};
use crate::validation::{validate_notes, validate_required_id};
use crate::{MAX_ITEM_QUANTITY, MAX_SALE_ITEMS};

/// Prefix of every invoice number.
pub const INVOICE_PREFIX: &str = "INV";

// =============================================================================
// Requests
// =============================================================================

/// One requested line: which product and how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// Everything needed to create a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    pub customer_id: Option<String>,
    /// Operator ringing up the sale.
    pub user_id: String,
    pub items: Vec<SaleItemRequest>,
    pub discount: Money,
    pub tax: Money,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl NewSale {
    /// Checks the request shape before any lookups happen.
    pub fn validate(&self) -> CoreResult<()> {
        if self.items.is_empty() {
            return Err(CoreError::EmptyOrder);
        }
        if self.items.len() > MAX_SALE_ITEMS {
            return Err(ValidationError::OutOfRange {
                field: "items".to_string(),
                min: 1,
                max: MAX_SALE_ITEMS as i64,
            }
            .into());
        }

        validate_required_id("user_id", &self.user_id)?;
        if let Some(customer_id) = &self.customer_id {
            validate_required_id("customer_id", customer_id)?;
        }

        for item in &self.items {
            validate_required_id("product_id", &item.product_id)?;
            if item.quantity < 1 || item.quantity > MAX_ITEM_QUANTITY {
                return Err(CoreError::InvalidQuantity {
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                });
            }
        }

        if self.discount.is_negative() {
            return Err(CoreError::InvalidAmount {
                reason: format!("discount {} is negative", self.discount),
            });
        }
        if self.tax.is_negative() {
            return Err(CoreError::InvalidAmount {
                reason: format!("tax {} is negative", self.tax),
            });
        }

        if let Some(notes) = &self.notes {
            validate_notes(notes)?;
        }
        Ok(())
    }

    /// Total requested quantity per distinct product, in first-seen order.
    ///
    /// Stock checks, stock decrements and ledger entries work per product,
    /// so two lines for the same product are checked against their sum.
    pub fn quantities_by_product(&self) -> Vec<(String, i64)> {
        let mut totals: Vec<(String, i64)> = Vec::new();
        for item in &self.items {
            match totals.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, qty)) => *qty += item.quantity,
                None => totals.push((item.product_id.clone(), item.quantity)),
            }
        }
        totals
    }
}

// =============================================================================
// Totals
// =============================================================================

/// A requested line with its price frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl PricedLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// Computed money fields of a sale header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl SaleTotals {
    /// `total = Σ(unit_price × quantity) - discount + tax`.
    ///
    /// ## Errors
    /// [`CoreError::InvalidAmount`] when the total would be negative or any
    /// step overflows.
    pub fn compute(lines: &[PricedLine], discount: Money, tax: Money) -> CoreResult<Self> {
        let mut subtotal = Money::zero();
        for line in lines {
            subtotal = line
                .unit_price
                .checked_multiply_quantity(line.quantity)
                .and_then(|line_total| subtotal.checked_add(line_total))
                .ok_or_else(|| CoreError::InvalidAmount {
                    reason: format!("subtotal overflows at product {}", line.product_id),
                })?;
        }

        let total = subtotal
            .checked_sub(discount)
            .and_then(|t| t.checked_add(tax))
            .ok_or_else(|| CoreError::InvalidAmount {
                reason: format!(
                    "total overflows (subtotal {}, discount {}, tax {})",
                    subtotal, discount, tax
                ),
            })?;
        if total.is_negative() {
            return Err(CoreError::InvalidAmount {
                reason: format!(
                    "total {} is negative (subtotal {}, discount {}, tax {})",
                    total, subtotal, discount, tax
                ),
            });
        }

        Ok(SaleTotals {
            subtotal,
            discount,
            tax,
            total,
        })
    }
}

// =============================================================================
// Invoice Numbers
// =============================================================================

/// Counter key for invoice sequences (`YYYYMMDD`).
pub fn invoice_day_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Formats `INV-YYYYMMDD-NNNNNN`.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use tienda_core::sale::format_invoice_number;
///
/// let date = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
/// assert_eq!(format_invoice_number(date, 42), "INV-20261014-000042");
/// ```
pub fn format_invoice_number(date: NaiveDate, sequence: i64) -> String {
    format!("{}-{}-{:06}", INVOICE_PREFIX, invoice_day_key(date), sequence)
}

// =============================================================================
// Status & Cancellation
// =============================================================================

/// Validates a status change requested through UpdateSale.
///
/// Only `pending` and `completed` may be swapped here. `cancelled` is
/// reached through CancelSale alone and never left.
pub fn check_status_transition(sale_id: &str, from: SaleStatus, to: SaleStatus) -> CoreResult<()> {
    match (from, to) {
        (SaleStatus::Cancelled, _) | (_, SaleStatus::Cancelled) => {
            Err(CoreError::InvalidStatusTransition {
                sale_id: sale_id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// Appends a cancellation marker to the existing notes.
///
/// ## Example
/// ```rust
/// use tienda_core::sale::cancellation_note;
///
/// assert_eq!(
///     cancellation_note(Some("gift wrap"), "wrong size"),
///     "gift wrap [CANCELLED: wrong size]"
/// );
/// assert_eq!(cancellation_note(None, "wrong size"), "[CANCELLED: wrong size]");
/// ```
pub fn cancellation_note(existing: Option<&str>, reason: &str) -> String {
    let marker = format!("[CANCELLED: {}]", reason.trim());
    match existing.map(str::trim) {
        Some(notes) if !notes.is_empty() => format!("{} {}", notes, marker),
        _ => marker,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
