//! # Inventory Ledger Arithmetic
//!
//! Every stock change is written as one immutable ledger entry carrying the
//! stock level before and after the movement.
//!
//! ## Snapshot Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  type         │ rule                         │ written by               │
//! │  ─────────────┼──────────────────────────────┼───────────────────────── │
//! │  in           │ new = previous + quantity    │ cancellation, receiving  │
//! │  out          │ new = previous - quantity    │ sale                     │
//! │  adjustment   │ |new - previous| = quantity  │ stock count              │
//! │                                                                         │
//! │  quantity >= 1, previous >= 0, new >= 0                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Replaying a product's entries in order from its initial stock gives its
//! current stock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Movement Type
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
}

impl MovementType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks quantity and snapshots against the movement type.
///
/// ## Errors
/// - [`CoreError::InvalidQuantity`] if `quantity < 1`
/// - [`CoreError::InvalidStockSnapshot`] if a snapshot is negative or the
///   arithmetic doesn't match `movement`
pub fn validate_movement(
    product_id: &str,
    movement: MovementType,
    quantity: i64,
    previous_stock: i64,
    new_stock: i64,
) -> CoreResult<()> {
    if quantity < 1 {
        return Err(CoreError::InvalidQuantity {
            product_id: product_id.to_string(),
            quantity,
        });
    }

    let consistent = previous_stock >= 0
        && new_stock >= 0
        && match movement {
            MovementType::In => previous_stock.checked_add(quantity) == Some(new_stock),
            MovementType::Out => previous_stock.checked_sub(quantity) == Some(new_stock),
            MovementType::Adjustment => (new_stock - previous_stock).abs() == quantity,
        };

    if !consistent {
        return Err(CoreError::InvalidStockSnapshot {
            movement: movement.to_string(),
            previous: previous_stock,
            new: new_stock,
            quantity,
        });
    }
    Ok(())
}

// =============================================================================
// Entries
// =============================================================================

/// A recorded ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reason: String,
    /// Sale that caused the movement, if any.
    pub reference_id: Option<String>,
    /// Operator responsible for the movement.
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Stock change this entry represents.
    #[inline]
    pub fn signed_delta(&self) -> i64 {
        self.new_stock - self.previous_stock
    }
}

/// An entry about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub product_id: String,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reason: String,
    pub reference_id: Option<String>,
    pub user_id: String,
}

impl NewLedgerEntry {
    pub fn validate(&self) -> CoreResult<()> {
        validate_movement(
            &self.product_id,
            self.movement_type,
            self.quantity,
            self.previous_stock,
            self.new_stock,
        )
    }

    /// `out` entry for a sale. `new_stock` is derived from `previous_stock`.
    pub fn sale(
        product_id: &str,
        previous_stock: i64,
        quantity: i64,
        invoice_number: &str,
        sale_id: &str,
        user_id: &str,
    ) -> Self {
        NewLedgerEntry {
            product_id: product_id.to_string(),
            movement_type: MovementType::Out,
            quantity,
            previous_stock,
            new_stock: previous_stock - quantity,
            reason: format!("Sale {}", invoice_number),
            reference_id: Some(sale_id.to_string()),
            user_id: user_id.to_string(),
        }
    }

    /// `in` entry restoring stock for a cancelled sale.
    pub fn cancellation(
        product_id: &str,
        previous_stock: i64,
        quantity: i64,
        invoice_number: &str,
        cancel_reason: &str,
        sale_id: &str,
        user_id: &str,
    ) -> Self {
        NewLedgerEntry {
            product_id: product_id.to_string(),
            movement_type: MovementType::In,
            quantity,
            previous_stock,
            new_stock: previous_stock + quantity,
            reason: format!(
                "Cancellation of sale {}: {}",
                invoice_number,
                cancel_reason.trim()
            ),
            reference_id: Some(sale_id.to_string()),
            user_id: user_id.to_string(),
        }
    }

    /// `adjustment` entry moving stock to an absolute count.
    ///
    /// Returns `None` when the count is unchanged (nothing to record).
    pub fn adjustment(
        product_id: &str,
        previous_stock: i64,
        counted_stock: i64,
        reason: &str,
        user_id: &str,
    ) -> Option<Self> {
        if counted_stock == previous_stock {
            return None;
        }
        Some(NewLedgerEntry {
            product_id: product_id.to_string(),
            movement_type: MovementType::Adjustment,
            quantity: (counted_stock - previous_stock).abs(),
            previous_stock,
            new_stock: counted_stock,
            reason: reason.trim().to_string(),
            reference_id: None,
            user_id: user_id.to_string(),
        })
    }
}

// =============================================================================
// Replay & Summary
// =============================================================================

/// Replays entries (oldest first) on top of `initial` stock.
pub fn replay(initial: i64, entries: &[LedgerEntry]) -> i64 {
    entries
        .iter()
        .fold(initial, |stock, entry| stock + entry.signed_delta())
}

/// Index of the first entry whose `previous_stock` doesn't match the
/// running total, or `None` if the chain is unbroken.
pub fn find_chain_break(initial: i64, entries: &[LedgerEntry]) -> Option<usize> {
    let mut running = initial;
    for (index, entry) in entries.iter().enumerate() {
        if entry.previous_stock != running {
            return Some(index);
        }
        running = entry.new_stock;
    }
    None
}

/// Movement totals for one product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockSummary {
    pub product_id: String,
    /// Sum of `in` quantities.
    pub total_in: i64,
    /// Sum of `out` quantities.
    pub total_out: i64,
    /// Signed sum of adjustments.
    pub net_adjustment: i64,
    pub movement_count: i64,
}

impl StockSummary {
    pub fn from_entries(product_id: &str, entries: &[LedgerEntry]) -> Self {
        entries
            .iter()
            .filter(|e| e.product_id == product_id)
            .fold(
                StockSummary {
                    product_id: product_id.to_string(),
                    ..Default::default()
                },
                |mut summary, entry| {
                    match entry.movement_type {
                        MovementType::In => summary.total_in += entry.quantity,
                        MovementType::Out => summary.total_out += entry.quantity,
                        MovementType::Adjustment => summary.net_adjustment += entry.signed_delta(),
                    }
                    summary.movement_count += 1;
                    summary
                },
            )
    }

    /// Net stock change across all movements.
    #[inline]
    pub fn net_change(&self) -> i64 {
        self.total_in - self.total_out + self.net_adjustment
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(movement: MovementType, quantity: i64, previous: i64, new: i64) -> LedgerEntry {
        LedgerEntry {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: "p".to_string(),
            movement_type: movement,
            quantity,
            previous_stock: previous,
            new_stock: new,
            reason: "test".to_string(),
            reference_id: None,
            user_id: "u".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_movement_rules() {
        assert!(validate_movement("p", MovementType::Out, 2, 10, 8).is_ok());
        assert!(validate_movement("p", MovementType::In, 3, 4, 7).is_ok());
        assert!(validate_movement("p", MovementType::Adjustment, 2, 10, 8).is_ok());
        assert!(validate_movement("p", MovementType::Adjustment, 2, 8, 10).is_ok());

        assert!(matches!(
            validate_movement("p", MovementType::Out, 0, 10, 10),
            Err(CoreError::InvalidQuantity { quantity: 0, .. })
        ));
        assert!(matches!(
            validate_movement("p", MovementType::Out, 2, 10, 9),
            Err(CoreError::InvalidStockSnapshot { .. })
        ));
        assert!(matches!(
            validate_movement("p", MovementType::Out, 5, 1, -4),
            Err(CoreError::InvalidStockSnapshot { .. })
        ));
        assert!(validate_movement("p", MovementType::In, 2, 10, 8).is_err());
    }

    #[test]
    fn test_sale_and_cancellation_entries() {
        let out = NewLedgerEntry::sale("p", 10, 2, "INV-20261014-000001", "s", "u");
        assert_eq!(out.new_stock, 8);
        assert_eq!(out.reason, "Sale INV-20261014-000001");
        assert!(out.validate().is_ok());

        let back = NewLedgerEntry::cancellation("p", 4, 3, "INV-1", " damaged ", "s", "u");
        assert_eq!(back.new_stock, 7);
        assert_eq!(back.movement_type, MovementType::In);
        assert_eq!(back.reason, "Cancellation of sale INV-1: damaged");

        // an out entry that would go negative fails validation
        assert!(NewLedgerEntry::sale("p", 1, 5, "INV-1", "s", "u").validate().is_err());
    }

    #[test]
    fn test_adjustment_entry() {
        let adj = NewLedgerEntry::adjustment("p", 10, 7, "count", "u").unwrap();
        assert_eq!(adj.quantity, 3);
        assert!(adj.validate().is_ok());
        assert!(NewLedgerEntry::adjustment("p", 5, 5, "count", "u").is_none());
    }

    #[test]
    fn test_replay_reproduces_stock() {
        let entries = vec![
            entry(MovementType::Out, 2, 10, 8),
            entry(MovementType::Out, 4, 8, 4),
            entry(MovementType::In, 3, 4, 7),
            entry(MovementType::Adjustment, 1, 7, 6),
        ];
        assert_eq!(replay(10, &entries), 6);
        assert_eq!(find_chain_break(10, &entries), None);
        assert_eq!(find_chain_break(9, &entries), Some(0));

        let summary = StockSummary::from_entries("p", &entries);
        assert_eq!(summary.total_in, 3);
        assert_eq!(summary.total_out, 6);
        assert_eq!(summary.net_adjustment, -1);
        assert_eq!(summary.movement_count, 4);
        assert_eq!(summary.net_change(), -4);
    }
}
