//! # Domain Types
//!
//! Core domain types used throughout Tienda POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │  SaleLineItem   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  sale_id (FK)   │       │
//! │  │  cost_price     │   │  invoice_number │   │  product_id(FK) │       │
//! │  │  margin (bps)   │   │  status         │   │  unit_price     │       │
//! │  │  stock          │   │  total          │   │  (frozen)       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ProfitMargin   │   │   SaleStatus    │   │ PaymentMethod   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  bps (u32)      │   │  Pending        │   │  Cash, Card     │       │
//! │  │  3000 = 30%     │   │  Completed      │   │  Transfer       │       │
//! │  └─────────────────┘   │  Cancelled      │   │  Credit         │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Relations
//! Entities reference each other by id only (`sale.customer_id`,
//! `line.product_id`). Related rows are resolved by explicit lookups in
//! the database layer and composed into [`SaleDetails`] on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Profit Margin
// =============================================================================

/// Profit margin over the sale price, in basis points.
///
/// 3000 bps = 30%: a product costing $70 sells for $100. Valid range is
/// `0 <= bps < 10000`; at 100% the cost-plus-margin formula divides by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProfitMargin(u32);

impl ProfitMargin {
    /// Exclusive upper bound (100%).
    pub const MAX_EXCLUSIVE_BPS: i64 = 10_000;

    /// Creates a margin, rejecting anything outside `0..10000` bps.
    pub fn from_bps(bps: i64) -> CoreResult<Self> {
        if !(0..Self::MAX_EXCLUSIVE_BPS).contains(&bps) {
            return Err(CoreError::InvalidMargin { bps });
        }
        Ok(ProfitMargin(bps as u32))
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Percentage for display (3000 bps -> 30.0).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

// =============================================================================
// Loyalty Rate
// =============================================================================

/// Fraction of a sale total credited to the customer as loyalty points.
///
/// Points are counted per currency unit. 100 bps = 1%: a $200.00 sale
/// earns 2 points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltyRate(u32);

impl LoyaltyRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        LoyaltyRate(bps)
    }

    /// Creates a rate from a fraction such as `0.01`.
    ///
    /// Returns `None` for negative or non-finite fractions.
    pub fn from_fraction(fraction: f64) -> Option<Self> {
        if !fraction.is_finite() || fraction < 0.0 {
            return None;
        }
        let bps = (fraction * 10_000.0).round();
        if bps > u32::MAX as f64 {
            return None;
        }
        Some(LoyaltyRate(bps as u32))
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Points earned for a sale total. Rounds down, never negative.
    ///
    /// ## Example
    /// ```rust
    /// use tienda_core::money::Money;
    /// use tienda_core::types::LoyaltyRate;
    ///
    /// let rate = LoyaltyRate::default(); // 1%
    /// assert_eq!(rate.points_for(Money::from_cents(20000)), 2);
    /// ```
    pub fn points_for(&self, total: Money) -> i64 {
        if total.is_negative() {
            return 0;
        }
        total.whole_units_at_bps(self.0)
    }
}

impl Default for LoyaltyRate {
    fn default() -> Self {
        LoyaltyRate(crate::DEFAULT_LOYALTY_RATE_BPS)
    }
}

// =============================================================================
// Product
// =============================================================================

/// Catalog lifecycle of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Inactive,
    Discontinued,
}

/// A product in the catalog.
///
/// ## Price Fields
/// `calculated_price_cents` is derived from cost and margin and kept up to
/// date by the pricing operations. `manual_price_cents` is only charged
/// while `using_manual_price` is set. See [`crate::pricing::price_source`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub category_id: Option<String>,

    /// Stock Keeping Unit - business identifier.
    pub sku: Option<String>,

    /// Display name, also snapshotted onto sale line items.
    pub name: String,

    pub description: Option<String>,

    /// Cost price in cents (never negative).
    pub cost_price_cents: i64,

    /// Profit margin in basis points (`0..10000`).
    pub profit_margin_bps: i64,

    /// `cost / (1 - margin)` rounded to the cent.
    pub calculated_price_cents: i64,

    /// Pinned price, charged while `using_manual_price` is true.
    pub manual_price_cents: Option<i64>,

    pub using_manual_price: bool,

    /// Units on hand (never negative).
    pub stock: i64,

    /// Threshold for low-stock alerts.
    pub min_stock: i64,

    pub status: ProductStatus,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    /// The stored margin, validated.
    pub fn margin(&self) -> CoreResult<ProfitMargin> {
        ProfitMargin::from_bps(self.profit_margin_bps)
    }

    /// The price a sale charges right now.
    #[inline]
    pub fn effective_price(&self) -> Money {
        crate::pricing::compute_sale_price(self)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

/// Catalog input for a new product. Prices are derived on build.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub category_id: Option<String>,
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub cost_price_cents: i64,
    pub profit_margin_bps: i64,
    pub manual_price_cents: Option<i64>,
    pub stock: i64,
    pub min_stock: i64,
}

impl NewProduct {
    /// Validates the input and derives the calculated price.
    pub fn build(self, now: DateTime<Utc>) -> CoreResult<Product> {
        crate::validation::validate_product_name(&self.name)?;
        if let Some(sku) = &self.sku {
            crate::validation::validate_sku(sku)?;
        }
        crate::validation::validate_stock_level(self.stock)?;
        crate::validation::validate_stock_level(self.min_stock)?;

        let calculated = crate::pricing::recompute_calculated_price(
            Money::from_cents(self.cost_price_cents),
            self.profit_margin_bps,
        )?;

        let mut product = Product {
            id: uuid::Uuid::new_v4().to_string(),
            category_id: self.category_id,
            sku: self.sku.map(|s| s.trim().to_string()),
            name: self.name.trim().to_string(),
            description: self.description,
            cost_price_cents: self.cost_price_cents,
            profit_margin_bps: self.profit_margin_bps,
            calculated_price_cents: calculated.cents(),
            manual_price_cents: None,
            using_manual_price: false,
            stock: self.stock,
            min_stock: self.min_stock,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        };
        if let Some(cents) = self.manual_price_cents {
            crate::pricing::set_manual_price(&mut product, Money::from_cents(cents))?;
        }
        Ok(product)
    }
}

// =============================================================================
// Category
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Customer & User
// =============================================================================

/// A customer with a loyalty account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Accrued loyalty points (never negative).
    pub loyalty_points: i64,
    /// Store credit in cents (never negative).
    pub credit_balance_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn summary(&self) -> CustomerSummary {
        CustomerSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            loyalty_points: self.loyalty_points,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    Cashier,
}

/// A back-office operator. Every sale and stock movement names one.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: UserRole,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerSummary {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub loyalty_points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

// =============================================================================
// Sale Status & Payment Method
// =============================================================================

/// The status of a sale.
///
/// ```text
/// pending ◄──► completed ──► cancelled (terminal)
///                  ▲
///                  └── CreateSale starts here
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Completed,
    Cancelled,
}

impl SaleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    /// Charged to the customer's account.
    Credit,
}

// =============================================================================
// Sale
// =============================================================================

/// A sale header.
///
/// ## Totals Invariant
/// `total = subtotal - discount + tax`, where subtotal is the sum of the
/// line items' `unit_price × quantity`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,

    /// Human-facing identifier, `INV-YYYYMMDD-NNNNNN`.
    pub invoice_number: String,

    pub customer_id: Option<String>,

    /// Operator who rang up the sale.
    pub user_id: String,

    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,

    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub notes: Option<String>,

    /// Points credited to the customer when the sale was created.
    pub loyalty_points_earned: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.status == SaleStatus::Cancelled
    }
}

/// One line of a sale.
///
/// `unit_price_cents` is the product's effective price at sale time and is
/// never rewritten afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLineItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Product name at sale time.
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A sale with its line items and resolved relations.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetails {
    pub sale: Sale,
    pub items: Vec<SaleLineItem>,
    pub customer: Option<CustomerSummary>,
    pub operator: UserSummary,
}

// =============================================================================
// Cost History
// =============================================================================

/// One recorded change of a product's cost price.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CostHistoryEntry {
    pub id: String,
    pub product_id: String,
    pub old_cost_cents: i64,
    pub new_cost_cents: i64,
    /// Effective price before the change.
    pub old_price_cents: i64,
    /// Effective price after the change.
    pub new_price_cents: i64,
    pub reason: Option<String>,
    pub changed_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profit_margin_bounds() {
        assert!(ProfitMargin::from_bps(0).is_ok());
        assert!(ProfitMargin::from_bps(9999).is_ok());
        assert!(matches!(
            ProfitMargin::from_bps(10000),
            Err(CoreError::InvalidMargin { bps: 10000 })
        ));
        assert!(ProfitMargin::from_bps(-1).is_err());
    }

    #[test]
    fn test_loyalty_rate() {
        let rate = LoyaltyRate::from_fraction(0.01).unwrap();
        assert_eq!(rate, LoyaltyRate::default());
        // $199.99 at 1% is 1.9999 points
        assert_eq!(rate.points_for(Money::from_cents(19999)), 1);
        assert_eq!(rate.points_for(Money::from_cents(20000)), 2);
        assert_eq!(rate.points_for(Money::from_cents(99)), 0);
        assert_eq!(rate.points_for(Money::from_cents(-500)), 0);
        assert_eq!(LoyaltyRate::from_bps(500).points_for(Money::from_cents(24199)), 12);
        assert!(LoyaltyRate::from_fraction(-0.5).is_none());
        assert_eq!(LoyaltyRate::from_fraction(0.025).unwrap().bps(), 250);
    }

    #[test]
    fn test_new_product_build() {
        let input = NewProduct {
            category_id: None,
            sku: Some("YERBA-1KG".to_string()),
            name: " Yerba Mate 1kg ".to_string(),
            description: None,
            cost_price_cents: 7000,
            profit_margin_bps: 3000,
            manual_price_cents: None,
            stock: 10,
            min_stock: 2,
        };
        let product = input.clone().build(Utc::now()).unwrap();
        assert_eq!(product.name, "Yerba Mate 1kg");
        assert_eq!(product.calculated_price_cents, 10000);
        assert_eq!(product.effective_price().cents(), 10000);
        assert!(product.is_active());

        let pinned = NewProduct {
            manual_price_cents: Some(9500),
            ..input.clone()
        }
        .build(Utc::now())
        .unwrap();
        assert!(pinned.using_manual_price);
        assert_eq!(pinned.effective_price().cents(), 9500);

        let bad = NewProduct {
            profit_margin_bps: 10000,
            ..input
        };
        assert!(matches!(
            bad.build(Utc::now()),
            Err(CoreError::InvalidMargin { .. })
        ));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SaleStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!(
            serde_json::from_str::<PaymentMethod>("\"transfer\"").unwrap(),
            PaymentMethod::Transfer
        );
        assert_eq!(SaleStatus::Completed.to_string(), "completed");
    }
}
