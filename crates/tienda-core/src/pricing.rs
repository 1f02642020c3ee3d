//! # Pricing Engine
//!
//! Cost-plus-margin pricing, manual price overrides and profit analysis.
//!
//! ## Price Derivation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Effective Sale Price                               │
//! │                                                                         │
//! │   cost_price ──┐                                                        │
//! │                ├──► cost / (1 - margin) ──► calculated_price            │
//! │   margin ──────┘    (rounded to the cent)          │                    │
//! │                                                    ▼                    │
//! │                                    using_manual_price?                  │
//! │                                     │ no              │ yes             │
//! │                                     ▼                 ▼                 │
//! │                          PriceSource::Calculated  PriceSource::Manual   │
//! │                                                                         │
//! │   Margin is over the SALE price: 30% margin means 30% of what the       │
//! │   customer pays is profit. $70 cost at 30% sells for $100.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is pure. The database layer loads products, calls these
//! functions and persists the derived fields.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{div_round_half_up, Money};
use crate::types::{Product, ProfitMargin};
use crate::LOW_MARGIN_THRESHOLD_BPS;

// =============================================================================
// Price Source
// =============================================================================

/// Where a product's effective price comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "source", content = "price", rename_all = "snake_case")]
pub enum PriceSource {
    /// Derived from cost and margin.
    Calculated(Money),
    /// Pinned by a manager.
    Manual(Money),
}

impl PriceSource {
    #[inline]
    pub fn price(&self) -> Money {
        match self {
            PriceSource::Calculated(price) | PriceSource::Manual(price) => *price,
        }
    }

    #[inline]
    pub fn is_manual(&self) -> bool {
        matches!(self, PriceSource::Manual(_))
    }
}

/// Reads the stored flag and nullable manual price as a [`PriceSource`].
///
/// A product flagged manual without a manual price falls back to the
/// calculated price.
pub fn price_source(product: &Product) -> PriceSource {
    match (product.using_manual_price, product.manual_price_cents) {
        (true, Some(cents)) => PriceSource::Manual(Money::from_cents(cents)),
        _ => PriceSource::Calculated(Money::from_cents(product.calculated_price_cents)),
    }
}

// =============================================================================
// Single-Product Operations
// =============================================================================

/// The price a sale charges for `product` right now.
#[inline]
pub fn compute_sale_price(product: &Product) -> Money {
    price_source(product).price()
}

/// Derives the sale price from cost and margin (basis points).
///
/// `cost × 10000 / (10000 - margin_bps)`, rounded half up to the cent.
///
/// ## Errors
/// - [`CoreError::InvalidMargin`] when margin is negative or at least 100%
/// - [`CoreError::InvalidPrice`] when cost is negative
///
/// ## Example
/// ```rust
/// use tienda_core::money::Money;
/// use tienda_core::pricing::recompute_calculated_price;
///
/// let price = recompute_calculated_price(Money::from_cents(7000), 3000).unwrap();
/// assert_eq!(price, Money::from_cents(10000));
///
/// assert!(recompute_calculated_price(Money::from_cents(7000), 10000).is_err());
/// ```
pub fn recompute_calculated_price(cost: Money, margin_bps: i64) -> CoreResult<Money> {
    let margin = ProfitMargin::from_bps(margin_bps)?;
    if cost.is_negative() {
        return Err(CoreError::InvalidPrice {
            cents: cost.cents(),
        });
    }

    let denominator = (ProfitMargin::MAX_EXCLUSIVE_BPS - margin.bps() as i64) as i128;
    let cents = div_round_half_up(cost.cents() as i128 * 10_000, denominator);

    i64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| CoreError::InvalidPrice { cents: i64::MAX })
}

/// `effective price - cost`. Negative when selling under cost.
pub fn profit_per_unit(product: &Product) -> Money {
    compute_sale_price(product) - product.cost_price()
}

/// `(price - cost) / price × 100`, or 0 when the price is not positive.
pub fn profit_margin_percentage(product: &Product) -> f64 {
    let price = compute_sale_price(product);
    if !price.is_positive() {
        return 0.0;
    }
    (price - product.cost_price()).cents() as f64 / price.cents() as f64 * 100.0
}

/// Profit locked in the current stock: `profit_per_unit × stock`.
///
/// Clamps at the `Money` range instead of overflowing.
pub fn total_profit_value(product: &Product) -> Money {
    profit_per_unit(product).saturating_multiply_quantity(product.stock)
}

/// Pins `price` as the product's sale price.
///
/// ## Errors
/// [`CoreError::InvalidPrice`] when `price` is negative.
pub fn set_manual_price(product: &mut Product, price: Money) -> CoreResult<()> {
    if price.is_negative() {
        return Err(CoreError::InvalidPrice {
            cents: price.cents(),
        });
    }
    product.manual_price_cents = Some(price.cents());
    product.using_manual_price = true;
    Ok(())
}

/// Clears the manual price; the calculated price applies again.
pub fn revert_to_calculated_price(product: &mut Product) {
    product.manual_price_cents = None;
    product.using_manual_price = false;
}

/// Before/after snapshot of a pricing change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingChange {
    pub old_cost: Money,
    pub new_cost: Money,
    pub old_price: Money,
    pub new_price: Money,
}

impl PricingChange {
    #[inline]
    pub fn cost_changed(&self) -> bool {
        self.old_cost != self.new_cost
    }
}

/// Applies a new cost and/or margin and recomputes the calculated price.
///
/// Leaves `product` untouched on error.
pub fn apply_pricing(
    product: &mut Product,
    cost: Option<Money>,
    margin_bps: Option<i64>,
) -> CoreResult<PricingChange> {
    let old_cost = product.cost_price();
    let old_price = compute_sale_price(product);

    let new_cost = cost.unwrap_or(old_cost);
    let new_margin = margin_bps.unwrap_or(product.profit_margin_bps);
    let calculated = recompute_calculated_price(new_cost, new_margin)?;

    product.cost_price_cents = new_cost.cents();
    product.profit_margin_bps = new_margin;
    product.calculated_price_cents = calculated.cents();

    Ok(PricingChange {
        old_cost,
        new_cost,
        old_price,
        new_price: compute_sale_price(product),
    })
}

// =============================================================================
// Bulk Margin Updates
// =============================================================================

/// Margin change applied across many products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "mode", content = "bps", rename_all = "snake_case")]
pub enum MarginUpdate {
    /// Replace every margin with this value.
    Set(i64),
    /// Add this many basis points to each current margin.
    Increase(i64),
}

impl MarginUpdate {
    /// The margin a product should move to, validated.
    pub fn target_for(&self, current_bps: i64) -> CoreResult<ProfitMargin> {
        let bps = match *self {
            MarginUpdate::Set(bps) => bps,
            MarginUpdate::Increase(delta) => current_bps.saturating_add(delta),
        };
        ProfitMargin::from_bps(bps)
    }
}

// =============================================================================
// Profit Analysis
// =============================================================================

/// Per-product line of the profit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductProfit {
    pub product_id: String,
    pub name: String,
    pub sale_price: Money,
    pub cost_price: Money,
    pub stock: i64,
    pub profit_per_unit: Money,
    pub margin_percentage: f64,
    pub total_profit: Money,
    pub using_manual_price: bool,
}

impl ProductProfit {
    pub fn from_product(product: &Product) -> Self {
        ProductProfit {
            product_id: product.id.clone(),
            name: product.name.clone(),
            sale_price: compute_sale_price(product),
            cost_price: product.cost_price(),
            stock: product.stock,
            profit_per_unit: profit_per_unit(product),
            margin_percentage: profit_margin_percentage(product),
            total_profit: total_profit_value(product),
            using_manual_price: price_source(product).is_manual(),
        }
    }
}

/// Aggregate margin analysis over the active catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProfitAnalysis {
    pub product_count: usize,
    /// Σ effective price × stock.
    pub total_inventory_value: Money,
    /// Σ cost × stock.
    pub total_cost_value: Money,
    /// Σ profit per unit × stock.
    pub total_profit_value: Money,
    /// Unweighted mean of per-product margin percentages.
    pub average_margin_percentage: f64,
    /// Products under 20% margin, lowest first.
    pub low_margin_products: Vec<ProductProfit>,
    /// Highest total profit first.
    pub top_profitable_products: Vec<ProductProfit>,
}

/// Builds the profit report for `products`.
///
/// Inactive products are ignored. Ties in either ranking are broken by
/// product id ascending so the report is deterministic. Value totals
/// saturate at the `Money` range.
pub fn analyze_profit(products: &[Product], top_n: usize) -> ProfitAnalysis {
    let rows: Vec<ProductProfit> = products
        .iter()
        .filter(|p| p.is_active())
        .map(ProductProfit::from_product)
        .collect();

    let mut total_inventory_value = Money::zero();
    let mut total_cost_value = Money::zero();
    let mut total_profit_value = Money::zero();
    let mut margin_sum = 0.0;

    for row in &rows {
        total_inventory_value = total_inventory_value
            .saturating_add(row.sale_price.saturating_multiply_quantity(row.stock));
        total_cost_value =
            total_cost_value.saturating_add(row.cost_price.saturating_multiply_quantity(row.stock));
        total_profit_value = total_profit_value.saturating_add(row.total_profit);
        margin_sum += row.margin_percentage;
    }

    let average_margin_percentage = if rows.is_empty() {
        0.0
    } else {
        margin_sum / rows.len() as f64
    };

    let threshold = LOW_MARGIN_THRESHOLD_BPS as f64 / 100.0;
    let mut low_margin_products: Vec<ProductProfit> = rows
        .iter()
        .filter(|r| r.margin_percentage < threshold)
        .cloned()
        .collect();
    low_margin_products.sort_by(|a, b| {
        a.margin_percentage
            .total_cmp(&b.margin_percentage)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });

    let mut top_profitable_products = rows.clone();
    top_profitable_products.sort_by(|a, b| match b.total_profit.cmp(&a.total_profit) {
        Ordering::Equal => a.product_id.cmp(&b.product_id),
        other => other,
    });
    top_profitable_products.truncate(top_n);

    ProfitAnalysis {
        product_count: rows.len(),
        total_inventory_value,
        total_cost_value,
        total_profit_value,
        average_margin_percentage,
        low_margin_products,
        top_profitable_products,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProductStatus;
    use chrono::Utc;

    fn product(id: &str, cost: i64, margin_bps: i64, stock: i64) -> Product {
        let calculated = recompute_calculated_price(Money::from_cents(cost), margin_bps).unwrap();
        Product {
            id: id.to_string(),
            category_id: None,
            sku: None,
            name: format!("Product {}", id),
            description: None,
            cost_price_cents: cost,
            profit_margin_bps: margin_bps,
            calculated_price_cents: calculated.cents(),
            manual_price_cents: None,
            using_manual_price: false,
            stock,
            min_stock: 0,
            status: ProductStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_margin_formula() {
        // $70 at 30% -> $100.00
        let price = recompute_calculated_price(Money::from_cents(7000), 3000).unwrap();
        assert_eq!(price.cents(), 10000);

        // zero margin sells at cost
        let price = recompute_calculated_price(Money::from_cents(1234), 0).unwrap();
        assert_eq!(price.cents(), 1234);

        // $10 at 33% = 14.925... -> 14.93
        let price = recompute_calculated_price(Money::from_cents(1000), 3300).unwrap();
        assert_eq!(price.cents(), 1493);
    }

    #[test]
    fn test_invalid_margin_rejected() {
        for bps in [10000, 15000, -1] {
            assert!(matches!(
                recompute_calculated_price(Money::from_cents(7000), bps),
                Err(CoreError::InvalidMargin { .. })
            ));
        }
        assert!(matches!(
            recompute_calculated_price(Money::from_cents(-1), 3000),
            Err(CoreError::InvalidPrice { cents: -1 })
        ));
    }

    #[test]
    fn test_manual_price_override() {
        let mut p = product("a", 7000, 3000, 10);
        assert_eq!(price_source(&p), PriceSource::Calculated(Money::from_cents(10000)));

        set_manual_price(&mut p, Money::from_cents(12000)).unwrap();
        assert_eq!(compute_sale_price(&p).cents(), 12000);
        assert!(price_source(&p).is_manual());
        assert_eq!(profit_per_unit(&p).cents(), 5000);

        revert_to_calculated_price(&mut p);
        assert_eq!(compute_sale_price(&p).cents(), 10000);
        assert_eq!(p.manual_price_cents, None);
    }

    #[test]
    fn test_negative_manual_price_rejected() {
        let mut p = product("a", 7000, 3000, 10);
        let result = set_manual_price(&mut p, Money::from_cents(-100));
        assert!(matches!(result, Err(CoreError::InvalidPrice { cents: -100 })));
        assert!(!p.using_manual_price);
    }

    #[test]
    fn test_flag_without_manual_price_uses_calculated() {
        let mut p = product("a", 7000, 3000, 10);
        p.using_manual_price = true;
        assert_eq!(compute_sale_price(&p).cents(), 10000);
    }

    #[test]
    fn test_profit_figures() {
        let p = product("a", 7000, 3000, 10);
        assert_eq!(profit_per_unit(&p).cents(), 3000);
        assert!((profit_margin_percentage(&p) - 30.0).abs() < 1e-9);
        assert_eq!(total_profit_value(&p).cents(), 30000);

        let mut free = product("b", 0, 0, 5);
        free.calculated_price_cents = 0;
        assert_eq!(profit_margin_percentage(&free), 0.0);
    }

    #[test]
    fn test_pricing_round_trip() {
        for cost in [1000, 1999, 7000, 12345, 99999, 1_000_000] {
            for bps in (0..10000).step_by(37).chain([9999]) {
                let mut p = product("x", cost, 0, 0);
                p.profit_margin_bps = bps;
                p.calculated_price_cents = recompute_calculated_price(Money::from_cents(cost), bps)
                    .unwrap()
                    .cents();
                let expected = bps as f64 / 100.0;
                let actual = profit_margin_percentage(&p);
                assert!(
                    (actual - expected).abs() <= 0.05 + 1e-9,
                    "cost {} margin {}: got {}",
                    cost,
                    bps,
                    actual
                );
            }
        }
    }

    #[test]
    fn test_apply_pricing_keeps_product_on_error() {
        let mut p = product("a", 7000, 3000, 10);
        let change = apply_pricing(&mut p, Some(Money::from_cents(8400)), None).unwrap();
        assert!(change.cost_changed());
        assert_eq!(change.old_price.cents(), 10000);
        assert_eq!(change.new_price.cents(), 12000);
        assert_eq!(p.calculated_price_cents, 12000);

        let err = apply_pricing(&mut p, Some(Money::from_cents(1)), Some(10000));
        assert!(err.is_err());
        assert_eq!(p.cost_price_cents, 8400);
        assert_eq!(p.profit_margin_bps, 3000);
    }

    #[test]
    fn test_margin_update_targets() {
        assert_eq!(MarginUpdate::Set(2500).target_for(3000).unwrap().bps(), 2500);
        assert_eq!(MarginUpdate::Increase(500).target_for(3000).unwrap().bps(), 3500);
        assert!(MarginUpdate::Increase(7000).target_for(3000).is_err());
        assert!(MarginUpdate::Increase(-4000).target_for(3000).is_err());
    }

    #[test]
    fn test_profit_analysis() {
        let mut under_cost = product("d", 1000, 0, 4);
        set_manual_price(&mut under_cost, Money::from_cents(800)).unwrap();
        let mut inactive = product("z", 1000, 5000, 100);
        inactive.status = ProductStatus::Inactive;

        let products = vec![
            product("b", 7000, 3000, 10), // profit 30000
            product("a", 1000, 1000, 3),  // 10%, profit 333
            product("c", 8000, 2000, 5),  // profit 10000
            under_cost,                   // -25%, profit -800
            inactive,
        ];

        let report = analyze_profit(&products, 2);
        assert_eq!(report.product_count, 4);
        assert_eq!(
            report.total_profit_value.cents(),
            30000 + 333 + 10000 - 800
        );
        assert_eq!(
            report.total_inventory_value.cents(),
            100000 + 3 * 1111 + 50000 + 3200
        );
        assert_eq!(report.total_cost_value.cents(), 70000 + 3000 + 40000 + 4000);

        let low: Vec<&str> = report
            .low_margin_products
            .iter()
            .map(|r| r.product_id.as_str())
            .collect();
        assert_eq!(low, vec!["d", "a"]);

        let top: Vec<&str> = report
            .top_profitable_products
            .iter()
            .map(|r| r.product_id.as_str())
            .collect();
        assert_eq!(top, vec!["b", "c"]);
    }

    #[test]
    fn test_top_profitable_tie_break() {
        let products = vec![
            product("b", 7000, 3000, 1),
            product("a", 7000, 3000, 1),
            product("c", 7000, 3000, 1),
        ];
        let report = analyze_profit(&products, 10);
        let ids: Vec<&str> = report
            .top_profitable_products
            .iter()
            .map(|r| r.product_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_analysis() {
        let report = analyze_profit(&[], 10);
        assert_eq!(report.product_count, 0);
        assert_eq!(report.average_margin_percentage, 0.0);
        assert!(report.top_profitable_products.is_empty());
    }

    #[test]
    fn test_analysis_of_huge_stock_values_saturates() {
        let mut pricey = product("a", 0, 0, 1_000);
        set_manual_price(&mut pricey, Money::from_cents(i64::MAX / 2)).unwrap();
        let normal = product("b", 7000, 3000, 5);

        let report = analyze_profit(&[pricey, normal], 10);
        assert_eq!(report.product_count, 2);
        assert_eq!(report.total_inventory_value.cents(), i64::MAX);
        assert_eq!(report.total_profit_value.cents(), i64::MAX);
        assert_eq!(report.total_cost_value.cents(), 7000 * 5);
        assert_eq!(report.top_profitable_products[0].product_id, "a");
    }
}
