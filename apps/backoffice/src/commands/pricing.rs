//! # Pricing Commands
//!
//! Cost-plus-margin pricing, manual overrides, bulk margin changes and the
//! profit report. Margins arrive as percents and leave as percents; the
//! layers below work in basis points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tienda_core::pricing::ProductProfit;
use tienda_core::{CostHistoryEntry, MarginUpdate, Money, Product, ProductStatus, ProfitAnalysis};
use tienda_core::DEFAULT_HISTORY_LIMIT;

use super::{bps_to_percent, percent_to_bps};
use crate::error::ApiError;
use crate::Backoffice;

// =============================================================================
// DTOs
// =============================================================================

/// Product pricing view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: String,
    pub category_id: Option<String>,
    pub sku: Option<String>,
    pub name: String,
    pub cost_price_cents: i64,
    /// Percent, e.g. `30.0`.
    pub profit_margin: f64,
    pub calculated_sale_price_cents: i64,
    pub manual_sale_price_cents: Option<i64>,
    pub using_manual_price: bool,
    /// What a sale charges right now.
    pub effective_price_cents: i64,
    pub stock: i64,
    pub min_stock: i64,
    /// Stock at or below `min_stock`.
    pub low_stock: bool,
    pub status: ProductStatus,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductDto {
    fn from(p: Product) -> Self {
        let effective_price_cents = p.effective_price().cents();
        let low_stock = p.is_low_stock();
        ProductDto {
            id: p.id,
            category_id: p.category_id,
            sku: p.sku,
            name: p.name,
            cost_price_cents: p.cost_price_cents,
            profit_margin: bps_to_percent(p.profit_margin_bps),
            calculated_sale_price_cents: p.calculated_price_cents,
            manual_sale_price_cents: p.manual_price_cents,
            using_manual_price: p.using_manual_price,
            effective_price_cents,
            stock: p.stock,
            min_stock: p.min_stock,
            low_stock,
            status: p.status,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculatePriceRequest {
    pub product_id: String,
    pub cost_price_cents: Option<i64>,
    /// Percent, `0 <= m < 100`, at most two decimals (e.g. `27.25`).
    pub profit_margin: Option<f64>,
    /// Operator recorded in cost history.
    pub changed_by: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetManualPriceRequest {
    pub product_id: String,
    pub price_cents: i64,
}

/// Exactly one of `new_margin` and `margin_increase` must be given.
///
/// Both are percents with at most two decimals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateMarginsRequest {
    pub category_id: Option<String>,
    pub new_margin: Option<f64>,
    pub margin_increase: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateMarginsResponse {
    pub updated_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductProfitDto {
    pub product_id: String,
    pub name: String,
    pub sale_price_cents: i64,
    pub cost_price_cents: i64,
    pub stock: i64,
    pub profit_per_unit_cents: i64,
    pub margin_percentage: f64,
    pub total_profit_cents: i64,
    pub using_manual_price: bool,
}

impl From<ProductProfit> for ProductProfitDto {
    fn from(p: ProductProfit) -> Self {
        ProductProfitDto {
            product_id: p.product_id,
            name: p.name,
            sale_price_cents: p.sale_price.cents(),
            cost_price_cents: p.cost_price.cents(),
            stock: p.stock,
            profit_per_unit_cents: p.profit_per_unit.cents(),
            margin_percentage: p.margin_percentage,
            total_profit_cents: p.total_profit.cents(),
            using_manual_price: p.using_manual_price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitAnalysisDto {
    pub store_name: String,
    pub product_count: usize,
    pub total_inventory_value_cents: i64,
    pub total_cost_value_cents: i64,
    pub total_profit_value_cents: i64,
    pub average_margin_percentage: f64,
    pub low_margin_products: Vec<ProductProfitDto>,
    pub top_profitable_products: Vec<ProductProfitDto>,
}

impl ProfitAnalysisDto {
    fn new(store_name: &str, analysis: ProfitAnalysis) -> Self {
        ProfitAnalysisDto {
            store_name: store_name.to_string(),
            product_count: analysis.product_count,
            total_inventory_value_cents: analysis.total_inventory_value.cents(),
            total_cost_value_cents: analysis.total_cost_value.cents(),
            total_profit_value_cents: analysis.total_profit_value.cents(),
            average_margin_percentage: analysis.average_margin_percentage,
            low_margin_products: analysis
                .low_margin_products
                .into_iter()
                .map(ProductProfitDto::from)
                .collect(),
            top_profitable_products: analysis
                .top_profitable_products
                .into_iter()
                .map(ProductProfitDto::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostHistoryDto {
    pub id: String,
    pub product_id: String,
    pub old_cost_cents: i64,
    pub new_cost_cents: i64,
    pub old_price_cents: i64,
    pub new_price_cents: i64,
    pub reason: Option<String>,
    pub changed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CostHistoryEntry> for CostHistoryDto {
    fn from(e: CostHistoryEntry) -> Self {
        CostHistoryDto {
            id: e.id,
            product_id: e.product_id,
            old_cost_cents: e.old_cost_cents,
            new_cost_cents: e.new_cost_cents,
            old_price_cents: e.old_price_cents,
            new_price_cents: e.new_price_cents,
            reason: e.reason,
            changed_by: e.changed_by,
            created_at: e.created_at,
        }
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Active catalog with prices, optionally one category only.
pub async fn list_products(
    app: &Backoffice,
    category_id: Option<&str>,
) -> Result<Vec<ProductDto>, ApiError> {
    debug!(category_id, "list_products");
    let products = app.db().products().list_active(category_id).await?;
    Ok(products.into_iter().map(ProductDto::from).collect())
}

/// Active products due for restocking, lowest stock first.
pub async fn low_stock_products(app: &Backoffice) -> Result<Vec<ProductDto>, ApiError> {
    let products = app.db().products().list_low_stock().await?;
    Ok(products.into_iter().map(ProductDto::from).collect())
}

/// Applies a new cost and/or margin and re-derives the price.
///
/// ## Errors
/// - `NOT_FOUND` (404)
/// - `INVALID_MARGIN` (400) for a margin below 0 or at/above 100
/// - `VALIDATION_ERROR` (400) for a margin with more than two decimals
pub async fn recalculate_price(
    app: &Backoffice,
    request: RecalculatePriceRequest,
) -> Result<ProductDto, ApiError> {
    debug!(product_id = %request.product_id, "recalculate_price");

    let margin_bps = request
        .profit_margin
        .map(|pct| percent_to_bps("profitMargin", pct))
        .transpose()?;

    let product = app
        .pricing()
        .recalculate_price(
            &request.product_id,
            request.cost_price_cents.map(Money::from_cents),
            margin_bps,
            request.changed_by.as_deref(),
            request.reason.as_deref(),
        )
        .await?;
    Ok(product.into())
}

/// Pins the sale price.
pub async fn set_manual_price(
    app: &Backoffice,
    request: SetManualPriceRequest,
) -> Result<ProductDto, ApiError> {
    debug!(product_id = %request.product_id, price_cents = request.price_cents, "set_manual_price");
    let product = app
        .pricing()
        .set_manual_price(&request.product_id, Money::from_cents(request.price_cents))
        .await?;
    Ok(product.into())
}

/// Drops the manual override.
pub async fn use_calculated_price(app: &Backoffice, product_id: &str) -> Result<ProductDto, ApiError> {
    debug!(product_id, "use_calculated_price");
    Ok(app.pricing().use_calculated_price(product_id).await?.into())
}

/// Changes margins across the catalog or one category.
///
/// Products the change would push out of range are skipped and not counted.
pub async fn bulk_update_margins(
    app: &Backoffice,
    request: BulkUpdateMarginsRequest,
) -> Result<BulkUpdateMarginsResponse, ApiError> {
    let update = match (request.new_margin, request.margin_increase) {
        (Some(pct), None) => MarginUpdate::Set(percent_to_bps("newMargin", pct)?),
        (None, Some(pct)) => MarginUpdate::Increase(percent_to_bps("marginIncrease", pct)?),
        _ => {
            return Err(ApiError::validation(
                "Provide exactly one of newMargin or marginIncrease",
            ))
        }
    };
    debug!(category_id = ?request.category_id, ?update, "bulk_update_margins");

    let updated_count = app
        .pricing()
        .bulk_update_margins(request.category_id.as_deref(), update)
        .await?;

    info!(updated_count, "Bulk margin update applied");
    Ok(BulkUpdateMarginsResponse { updated_count })
}

pub async fn profit_analysis(app: &Backoffice) -> Result<ProfitAnalysisDto, ApiError> {
    let analysis = app.pricing().profit_analysis().await?;
    Ok(ProfitAnalysisDto::new(&app.config().store_name, analysis))
}

/// Cost changes for a product, newest first.
pub async fn cost_history(
    app: &Backoffice,
    product_id: &str,
    limit: Option<u32>,
) -> Result<Vec<CostHistoryDto>, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let entries = app.pricing().cost_history(product_id, limit).await?;
    Ok(entries.into_iter().map(CostHistoryDto::from).collect())
}

// =============================================================================
// Unit Tests
// =============================================================================
