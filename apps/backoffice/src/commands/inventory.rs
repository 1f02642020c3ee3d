//! # Inventory Commands
//!
//! Read access to the inventory ledger plus the two stock operations that
//! don't come from a sale: receiving goods and recording a physical count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tienda_core::{LedgerEntry, MovementType, DEFAULT_HISTORY_LIMIT};

use crate::error::ApiError;
use crate::Backoffice;

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryDto {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reason: String,
    pub reference_id: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryDto {
    fn from(e: LedgerEntry) -> Self {
        LedgerEntryDto {
            id: e.id,
            product_id: e.product_id,
            movement_type: e.movement_type,
            quantity: e.quantity,
            previous_stock: e.previous_stock,
            new_stock: e.new_stock,
            reason: e.reason,
            reference_id: e.reference_id,
            user_id: e.user_id,
            created_at: e.created_at,
        }
    }
}

/// Ledger totals next to the stock the product row holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummaryDto {
    pub product_id: String,
    pub current_stock: i64,
    pub total_in: i64,
    pub total_out: i64,
    pub net_adjustment: i64,
    pub net_change: i64,
    pub movement_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveStockRequest {
    pub product_id: String,
    pub quantity: i64,
    pub reason: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    pub product_id: String,
    /// Units physically on the shelf.
    pub counted_stock: i64,
    pub reason: String,
    pub user_id: String,
}

// =============================================================================
// Commands
// =============================================================================

/// Movements for one product, newest first.
pub async fn inventory_history(
    app: &Backoffice,
    product_id: &str,
    limit: Option<u32>,
) -> Result<Vec<LedgerEntryDto>, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    debug!(product_id, limit, "inventory_history");
    let entries = app.inventory().history_for_product(product_id, limit).await?;
    Ok(entries.into_iter().map(LedgerEntryDto::from).collect())
}

/// Newest movements across the catalog.
pub async fn recent_movements(
    app: &Backoffice,
    limit: Option<u32>,
) -> Result<Vec<LedgerEntryDto>, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let entries = app.inventory().recent(limit).await?;
    Ok(entries.into_iter().map(LedgerEntryDto::from).collect())
}

/// Movements caused by one sale.
pub async fn sale_movements(app: &Backoffice, sale_id: &str) -> Result<Vec<LedgerEntryDto>, ApiError> {
    let entries = app.inventory().entries_for_reference(sale_id).await?;
    Ok(entries.into_iter().map(LedgerEntryDto::from).collect())
}

pub async fn stock_summary(app: &Backoffice, product_id: &str) -> Result<StockSummaryDto, ApiError> {
    let current_stock = app
        .db()
        .products()
        .stock_of(product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", product_id))?;

    let summary = app.inventory().stock_summary(product_id).await?;
    Ok(StockSummaryDto {
        net_change: summary.net_change(),
        product_id: summary.product_id,
        current_stock,
        total_in: summary.total_in,
        total_out: summary.total_out,
        net_adjustment: summary.net_adjustment,
        movement_count: summary.movement_count,
    })
}

pub async fn receive_stock(
    app: &Backoffice,
    request: ReceiveStockRequest,
) -> Result<LedgerEntryDto, ApiError> {
    debug!(product_id = %request.product_id, quantity = request.quantity, "receive_stock");
    let entry = app
        .inventory()
        .receive_stock(
            &request.product_id,
            request.quantity,
            &request.reason,
            &request.user_id,
        )
        .await?;
    Ok(entry.into())
}

/// Sets stock to a counted value. `None` when the count already matched.
pub async fn adjust_stock(
    app: &Backoffice,
    request: AdjustStockRequest,
) -> Result<Option<LedgerEntryDto>, ApiError> {
    debug!(product_id = %request.product_id, counted = request.counted_stock, "adjust_stock");
    let entry = app
        .inventory()
        .adjust_stock(
            &request.product_id,
            request.counted_stock,
            &request.reason,
            &request.user_id,
        )
        .await?;
    Ok(entry.map(LedgerEntryDto::from))
}

// =============================================================================
// Unit Tests
// =============================================================================
