//! # Sale Commands
//!
//! ```text
//! POST  /sales               create_sale     ─► SaleDto (201)
//! GET   /sales               recent_sales    ─► [SaleHeaderDto]
//! GET   /sales/{id}          get_sale        ─► SaleDto
//! GET   /sales/invoice/{n}   get_sale_by_invoice
//! POST  /sales/{id}/cancel   cancel_sale     ─► CancelSaleResponse
//! PATCH /sales/{id}          update_sale     ─► SaleDto
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tienda_core::{
    CustomerSummary, Money, NewSale, PaymentMethod, Sale, SaleDetails, SaleItemRequest,
    SaleLineItem, SaleStatus, UserSummary, DEFAULT_HISTORY_LIMIT,
};
use tienda_db::{CancelledSale, RestoredStock, SaleUpdate};

use crate::error::ApiError;
use crate::Backoffice;

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemInput {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub customer_id: Option<String>,
    /// Operator ringing up the sale.
    pub user_id: String,
    pub items: Vec<SaleItemInput>,
    #[serde(default)]
    pub discount_amount_cents: i64,
    #[serde(default)]
    pub tax_amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl From<CreateSaleRequest> for NewSale {
    fn from(req: CreateSaleRequest) -> Self {
        NewSale {
            customer_id: req.customer_id,
            user_id: req.user_id,
            items: req
                .items
                .into_iter()
                .map(|item| SaleItemRequest {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
            discount: Money::from_cents(req.discount_amount_cents),
            tax: Money::from_cents(req.tax_amount_cents),
            payment_method: req.payment_method,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItemDto {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<SaleLineItem> for SaleItemDto {
    fn from(item: SaleLineItem) -> Self {
        SaleItemDto {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            line_total_cents: item.line_total_cents,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleCustomerDto {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub loyalty_points: i64,
}

impl From<CustomerSummary> for SaleCustomerDto {
    fn from(c: CustomerSummary) -> Self {
        SaleCustomerDto {
            id: c.id,
            name: c.name,
            email: c.email,
            loyalty_points: c.loyalty_points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleOperatorDto {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

impl From<UserSummary> for SaleOperatorDto {
    fn from(u: UserSummary) -> Self {
        SaleOperatorDto {
            id: u.id,
            username: u.username,
            display_name: u.display_name,
        }
    }
}

/// A sale with its line items, customer and operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDto {
    pub id: String,
    pub invoice_number: String,
    pub subtotal_cents: i64,
    pub discount_amount_cents: i64,
    pub tax_amount_cents: i64,
    pub total_amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub notes: Option<String>,
    pub loyalty_points_earned: i64,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub items: Vec<SaleItemDto>,
    pub customer: Option<SaleCustomerDto>,
    pub operator: SaleOperatorDto,
}

impl From<SaleDetails> for SaleDto {
    fn from(details: SaleDetails) -> Self {
        let sale = details.sale;
        SaleDto {
            id: sale.id,
            invoice_number: sale.invoice_number,
            subtotal_cents: sale.subtotal_cents,
            discount_amount_cents: sale.discount_cents,
            tax_amount_cents: sale.tax_cents,
            total_amount_cents: sale.total_cents,
            payment_method: sale.payment_method,
            status: sale.status,
            notes: sale.notes,
            loyalty_points_earned: sale.loyalty_points_earned,
            created_at: sale.created_at,
            cancelled_at: sale.cancelled_at,
            items: details.items.into_iter().map(SaleItemDto::from).collect(),
            customer: details.customer.map(SaleCustomerDto::from),
            operator: details.operator.into(),
        }
    }
}

/// Sale header without line items, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleHeaderDto {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: Option<String>,
    pub total_amount_cents: i64,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Sale> for SaleHeaderDto {
    fn from(sale: Sale) -> Self {
        SaleHeaderDto {
            id: sale.id,
            invoice_number: sale.invoice_number,
            customer_id: sale.customer_id,
            total_amount_cents: sale.total_cents,
            payment_method: sale.payment_method,
            status: sale.status,
            created_at: sale.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSaleRequest {
    pub sale_id: String,
    pub reason: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredStockDto {
    pub product_id: String,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
}

impl From<RestoredStock> for RestoredStockDto {
    fn from(r: RestoredStock) -> Self {
        RestoredStockDto {
            product_id: r.product_id,
            quantity: r.quantity,
            previous_stock: r.previous_stock,
            new_stock: r.new_stock,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSaleResponse {
    pub id: String,
    pub invoice_number: String,
    pub status: SaleStatus,
    pub cancelled_at: DateTime<Utc>,
    pub restored: Vec<RestoredStockDto>,
    /// Points the sale earned that stay with the customer.
    pub loyalty_points_retained: i64,
}

impl From<CancelledSale> for CancelSaleResponse {
    fn from(c: CancelledSale) -> Self {
        CancelSaleResponse {
            id: c.sale_id,
            invoice_number: c.invoice_number,
            status: c.status,
            cancelled_at: c.cancelled_at,
            restored: c.restored.into_iter().map(RestoredStockDto::from).collect(),
            loyalty_points_retained: c.loyalty_points_retained,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleRequest {
    pub sale_id: String,
    pub status: Option<SaleStatus>,
    /// Replaces the notes; an empty string clears them.
    pub notes: Option<String>,
}

// =============================================================================
// Commands
// =============================================================================

/// Rings up a sale.
///
/// ## Errors
/// - `EMPTY_ORDER` / `INVALID_QUANTITY` / `VALIDATION_ERROR` (400)
/// - `NOT_FOUND` (404) for an unknown product, customer or operator
/// - `INSUFFICIENT_STOCK` (400)
pub async fn create_sale(app: &Backoffice, request: CreateSaleRequest) -> Result<SaleDto, ApiError> {
    debug!(
        items = request.items.len(),
        customer = ?request.customer_id,
        "create_sale"
    );

    let request = NewSale::from(request);
    let details = app.sales().create_sale(&request).await?;

    info!(
        invoice = %details.sale.invoice_number,
        total_cents = details.sale.total_cents,
        "Sale created"
    );
    Ok(details.into())
}

/// Newest sales first, cancelled ones included.
pub async fn recent_sales(app: &Backoffice, limit: Option<u32>) -> Result<Vec<SaleHeaderDto>, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    debug!(limit, "recent_sales");
    let sales = app.db().sales().list_recent(limit).await?;
    Ok(sales.into_iter().map(SaleHeaderDto::from).collect())
}

pub async fn get_sale(app: &Backoffice, sale_id: &str) -> Result<SaleDto, ApiError> {
    debug!(sale_id, "get_sale");
    Ok(app.sales().get_sale(sale_id).await?.into())
}

pub async fn get_sale_by_invoice(app: &Backoffice, invoice_number: &str) -> Result<SaleDto, ApiError> {
    debug!(invoice_number, "get_sale_by_invoice");
    Ok(app.sales().get_sale_by_invoice(invoice_number).await?.into())
}

/// Cancels a sale and restores its stock.
///
/// ## Errors
/// - `NOT_FOUND` (404) for an unknown sale or operator
/// - `ALREADY_CANCELLED` (400)
pub async fn cancel_sale(
    app: &Backoffice,
    request: CancelSaleRequest,
) -> Result<CancelSaleResponse, ApiError> {
    debug!(sale_id = %request.sale_id, "cancel_sale");

    let cancelled = app
        .sales()
        .cancel_sale(&request.sale_id, &request.reason, &request.user_id)
        .await?;

    info!(invoice = %cancelled.invoice_number, "Sale cancelled");
    Ok(cancelled.into())
}

/// Changes notes and/or moves a sale between pending and completed.
///
/// Cancelling goes through [`cancel_sale`], never through here.
pub async fn update_sale(app: &Backoffice, request: UpdateSaleRequest) -> Result<SaleDto, ApiError> {
    debug!(sale_id = %request.sale_id, status = ?request.status, "update_sale");

    let sales = app.sales();
    let update = SaleUpdate {
        status: request.status,
        notes: request.notes,
    };
    sales.update_sale(&request.sale_id, &update).await?;
    Ok(sales.get_sale(&request.sale_id).await?.into())
}

// =============================================================================
// Unit Tests
// =============================================================================
