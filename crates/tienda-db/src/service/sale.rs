//! # Sale Service
//!
//! CreateSale, CancelSale and UpdateSale, each as one transaction.
//!
//! ## CreateSale
//! ```text
//! validate() ─── shape errors never open a transaction
//!     │
//! BEGIN
//!   next_invoice_sequence(day)        write lock taken here
//!   operator, customer, products      reads against a stable snapshot
//!   stock < qty ? ──► InsufficientStock (rollback)
//!   SaleTotals::compute               total < 0 ? ──► InvalidAmount
//!   insert sale + line items
//!   per product: decrement_stock (guarded) + ledger `out`
//!   credit loyalty points
//! COMMIT
//! ```
//!
//! Because the first statement writes, no other writer can change stock
//! between the sufficiency check and the decrement. The guarded decrement
//! is the last line of defence: if it ever writes nothing, the whole sale
//! is rolled back with `InsufficientStock`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{retry, SaleSettings, ServiceResult};
use crate::repository::{customer, generate_id, ledger, product, sale, user};
use tienda_core::sale::{
    cancellation_note, check_status_transition, format_invoice_number, invoice_day_key,
};
use tienda_core::validation::{validate_notes, validate_reason};
use tienda_core::{
    pricing, CoreError, CustomerSummary, NewLedgerEntry, NewSale, PricedLine, Sale, SaleDetails,
    SaleLineItem, SaleStatus, SaleTotals, REVERSE_LOYALTY_ON_CANCEL,
};

/// Stock given back to one product by a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredStock {
    pub product_id: String,
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
}

/// Result of CancelSale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledSale {
    pub sale_id: String,
    pub invoice_number: String,
    pub status: SaleStatus,
    pub cancelled_at: chrono::DateTime<Utc>,
    pub restored: Vec<RestoredStock>,
    /// Points earned by the sale that stay on the customer's balance.
    pub loyalty_points_retained: i64,
}

/// Fields UpdateSale may change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleUpdate {
    pub status: Option<SaleStatus>,
    /// `Some("")` clears the notes.
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SaleService {
    pool: SqlitePool,
    settings: SaleSettings,
}

impl SaleService {
    pub fn new(pool: SqlitePool, settings: SaleSettings) -> Self {
        SaleService { pool, settings }
    }

    pub fn settings(&self) -> SaleSettings {
        self.settings
    }

    // =========================================================================
    // CreateSale
    // =========================================================================

    /// Creates a completed sale, decrementing stock and crediting loyalty
    /// points in the same transaction.
    pub async fn create_sale(&self, request: &NewSale) -> ServiceResult<SaleDetails> {
        request.validate()?;
        retry(self.settings.max_retries, "create_sale", move || {
            self.create_sale_once(request)
        })
        .await
    }

    async fn create_sale_once(&self, request: &NewSale) -> ServiceResult<SaleDetails> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let today = now.date_naive();
        let sequence = sale::next_invoice_sequence(&mut tx, &invoice_day_key(today)).await?;
        let invoice_number = format_invoice_number(today, sequence);

        let operator = user::fetch(&mut tx, &request.user_id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(request.user_id.clone()))?;

        let customer = match &request.customer_id {
            Some(customer_id) => Some(
                customer::fetch(&mut tx, customer_id)
                    .await?
                    .ok_or_else(|| CoreError::CustomerNotFound(customer_id.clone()))?,
            ),
            None => None,
        };

        // Resolve each distinct product once and check its summed quantity.
        let quantities = request.quantities_by_product();
        let mut products = Vec::with_capacity(quantities.len());
        for (product_id, quantity) in &quantities {
            let found = product::fetch(&mut tx, product_id)
                .await?
                .filter(|p| p.is_active())
                .ok_or_else(|| CoreError::ProductNotFound(product_id.clone()))?;
            if found.stock < *quantity {
                return Err(CoreError::InsufficientStock {
                    product_id: found.id.clone(),
                    name: found.name.clone(),
                    available: found.stock,
                    requested: *quantity,
                }
                .into());
            }
            products.push(found);
        }

        let lines: Vec<PricedLine> = request
            .items
            .iter()
            .filter_map(|item| {
                products.iter().find(|p| p.id == item.product_id).map(|p| PricedLine {
                    product_id: p.id.clone(),
                    product_name: p.name.clone(),
                    quantity: item.quantity,
                    unit_price: pricing::compute_sale_price(p),
                })
            })
            .collect();

        let totals = SaleTotals::compute(&lines, request.discount, request.tax)?;
        let points = match &customer {
            Some(_) => self.settings.loyalty_rate.points_for(totals.total),
            None => 0,
        };

        let header = Sale {
            id: generate_id(),
            invoice_number,
            customer_id: request.customer_id.clone(),
            user_id: operator.id.clone(),
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            tax_cents: totals.tax.cents(),
            total_cents: totals.total.cents(),
            payment_method: request.payment_method,
            status: SaleStatus::Completed,
            notes: request
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            loyalty_points_earned: points,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        };
        sale::insert_sale(&mut tx, &header).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = SaleLineItem {
                id: generate_id(),
                sale_id: header.id.clone(),
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                line_total_cents: line.line_total().cents(),
                created_at: now,
            };
            sale::insert_line_item(&mut tx, &item).await?;
            items.push(item);
        }

        for (found, (product_id, quantity)) in products.iter().zip(&quantities) {
            let new_stock = product::decrement_stock(&mut tx, product_id, *quantity, now)
                .await?
                .ok_or_else(|| CoreError::InsufficientStock {
                    product_id: product_id.clone(),
                    name: found.name.clone(),
                    available: found.stock,
                    requested: *quantity,
                })?;

            let entry = NewLedgerEntry::sale(
                product_id,
                new_stock + quantity,
                *quantity,
                &header.invoice_number,
                &header.id,
                &operator.id,
            );
            entry.validate()?;
            ledger::append(&mut tx, &entry, now).await?;
        }

        let customer_summary = match customer {
            Some(mut c) => {
                if points > 0 {
                    if let Some(balance) =
                        customer::add_loyalty_points(&mut tx, &c.id, points, now).await?
                    {
                        c.loyalty_points = balance;
                    }
                }
                Some(c.summary())
            }
            None => None,
        };

        tx.commit().await?;

        info!(
            sale_id = %header.id,
            invoice = %header.invoice_number,
            total = %header.total(),
            items = items.len(),
            loyalty_points = points,
            "Sale created"
        );

        Ok(SaleDetails {
            sale: header,
            items,
            customer: customer_summary,
            operator: operator.summary(),
        })
    }

    // =========================================================================
    // CancelSale
    // =========================================================================

    /// Cancels a sale and puts every sold unit back on the shelf.
    ///
    /// Loyalty points earned by the sale are kept.
    pub async fn cancel_sale(
        &self,
        sale_id: &str,
        reason: &str,
        user_id: &str,
    ) -> ServiceResult<CancelledSale> {
        let reason = validate_reason(reason)?;
        retry(self.settings.max_retries, "cancel_sale", move || {
            self.cancel_sale_once(sale_id, reason, user_id)
        })
        .await
    }

    async fn cancel_sale_once(
        &self,
        sale_id: &str,
        reason: &str,
        user_id: &str,
    ) -> ServiceResult<CancelledSale> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if !sale::mark_cancelled(&mut tx, sale_id, now).await? {
            return Err(match sale::fetch_sale(&mut tx, sale_id).await? {
                Some(existing) => CoreError::AlreadyCancelled {
                    sale_id: existing.id,
                    invoice_number: existing.invoice_number,
                },
                None => CoreError::SaleNotFound(sale_id.to_string()),
            }
            .into());
        }

        let cancelled = sale::fetch_sale(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        let operator = user::fetch(&mut tx, user_id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))?;

        let items = sale::fetch_line_items(&mut tx, sale_id).await?;
        let mut quantities: Vec<(String, i64)> = Vec::new();
        for item in &items {
            match quantities.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, qty)) => *qty += item.quantity,
                None => quantities.push((item.product_id.clone(), item.quantity)),
            }
        }

        let mut restored = Vec::with_capacity(quantities.len());
        for (product_id, quantity) in quantities {
            let new_stock = product::increment_stock(&mut tx, &product_id, quantity, now)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(product_id.clone()))?;

            let entry = NewLedgerEntry::cancellation(
                &product_id,
                new_stock - quantity,
                quantity,
                &cancelled.invoice_number,
                reason,
                &cancelled.id,
                &operator.id,
            );
            entry.validate()?;
            ledger::append(&mut tx, &entry, now).await?;

            restored.push(RestoredStock {
                product_id,
                quantity,
                previous_stock: entry.previous_stock,
                new_stock,
            });
        }

        let notes = cancellation_note(cancelled.notes.as_deref(), reason);
        sale::set_notes(&mut tx, sale_id, Some(&notes), now).await?;

        tx.commit().await?;

        info!(
            sale_id = %cancelled.id,
            invoice = %cancelled.invoice_number,
            products = restored.len(),
            reason,
            "Sale cancelled"
        );

        Ok(CancelledSale {
            sale_id: cancelled.id,
            invoice_number: cancelled.invoice_number,
            status: SaleStatus::Cancelled,
            cancelled_at: cancelled.cancelled_at.unwrap_or(now),
            restored,
            loyalty_points_retained: if REVERSE_LOYALTY_ON_CANCEL {
                0
            } else {
                cancelled.loyalty_points_earned
            },
        })
    }

    // =========================================================================
    // UpdateSale
    // =========================================================================

    /// Replaces notes and/or swaps between `pending` and `completed`.
    ///
    /// Never touches stock; cancellation goes through [`Self::cancel_sale`].
    pub async fn update_sale(&self, sale_id: &str, update: &SaleUpdate) -> ServiceResult<Sale> {
        if let Some(notes) = &update.notes {
            validate_notes(notes)?;
        }
        retry(self.settings.max_retries, "update_sale", move || {
            self.update_sale_once(sale_id, update)
        })
        .await
    }

    async fn update_sale_once(&self, sale_id: &str, update: &SaleUpdate) -> ServiceResult<Sale> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if !sale::touch(&mut tx, sale_id, now).await? {
            return Err(CoreError::SaleNotFound(sale_id.to_string()).into());
        }
        let current = sale::fetch_sale(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        if let Some(status) = update.status {
            check_status_transition(sale_id, current.status, status)?;
            if status != current.status {
                sale::set_status(&mut tx, sale_id, status, now).await?;
            }
        }
        if let Some(notes) = &update.notes {
            let notes = notes.trim();
            let notes = if notes.is_empty() { None } else { Some(notes) };
            sale::set_notes(&mut tx, sale_id, notes, now).await?;
        }

        let updated = sale::fetch_sale(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        tx.commit().await?;

        debug!(sale_id, status = %updated.status, "Sale updated");
        Ok(updated)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// GetSale: header, line items and resolved relations.
    pub async fn get_sale(&self, sale_id: &str) -> ServiceResult<SaleDetails> {
        let mut conn = self.pool.acquire().await?;
        let header = sale::fetch_sale(&mut conn, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        compose(&mut conn, header).await
    }

    pub async fn get_sale_by_invoice(&self, invoice_number: &str) -> ServiceResult<SaleDetails> {
        let mut conn = self.pool.acquire().await?;
        let header = sale::fetch_by_invoice(&mut conn, invoice_number.trim())
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(invoice_number.to_string()))?;
        compose(&mut conn, header).await
    }
}

async fn compose(conn: &mut SqliteConnection, header: Sale) -> ServiceResult<SaleDetails> {
    let items = sale::fetch_line_items(&mut *conn, &header.id).await?;
    let customer: Option<CustomerSummary> = match &header.customer_id {
        Some(id) => customer::fetch(&mut *conn, id).await?.map(|c| c.summary()),
        None => None,
    };
    let operator = user::fetch(&mut *conn, &header.user_id)
        .await?
        .ok_or_else(|| CoreError::UserNotFound(header.user_id.clone()))?;

    Ok(SaleDetails {
        sale: header,
        items,
        customer,
        operator: operator.summary(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
