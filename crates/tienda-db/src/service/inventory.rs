//! # Inventory Service
//!
//! Stock movements outside of sales: receiving goods, counted adjustments
//! and direct ledger records. Each one moves the product's stock and
//! appends its ledger entry in a single transaction.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use super::{retry, ServiceResult};
use crate::repository::ledger::LedgerRepository;
use crate::repository::{ledger, product, user};
use tienda_core::validation::{
    validate_limit, validate_reason, validate_required_id, validate_stock_level,
    validate_stock_quantity,
};
use tienda_core::{CoreError, LedgerEntry, MovementType, NewLedgerEntry, StockSummary};

#[derive(Debug, Clone)]
pub struct InventoryService {
    pool: SqlitePool,
    max_retries: u32,
}

impl InventoryService {
    pub fn new(pool: SqlitePool, max_retries: u32) -> Self {
        InventoryService { pool, max_retries }
    }

    fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    /// Records a movement whose snapshots the caller computed.
    ///
    /// The entry's `previous_stock` must match the product's current stock;
    /// the product is moved to `new_stock`.
    pub async fn record(&self, entry: &NewLedgerEntry) -> ServiceResult<LedgerEntry> {
        entry.validate()?;
        validate_required_id("user_id", &entry.user_id)?;
        validate_reason(&entry.reason)?;
        retry(self.max_retries, "record_movement", move || self.record_once(entry)).await
    }

    async fn record_once(&self, entry: &NewLedgerEntry) -> ServiceResult<LedgerEntry> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if !product::touch(&mut tx, &entry.product_id, now).await? {
            return Err(CoreError::ProductNotFound(entry.product_id.clone()).into());
        }
        let current = product::fetch(&mut tx, &entry.product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(entry.product_id.clone()))?;
        ensure_operator(&mut tx, &entry.user_id).await?;

        if current.stock != entry.previous_stock {
            return Err(CoreError::InvalidStockSnapshot {
                movement: entry.movement_type.to_string(),
                previous: entry.previous_stock,
                new: entry.new_stock,
                quantity: entry.quantity,
            }
            .into());
        }

        product::set_stock(&mut tx, &entry.product_id, entry.new_stock, now).await?;
        let recorded = ledger::append(&mut tx, entry, now).await?;
        tx.commit().await?;

        info!(
            product_id = %recorded.product_id,
            movement = %recorded.movement_type,
            quantity = recorded.quantity,
            stock = recorded.new_stock,
            "Stock movement recorded"
        );
        Ok(recorded)
    }

    /// Adds received units (ledger `in`).
    pub async fn receive_stock(
        &self,
        product_id: &str,
        quantity: i64,
        reason: &str,
        user_id: &str,
    ) -> ServiceResult<LedgerEntry> {
        validate_stock_quantity(quantity)?;
        let reason = validate_reason(reason)?;
        validate_required_id("user_id", user_id)?;
        retry(self.max_retries, "receive_stock", move || {
            self.receive_stock_once(product_id, quantity, reason, user_id)
        })
        .await
    }

    async fn receive_stock_once(
        &self,
        product_id: &str,
        quantity: i64,
        reason: &str,
        user_id: &str,
    ) -> ServiceResult<LedgerEntry> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let new_stock = product::increment_stock(&mut tx, product_id, quantity, now)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        ensure_operator(&mut tx, user_id).await?;

        let entry = NewLedgerEntry {
            product_id: product_id.to_string(),
            movement_type: MovementType::In,
            quantity,
            previous_stock: new_stock - quantity,
            new_stock,
            reason: reason.to_string(),
            reference_id: None,
            user_id: user_id.to_string(),
        };
        entry.validate()?;
        let recorded = ledger::append(&mut tx, &entry, now).await?;
        tx.commit().await?;

        info!(product_id, quantity, stock = new_stock, "Stock received");
        Ok(recorded)
    }

    /// Sets stock to a physical count (ledger `adjustment`).
    ///
    /// Returns `None` when the count matches and nothing was recorded.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        counted_stock: i64,
        reason: &str,
        user_id: &str,
    ) -> ServiceResult<Option<LedgerEntry>> {
        validate_stock_level(counted_stock)?;
        let reason = validate_reason(reason)?;
        validate_required_id("user_id", user_id)?;
        retry(self.max_retries, "adjust_stock", move || {
            self.adjust_stock_once(product_id, counted_stock, reason, user_id)
        })
        .await
    }

    async fn adjust_stock_once(
        &self,
        product_id: &str,
        counted_stock: i64,
        reason: &str,
        user_id: &str,
    ) -> ServiceResult<Option<LedgerEntry>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if !product::touch(&mut tx, product_id, now).await? {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }
        let current = product::fetch(&mut tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        ensure_operator(&mut tx, user_id).await?;

        let Some(entry) =
            NewLedgerEntry::adjustment(product_id, current.stock, counted_stock, reason, user_id)
        else {
            // unchanged count; the touch is rolled back with the transaction
            return Ok(None);
        };
        entry.validate()?;

        product::set_stock(&mut tx, product_id, counted_stock, now).await?;
        let recorded = ledger::append(&mut tx, &entry, now).await?;
        tx.commit().await?;

        info!(
            product_id,
            previous = recorded.previous_stock,
            counted = counted_stock,
            "Stock adjusted"
        );
        Ok(Some(recorded))
    }

    /// Newest entries for one product first.
    pub async fn history_for_product(&self, product_id: &str, limit: u32) -> ServiceResult<Vec<LedgerEntry>> {
        validate_limit(limit)?;
        Ok(self.ledger().history_for_product(product_id, limit).await?)
    }

    pub async fn stock_summary(&self, product_id: &str) -> ServiceResult<StockSummary> {
        Ok(self.ledger().stock_summary(product_id).await?)
    }

    /// Newest entries across the catalog.
    pub async fn recent(&self, limit: u32) -> ServiceResult<Vec<LedgerEntry>> {
        validate_limit(limit)?;
        Ok(self.ledger().recent(limit).await?)
    }

    /// Everything one sale did to stock, in order.
    pub async fn entries_for_reference(&self, reference_id: &str) -> ServiceResult<Vec<LedgerEntry>> {
        Ok(self.ledger().for_reference(reference_id).await?)
    }
}

async fn ensure_operator(conn: &mut sqlx::SqliteConnection, user_id: &str) -> ServiceResult<()> {
    match user::fetch(conn, user_id).await? {
        Some(_) => Ok(()),
        None => Err(CoreError::UserNotFound(user_id.to_string()).into()),
    }
}
