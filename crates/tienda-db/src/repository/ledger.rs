//! # Inventory Ledger Repository
//!
//! Append-only storage for stock movements. Entries are ordered by SQLite
//! `rowid`, which follows insertion order, so "newest first" and "replay
//! order" never depend on clock resolution.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::generate_id;
use crate::error::DbResult;
use tienda_core::{LedgerEntry, MovementType, NewLedgerEntry, StockSummary};

const LEDGER_COLUMNS: &str = "id, product_id, movement_type, quantity, previous_stock, \
     new_stock, reason, reference_id, user_id, created_at";

/// Appends one entry. The caller validates it first; the schema CHECK
/// rejects anything that slips through.
pub(crate) async fn append(
    conn: &mut SqliteConnection,
    entry: &NewLedgerEntry,
    now: DateTime<Utc>,
) -> DbResult<LedgerEntry> {
    let recorded = LedgerEntry {
        id: generate_id(),
        product_id: entry.product_id.clone(),
        movement_type: entry.movement_type,
        quantity: entry.quantity,
        previous_stock: entry.previous_stock,
        new_stock: entry.new_stock,
        reason: entry.reason.clone(),
        reference_id: entry.reference_id.clone(),
        user_id: entry.user_id.clone(),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO inventory_ledger (
            id, product_id, movement_type, quantity, previous_stock,
            new_stock, reason, reference_id, user_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&recorded.id)
    .bind(&recorded.product_id)
    .bind(recorded.movement_type)
    .bind(recorded.quantity)
    .bind(recorded.previous_stock)
    .bind(recorded.new_stock)
    .bind(&recorded.reason)
    .bind(&recorded.reference_id)
    .bind(&recorded.user_id)
    .bind(recorded.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %recorded.product_id,
        movement = %recorded.movement_type,
        quantity = recorded.quantity,
        previous = recorded.previous_stock,
        new = recorded.new_stock,
        "Ledger entry appended"
    );
    Ok(recorded)
}

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Newest entries for one product first.
    pub async fn history_for_product(&self, product_id: &str, limit: u32) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM inventory_ledger WHERE product_id = ?1 ORDER BY rowid DESC LIMIT ?2",
            LEDGER_COLUMNS
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(product_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Every entry for one product, oldest first (replay order).
    pub async fn all_for_product(&self, product_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM inventory_ledger WHERE product_id = ?1 ORDER BY rowid",
            LEDGER_COLUMNS
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Newest entries across all products.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM inventory_ledger ORDER BY rowid DESC LIMIT ?1",
            LEDGER_COLUMNS
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Entries caused by one sale (its `out` and any `in` reversals).
    pub async fn for_reference(&self, reference_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM inventory_ledger WHERE reference_id = ?1 ORDER BY rowid",
            LEDGER_COLUMNS
        );
        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(reference_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Totals moved in, out and by adjustment for one product.
    pub async fn stock_summary(&self, product_id: &str) -> DbResult<StockSummary> {
        let (total_in, total_out, net_adjustment, movement_count): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN movement_type = ?2 THEN quantity ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN movement_type = ?3 THEN quantity ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN movement_type = ?4 THEN new_stock - previous_stock ELSE 0 END), 0),
                    COUNT(*)
                FROM inventory_ledger
                WHERE product_id = ?1
                "#,
            )
            .bind(product_id)
            .bind(MovementType::In)
            .bind(MovementType::Out)
            .bind(MovementType::Adjustment)
            .fetch_one(&self.pool)
            .await?;

        Ok(StockSummary {
            product_id: product_id.to_string(),
            total_in,
            total_out,
            net_adjustment,
            movement_count,
        })
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_ledger")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
