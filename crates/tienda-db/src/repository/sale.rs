//! # Sale Repository
//!
//! Database operations for sales, their line items and invoice numbering.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CreateSale (one transaction)                                          │
//! │    next_invoice_sequence ──► insert_sale ──► insert_line_item × N      │
//! │       status = completed                                               │
//! │                                                                         │
//! │  CancelSale (one transaction)                                          │
//! │    mark_cancelled ──► set_notes                                        │
//! │       status = cancelled, cancelled_at set, row kept forever           │
//! │                                                                         │
//! │  Line items are written once and never updated (schema triggers).     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use tienda_core::{Sale, SaleLineItem, SaleStatus};

const SALE_COLUMNS: &str = "id, invoice_number, customer_id, user_id, subtotal_cents, \
     discount_cents, tax_cents, total_cents, payment_method, status, notes, \
     loyalty_points_earned, created_at, updated_at, cancelled_at";

const LINE_ITEM_COLUMNS: &str = "id, sale_id, product_id, product_name, quantity, \
     unit_price_cents, line_total_cents, created_at";

// =============================================================================
// Connection-level operations (usable inside a transaction)
// =============================================================================

/// Claims the next invoice sequence number for `day` (`YYYYMMDD`).
///
/// A single upsert, so it also acquires the write lock when it is the
/// first statement of a transaction.
pub(crate) async fn next_invoice_sequence(conn: &mut SqliteConnection, day: &str) -> DbResult<i64> {
    let value = sqlx::query_scalar(
        r#"
        INSERT INTO invoice_sequences (day, last_value) VALUES (?1, 1)
        ON CONFLICT(day) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(day)
    .fetch_one(&mut *conn)
    .await?;
    Ok(value)
}

pub(crate) async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, invoice_number, customer_id, user_id, subtotal_cents,
            discount_cents, tax_cents, total_cents, payment_method, status,
            notes, loyalty_points_earned, created_at, updated_at, cancelled_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.invoice_number)
    .bind(&sale.customer_id)
    .bind(&sale.user_id)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_cents)
    .bind(sale.tax_cents)
    .bind(sale.total_cents)
    .bind(sale.payment_method)
    .bind(sale.status)
    .bind(&sale.notes)
    .bind(sale.loyalty_points_earned)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .bind(sale.cancelled_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_line_item(
    conn: &mut SqliteConnection,
    item: &SaleLineItem,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_line_items (
            id, sale_id, product_id, product_name, quantity,
            unit_price_cents, line_total_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.product_name)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.line_total_cents)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn fetch_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(sale)
}

pub(crate) async fn fetch_by_invoice(
    conn: &mut SqliteConnection,
    invoice_number: &str,
) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {} FROM sales WHERE invoice_number = ?1", SALE_COLUMNS);
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(invoice_number)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(sale)
}

/// Line items in the order they were written.
pub(crate) async fn fetch_line_items(
    conn: &mut SqliteConnection,
    sale_id: &str,
) -> DbResult<Vec<SaleLineItem>> {
    let sql = format!(
        "SELECT {} FROM sale_line_items WHERE sale_id = ?1 ORDER BY rowid",
        LINE_ITEM_COLUMNS
    );
    let items = sqlx::query_as::<_, SaleLineItem>(&sql)
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(items)
}

/// Flips a non-cancelled sale to cancelled.
///
/// Returns false when the sale is missing or already cancelled; the guard
/// is in the WHERE clause so two cancellations can't both succeed.
pub(crate) async fn mark_cancelled(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE sales
        SET status = ?2, cancelled_at = ?3, updated_at = ?3
        WHERE id = ?1 AND status <> ?2
        "#,
    )
    .bind(id)
    .bind(SaleStatus::Cancelled)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Bumps `updated_at`. Returns false if the sale doesn't exist.
pub(crate) async fn touch(conn: &mut SqliteConnection, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
    let result = sqlx::query("UPDATE sales SET updated_at = ?2 WHERE id = ?1")
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn set_notes(
    conn: &mut SqliteConnection,
    id: &str,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE sales SET notes = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(notes)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: SaleStatus,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE sales SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Read-side repository for sales. Writes go through `SaleService`.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sale(&mut conn, id).await
    }

    pub async fn get_by_invoice(&self, invoice_number: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_invoice(&mut conn, invoice_number).await
    }

    pub async fn get_line_items(&self, sale_id: &str) -> DbResult<Vec<SaleLineItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_line_items(&mut conn, sale_id).await
    }

    /// Most recent sales first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {} FROM sales ORDER BY rowid DESC LIMIT ?1",
            SALE_COLUMNS
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(sales)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_line_items(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM sale_line_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_invoice_sequence_per_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        assert_eq!(next_invoice_sequence(&mut conn, "20261014").await.unwrap(), 1);
        assert_eq!(next_invoice_sequence(&mut conn, "20261014").await.unwrap(), 2);
        assert_eq!(next_invoice_sequence(&mut conn, "20261015").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invoice_sequence_rolls_back_with_transaction() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut tx = db.pool().begin().await.unwrap();
            assert_eq!(next_invoice_sequence(&mut tx, "20261014").await.unwrap(), 1);
            // dropped without commit
        }

        let mut conn = db.pool().acquire().await.unwrap();
        assert_eq!(next_invoice_sequence(&mut conn, "20261014").await.unwrap(), 1);
    }
}
