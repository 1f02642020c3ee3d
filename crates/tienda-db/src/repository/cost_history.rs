//! # Cost History Repository
//!
//! One row per cost price change, written in the same transaction as the
//! price update it describes.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use tienda_core::CostHistoryEntry;

pub(crate) async fn append(conn: &mut SqliteConnection, entry: &CostHistoryEntry) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cost_history (
            id, product_id, old_cost_cents, new_cost_cents, old_price_cents,
            new_price_cents, reason, changed_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.product_id)
    .bind(entry.old_cost_cents)
    .bind(entry.new_cost_cents)
    .bind(entry.old_price_cents)
    .bind(entry.new_price_cents)
    .bind(&entry.reason)
    .bind(&entry.changed_by)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CostHistoryRepository {
    pool: SqlitePool,
}

impl CostHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CostHistoryRepository { pool }
    }

    /// Newest changes first.
    pub async fn list_for_product(&self, product_id: &str, limit: u32) -> DbResult<Vec<CostHistoryEntry>> {
        let entries = sqlx::query_as::<_, CostHistoryEntry>(
            r#"
            SELECT id, product_id, old_cost_cents, new_cost_cents, old_price_cents,
                   new_price_cents, reason, changed_by, created_at
            FROM cost_history
            WHERE product_id = ?1
            ORDER BY rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
