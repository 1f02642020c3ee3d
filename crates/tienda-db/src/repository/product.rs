//! # Product Repository
//!
//! Database operations for products: catalog reads, pricing writes and the
//! guarded stock updates used by sales.
//!
//! ## Guarded Stock Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE products SET stock = stock - :qty                              │
//! │  WHERE id = :id AND stock >= :qty                                      │
//! │  RETURNING stock                                                       │
//! │                                                                         │
//! │  row returned ──► new stock level, write applied                       │
//! │  no row       ──► nothing changed (missing product or not enough)      │
//! │                                                                         │
//! │  The condition and the write are one statement, so stock can never    │
//! │  be taken below zero by two sales racing on the same product.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tienda_core::{Product, ProductStatus};

const PRODUCT_COLUMNS: &str = "id, category_id, sku, name, description, cost_price_cents, \
     profit_margin_bps, calculated_price_cents, manual_price_cents, using_manual_price, \
     stock, min_stock, status, created_at, updated_at";

// =============================================================================
// Connection-level operations (usable inside a transaction)
// =============================================================================

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(product)
}

pub(crate) async fn insert(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO products (
            id, category_id, sku, name, description, cost_price_cents,
            profit_margin_bps, calculated_price_cents, manual_price_cents,
            using_manual_price, stock, min_stock, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&product.id)
    .bind(&product.category_id)
    .bind(&product.sku)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.cost_price_cents)
    .bind(product.profit_margin_bps)
    .bind(product.calculated_price_cents)
    .bind(product.manual_price_cents)
    .bind(product.using_manual_price)
    .bind(product.stock)
    .bind(product.min_stock)
    .bind(product.status)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Bumps `updated_at`. Returns false if the product doesn't exist.
///
/// Run first in a transaction, this takes SQLite's write lock before any
/// read, so the read-compute-write that follows sees no other writer.
pub(crate) async fn touch(
    conn: &mut SqliteConnection,
    id: &str,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query("UPDATE products SET updated_at = ?2 WHERE id = ?1")
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Takes `quantity` units if at least that many are on hand.
///
/// Returns the new stock level, or `None` if nothing was written.
pub(crate) async fn decrement_stock(
    conn: &mut SqliteConnection,
    id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<Option<i64>> {
    let stock: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET stock = stock - ?2, updated_at = ?3
        WHERE id = ?1 AND stock >= ?2
        RETURNING stock
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    debug!(product_id = %id, quantity, new_stock = ?stock, "Stock decrement");
    Ok(stock)
}

/// Adds `quantity` units. Returns the new level, or `None` if missing.
pub(crate) async fn increment_stock(
    conn: &mut SqliteConnection,
    id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<Option<i64>> {
    let stock: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET stock = stock + ?2, updated_at = ?3
        WHERE id = ?1
        RETURNING stock
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    debug!(product_id = %id, quantity, new_stock = ?stock, "Stock increment");
    Ok(stock)
}

/// Sets stock to an absolute level (counted adjustments).
pub(crate) async fn set_stock(
    conn: &mut SqliteConnection,
    id: &str,
    stock: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE products SET stock = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(stock)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Persists every pricing field of `product`.
pub(crate) async fn save_pricing(
    conn: &mut SqliteConnection,
    product: &Product,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE products
        SET cost_price_cents = ?2,
            profit_margin_bps = ?3,
            calculated_price_cents = ?4,
            manual_price_cents = ?5,
            using_manual_price = ?6,
            updated_at = ?7
        WHERE id = ?1
        "#,
    )
    .bind(&product.id)
    .bind(product.cost_price_cents)
    .bind(product.profit_margin_bps)
    .bind(product.calculated_price_cents)
    .bind(product.manual_price_cents)
    .bind(product.using_manual_price)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Active products, optionally limited to one category, ordered by id.
pub(crate) async fn list_active(
    conn: &mut SqliteConnection,
    category_id: Option<&str>,
) -> DbResult<Vec<Product>> {
    let products = match category_id {
        Some(category_id) => {
            let sql = format!(
                "SELECT {} FROM products WHERE status = ?1 AND category_id = ?2 ORDER BY id",
                PRODUCT_COLUMNS
            );
            sqlx::query_as::<_, Product>(&sql)
                .bind(ProductStatus::Active)
                .bind(category_id)
                .fetch_all(&mut *conn)
                .await?
        }
        None => {
            let sql = format!(
                "SELECT {} FROM products WHERE status = ?1 ORDER BY id",
                PRODUCT_COLUMNS
            );
            sqlx::query_as::<_, Product>(&sql)
                .bind(ProductStatus::Active)
                .fetch_all(&mut *conn)
                .await?
        }
    };
    Ok(products)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.get_by_id("uuid-here").await?;
/// let low = repo.list_low_stock().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product built by `NewProduct::build`.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, product).await?;
        debug!(product_id = %product.id, name = %product.name, "Product inserted");
        Ok(())
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Active products, optionally within one category.
    pub async fn list_active(&self, category_id: Option<&str>) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        list_active(&mut conn, category_id).await
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Active products at or below their minimum stock.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE status = ?1 AND stock <= min_stock ORDER BY stock, id",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(ProductStatus::Active)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Current stock, or `None` for an unknown product.
    pub async fn stock_of(&self, id: &str) -> DbResult<Option<i64>> {
        let stock = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(stock)
    }

    /// Changes catalog status (active / inactive / discontinued).
    pub async fn set_status(&self, id: &str, status: ProductStatus) -> DbResult<bool> {
        let result = sqlx::query("UPDATE products SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tienda_core::NewProduct;

    fn sample(stock: i64) -> Product {
        NewProduct {
            category_id: None,
            sku: Some("YERBA-1KG".to_string()),
            name: "Yerba Mate 1kg".to_string(),
            description: None,
            cost_price_cents: 7000,
            profit_margin_bps: 3000,
            manual_price_cents: None,
            stock,
            min_stock: 2,
        }
        .build(Utc::now())
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = sample(10);
        db.products().insert(&product).await.unwrap();

        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Yerba Mate 1kg");
        assert_eq!(loaded.calculated_price_cents, 10000);
        assert_eq!(loaded.status, ProductStatus::Active);
        assert!(!loaded.using_manual_price);

        assert!(db.products().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_guarded_decrement() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = sample(3);
        db.products().insert(&product).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();
        assert_eq!(decrement_stock(&mut conn, &product.id, 2, now).await.unwrap(), Some(1));
        assert_eq!(decrement_stock(&mut conn, &product.id, 2, now).await.unwrap(), None);
        assert_eq!(increment_stock(&mut conn, &product.id, 4, now).await.unwrap(), Some(5));
        assert_eq!(decrement_stock(&mut conn, "missing", 1, now).await.unwrap(), None);
        drop(conn);

        assert_eq!(db.products().stock_of(&product.id).await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_negative_stock_rejected_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = sample(1);
        db.products().insert(&product).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let err = set_stock(&mut conn, &product.id, -1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, crate::error::DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_low_stock_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut low = sample(1);
        low.sku = None;
        let ok = sample(10);
        db.products().insert(&low).await.unwrap();
        db.products().insert(&ok).await.unwrap();

        let listed = db.products().list_low_stock().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, low.id);
    }
}
