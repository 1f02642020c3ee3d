//! # Customer Repository
//!
//! Customer rows and their loyalty balance. Balance changes are single
//! guarded statements so they compose into a sale's transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use super::generate_id;
use crate::error::DbResult;
use tienda_core::Customer;

const CUSTOMER_COLUMNS: &str = "id, name, email, phone, loyalty_points, credit_balance_cents, \
     is_active, created_at, updated_at";

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
    let sql = format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLUMNS);
    let customer = sqlx::query_as::<_, Customer>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(customer)
}

/// Credits loyalty points. Returns the new balance, `None` if missing.
pub(crate) async fn add_loyalty_points(
    conn: &mut SqliteConnection,
    id: &str,
    points: i64,
    now: DateTime<Utc>,
) -> DbResult<Option<i64>> {
    let balance = sqlx::query_scalar(
        r#"
        UPDATE customers
        SET loyalty_points = loyalty_points + ?2, updated_at = ?3
        WHERE id = ?1
        RETURNING loyalty_points
        "#,
    )
    .bind(id)
    .bind(points)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(balance)
}

/// Debits loyalty points if the balance covers them.
///
/// Returns the new balance, or `None` when nothing was written.
pub(crate) async fn deduct_loyalty_points(
    conn: &mut SqliteConnection,
    id: &str,
    points: i64,
    now: DateTime<Utc>,
) -> DbResult<Option<i64>> {
    let balance = sqlx::query_scalar(
        r#"
        UPDATE customers
        SET loyalty_points = loyalty_points - ?2, updated_at = ?3
        WHERE id = ?1 AND loyalty_points >= ?2
        RETURNING loyalty_points
        "#,
    )
    .bind(id)
    .bind(points)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(balance)
}

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Registers a customer with an empty loyalty account.
    pub async fn create(
        &self,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> DbResult<Customer> {
        let now = Utc::now();
        let customer = Customer {
            id: generate_id(),
            name: name.trim().to_string(),
            email: email.map(|e| e.trim().to_lowercase()),
            phone: phone.map(str::to_string),
            loyalty_points: 0,
            credit_balance_cents: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, email, phone, loyalty_points, credit_balance_cents,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.loyalty_points)
        .bind(customer.credit_balance_cents)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Current points balance, or `None` for an unknown customer.
    pub async fn loyalty_points(&self, id: &str) -> DbResult<Option<i64>> {
        let points = sqlx::query_scalar("SELECT loyalty_points FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(points)
    }
}
