//! # Loyalty Service
//!
//! Points are credited by CreateSale; this service spends them.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use super::{retry, ServiceResult};
use crate::repository::customer;
use tienda_core::validation::validate_stock_quantity;
use tienda_core::CoreError;

#[derive(Debug, Clone)]
pub struct LoyaltyService {
    pool: SqlitePool,
    max_retries: u32,
}

impl LoyaltyService {
    pub fn new(pool: SqlitePool, max_retries: u32) -> Self {
        LoyaltyService { pool, max_retries }
    }

    /// Spends `points` from the customer's balance and returns what's left.
    ///
    /// ## Errors
    /// - [`CoreError::CustomerNotFound`] for an unknown customer
    /// - [`CoreError::InsufficientLoyaltyPoints`] if the balance is short
    pub async fn redeem_points(&self, customer_id: &str, points: i64) -> ServiceResult<i64> {
        validate_stock_quantity(points).map_err(|_| CoreError::InvalidAmount {
            reason: format!("cannot redeem {} points", points),
        })?;
        retry(self.max_retries, "redeem_points", move || {
            self.redeem_points_once(customer_id, points)
        })
        .await
    }

    async fn redeem_points_once(&self, customer_id: &str, points: i64) -> ServiceResult<i64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let Some(balance) = customer::deduct_loyalty_points(&mut tx, customer_id, points, now).await?
        else {
            let current = customer::fetch(&mut tx, customer_id)
                .await?
                .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;
            return Err(CoreError::InsufficientLoyaltyPoints {
                balance: current.loyalty_points,
                requested: points,
            }
            .into());
        };

        tx.commit().await?;
        info!(customer_id, points, balance, "Loyalty points redeemed");
        Ok(balance)
    }

    /// Current balance.
    pub async fn balance(&self, customer_id: &str) -> ServiceResult<i64> {
        let mut conn = self.pool.acquire().await?;
        let current = customer::fetch(&mut conn, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;
        Ok(current.loyalty_points)
    }
}
