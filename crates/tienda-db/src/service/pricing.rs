//! # Pricing Service
//!
//! Persists Pricing Engine decisions. Each product change is one
//! transaction that starts with `product::touch`, so the row read next is
//! the row that gets written.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::{retry, ServiceResult};
use crate::repository::{category, cost_history, generate_id, product, user};
use tienda_core::pricing::{self, MarginUpdate, ProfitAnalysis};
use tienda_core::validation::validate_limit;
use tienda_core::{CoreError, CostHistoryEntry, Money, Product, DEFAULT_TOP_PROFITABLE};

#[derive(Debug, Clone)]
pub struct PricingService {
    pool: SqlitePool,
    max_retries: u32,
}

impl PricingService {
    pub fn new(pool: SqlitePool, max_retries: u32) -> Self {
        PricingService { pool, max_retries }
    }

    /// RecalculatePrice: applies a new cost and/or margin.
    ///
    /// A cost change is recorded in `cost_history` in the same transaction.
    pub async fn recalculate_price(
        &self,
        product_id: &str,
        cost: Option<Money>,
        margin_bps: Option<i64>,
        changed_by: Option<&str>,
        reason: Option<&str>,
    ) -> ServiceResult<Product> {
        if let Some(cost) = cost {
            if cost.is_negative() {
                return Err(CoreError::InvalidAmount {
                    reason: format!("cost price {} is negative", cost),
                }
                .into());
            }
        }
        retry(self.max_retries, "recalculate_price", move || {
            self.recalculate_price_once(product_id, cost, margin_bps, changed_by, reason)
        })
        .await
    }

    async fn recalculate_price_once(
        &self,
        product_id: &str,
        cost: Option<Money>,
        margin_bps: Option<i64>,
        changed_by: Option<&str>,
        reason: Option<&str>,
    ) -> ServiceResult<Product> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if !product::touch(&mut tx, product_id, now).await? {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }
        let mut current = product::fetch(&mut tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        if let Some(changed_by) = changed_by {
            if user::fetch(&mut tx, changed_by).await?.is_none() {
                return Err(CoreError::UserNotFound(changed_by.to_string()).into());
            }
        }

        let change = pricing::apply_pricing(&mut current, cost, margin_bps)?;
        product::save_pricing(&mut tx, &current, now).await?;

        if change.cost_changed() {
            let entry = CostHistoryEntry {
                id: generate_id(),
                product_id: current.id.clone(),
                old_cost_cents: change.old_cost.cents(),
                new_cost_cents: change.new_cost.cents(),
                old_price_cents: change.old_price.cents(),
                new_price_cents: change.new_price.cents(),
                reason: reason.map(str::trim).filter(|r| !r.is_empty()).map(str::to_string),
                changed_by: changed_by.map(str::to_string),
                created_at: now,
            };
            cost_history::append(&mut tx, &entry).await?;
        }

        tx.commit().await?;
        current.updated_at = now;

        info!(
            product_id = %current.id,
            old_cost = %change.old_cost,
            new_cost = %change.new_cost,
            margin_bps = current.profit_margin_bps,
            price = %change.new_price,
            "Price recalculated"
        );
        Ok(current)
    }

    /// SetManualPrice: pins `price` as the effective price.
    pub async fn set_manual_price(&self, product_id: &str, price: Money) -> ServiceResult<Product> {
        if price.is_negative() {
            return Err(CoreError::InvalidPrice {
                cents: price.cents(),
            }
            .into());
        }
        retry(self.max_retries, "set_manual_price", move || {
            self.update_product(product_id, move |p| pricing::set_manual_price(p, price))
        })
        .await
    }

    /// UseCalculatedPrice: drops the override.
    pub async fn use_calculated_price(&self, product_id: &str) -> ServiceResult<Product> {
        retry(self.max_retries, "use_calculated_price", move || {
            self.update_product(product_id, |p| {
                pricing::revert_to_calculated_price(p);
                Ok(())
            })
        })
        .await
    }

    async fn update_product<F>(&self, product_id: &str, apply: F) -> ServiceResult<Product>
    where
        F: FnOnce(&mut Product) -> tienda_core::CoreResult<()>,
    {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if !product::touch(&mut tx, product_id, now).await? {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }
        let mut current = product::fetch(&mut tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        apply(&mut current)?;
        product::save_pricing(&mut tx, &current, now).await?;
        tx.commit().await?;
        current.updated_at = now;

        debug!(
            product_id = %current.id,
            manual = current.using_manual_price,
            price = %pricing::compute_sale_price(&current),
            "Price source updated"
        );
        Ok(current)
    }

    /// BulkUpdateMargins: returns how many products changed.
    ///
    /// Products whose resulting margin is invalid are skipped, not failed.
    pub async fn bulk_update_margins(
        &self,
        category_id: Option<&str>,
        update: MarginUpdate,
    ) -> ServiceResult<u64> {
        retry(self.max_retries, "bulk_update_margins", move || {
            self.bulk_update_margins_once(category_id, update)
        })
        .await
    }

    async fn bulk_update_margins_once(
        &self,
        category_id: Option<&str>,
        update: MarginUpdate,
    ) -> ServiceResult<u64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let products = product::list_active(&mut tx, category_id).await?;
        if let Some(category_id) = category_id {
            if products.is_empty() && !category::exists(&mut tx, category_id).await? {
                return Err(CoreError::Validation(tienda_core::ValidationError::InvalidFormat {
                    field: "category_id".to_string(),
                    reason: format!("unknown category {}", category_id),
                })
                .into());
            }
        }

        let mut updated: u64 = 0;
        for mut current in products {
            let target = match update.target_for(current.profit_margin_bps) {
                Ok(target) => target,
                Err(err) => {
                    warn!(product_id = %current.id, error = %err, "Skipping margin update");
                    continue;
                }
            };
            if let Err(err) = pricing::apply_pricing(&mut current, None, Some(target.bps() as i64)) {
                warn!(product_id = %current.id, error = %err, "Skipping margin update");
                continue;
            }
            product::save_pricing(&mut tx, &current, now).await?;
            updated += 1;
        }

        tx.commit().await?;
        info!(category = ?category_id, ?update, updated, "Margins updated");
        Ok(updated)
    }

    /// ProfitAnalysis over the active catalog.
    pub async fn profit_analysis(&self) -> ServiceResult<ProfitAnalysis> {
        let mut conn = self.pool.acquire().await?;
        let products = product::list_active(&mut conn, None).await?;
        Ok(pricing::analyze_profit(&products, DEFAULT_TOP_PROFITABLE))
    }

    /// Cost changes for one product, newest first.
    pub async fn cost_history(&self, product_id: &str, limit: u32) -> ServiceResult<Vec<CostHistoryEntry>> {
        validate_limit(limit)?;
        let entries = cost_history::CostHistoryRepository::new(self.pool.clone())
            .list_for_product(product_id, limit)
            .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tienda_core::{ErrorKind, NewProduct, UserRole};

    async fn add_product(db: &Database, category_id: Option<&str>, cost: i64, margin: i64) -> Product {
        let product = NewProduct {
            category_id: category_id.map(str::to_string),
            sku: None,
            name: format!("Producto {}", cost),
            description: None,
            cost_price_cents: cost,
            profit_margin_bps: margin,
            manual_price_cents: None,
            stock: 5,
            min_stock: 0,
        }
        .build(Utc::now())
        .unwrap();
        db.products().insert(&product).await.unwrap();
        product
    }

    #[tokio::test]
    async fn test_recalculate_records_cost_history() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = add_product(&db, None, 7000, 3000).await;
        let admin = db.users().create("admin", "Admin", UserRole::Admin).await.unwrap();
        let service = db.pricing_service(3);

        let updated = service
            .recalculate_price(
                &product.id,
                Some(Money::from_cents(8400)),
                None,
                Some(&admin.id),
                Some("supplier"),
            )
            .await
            .unwrap();
        assert_eq!(updated.calculated_price_cents, 12000);

        let history = service.cost_history(&product.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_cost_cents, 7000);
        assert_eq!(history[0].new_cost_cents, 8400);
        assert_eq!(history[0].old_price_cents, 10000);
        assert_eq!(history[0].new_price_cents, 12000);
        assert_eq!(history[0].changed_by.as_deref(), Some(admin.id.as_str()));

        // margin-only change leaves no cost history
        service
            .recalculate_price(&product.id, None, Some(5000), None, None)
            .await
            .unwrap();
        assert_eq!(service.cost_history(&product.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recalculate_rejects_full_margin() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = add_product(&db, None, 7000, 3000).await;
        let service = db.pricing_service(3);

        let err = service
            .recalculate_price(&product.id, None, Some(10000), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::InvalidMargin { bps: 10000 })));

        let unchanged = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(unchanged.profit_margin_bps, 3000);

        let missing = service
            .recalculate_price("missing", None, Some(1000), None, None)
            .await
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_manual_price_override() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = add_product(&db, None, 7000, 3000).await;
        let service = db.pricing_service(3);

        let pinned = service
            .set_manual_price(&product.id, Money::from_cents(9500))
            .await
            .unwrap();
        assert!(pinned.using_manual_price);
        assert_eq!(pricing::compute_sale_price(&pinned).cents(), 9500);

        let err = service
            .set_manual_price(&product.id, Money::from_cents(-1))
            .await
            .unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::InvalidPrice { cents: -1 })));

        let reverted = service.use_calculated_price(&product.id).await.unwrap();
        assert!(!reverted.using_manual_price);
        assert_eq!(reverted.manual_price_cents, None);
        assert_eq!(pricing::compute_sale_price(&reverted).cents(), 10000);
    }

    #[tokio::test]
    async fn test_bulk_update_skips_invalid_entries() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let bebidas = db.categories().create("Bebidas", None).await.unwrap();
        let a = add_product(&db, Some(&bebidas.id), 7000, 3000).await;
        let b = add_product(&db, Some(&bebidas.id), 5000, 9500).await;
        let other = add_product(&db, None, 1000, 1000).await;
        let service = db.pricing_service(3);

        let updated = service
            .bulk_update_margins(Some(&bebidas.id), MarginUpdate::Increase(1000))
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let a = db.products().get_by_id(&a.id).await.unwrap().unwrap();
        let b = db.products().get_by_id(&b.id).await.unwrap().unwrap();
        let other = db.products().get_by_id(&other.id).await.unwrap().unwrap();
        assert_eq!(a.profit_margin_bps, 4000);
        assert_eq!(b.profit_margin_bps, 9500);
        assert_eq!(other.profit_margin_bps, 1000);

        let all = service.bulk_update_margins(None, MarginUpdate::Set(2500)).await.unwrap();
        assert_eq!(all, 3);

        let err = service
            .bulk_update_margins(Some("missing"), MarginUpdate::Set(2500))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_profit_analysis() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        add_product(&db, None, 7000, 3000).await;
        add_product(&db, None, 9000, 1000).await;
        let service = db.pricing_service(3);

        let analysis = service.profit_analysis().await.unwrap();
        assert_eq!(analysis.product_count, 2);
        // 5 × 3000 + 5 × 1000
        assert_eq!(analysis.total_profit_value.cents(), 20000);
        assert_eq!(analysis.low_margin_products.len(), 1);
        assert_eq!(analysis.top_profitable_products.len(), 2);
    }
}
