#![allow(dead_code)]

use chrono::Utc;
use tienda_core::{Money, NewProduct, NewSale, PaymentMethod, Product, SaleItemRequest, User, UserRole};
use tienda_db::{Database, DbConfig};

pub async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub async fn cashier(db: &Database) -> User {
    db.users()
        .create("cajero", "Cajero Principal", UserRole::Cashier)
        .await
        .unwrap()
}

/// Inserts an active product priced by cost and a 30% margin.
pub async fn product(db: &Database, name: &str, cost_cents: i64, stock: i64) -> Product {
    let product = NewProduct {
        category_id: None,
        sku: None,
        name: name.to_string(),
        description: None,
        cost_price_cents: cost_cents,
        profit_margin_bps: 3000,
        manual_price_cents: None,
        stock,
        min_stock: 0,
    }
    .build(Utc::now())
    .unwrap();
    db.products().insert(&product).await.unwrap();
    product
}

pub fn sale_request(user_id: &str, items: &[(&str, i64)]) -> NewSale {
    NewSale {
        customer_id: None,
        user_id: user_id.to_string(),
        items: items
            .iter()
            .map(|(product_id, quantity)| SaleItemRequest {
                product_id: product_id.to_string(),
                quantity: *quantity,
            })
            .collect(),
        discount: Money::zero(),
        tax: Money::zero(),
        payment_method: PaymentMethod::Cash,
        notes: None,
    }
}

pub async fn stock(db: &Database, product_id: &str) -> i64 {
    db.products().stock_of(product_id).await.unwrap().unwrap()
}
