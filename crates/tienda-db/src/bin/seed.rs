//! # Seed Data Generator
//!
//! Populates a development database with a small store catalog.
//!
//! ## Usage
//! ```bash
//! # Seed ./tienda_dev.db
//! cargo run -p tienda-db --bin seed
//!
//! # Specify database path
//! cargo run -p tienda-db --bin seed -- --db ./data/tienda.db
//!
//! # Also print the profit report of the seeded catalog
//! cargo run -p tienda-db --bin seed -- --report
//! ```
//!
//! ## Generated Data
//! - One category per entry in `CATEGORIES`, each with its products
//! - Cost prices between $0.80 and $24.00, margins between 15% and 45%
//! - Every product starts with a stock between 0 and 60; the initial level
//!   is the ledger's replay origin
//! - Three customers with empty loyalty accounts
//! - One admin operator (`admin`)

use chrono::Utc;
use std::env;
use tienda_core::{NewProduct, UserRole};
use tienda_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Category name, SKU prefix and products (name, cost in cents).
const CATEGORIES: &[(&str, &str, &[(&str, i64)])] = &[
    (
        "Almacén",
        "ALM",
        &[
            ("Yerba Mate 1kg", 7000),
            ("Arroz Largo Fino 1kg", 1450),
            ("Fideos Spaghetti 500g", 980),
            ("Aceite de Girasol 1.5L", 3200),
            ("Azúcar 1kg", 1150),
            ("Harina 000 1kg", 890),
            ("Café Molido 500g", 5600),
            ("Dulce de Leche 400g", 2100),
        ],
    ),
    (
        "Bebidas",
        "BEB",
        &[
            ("Agua Mineral 2L", 800),
            ("Gaseosa Cola 2.25L", 2250),
            ("Jugo de Naranja 1L", 1600),
            ("Cerveza Rubia 1L", 2400),
            ("Vino Tinto Malbec 750ml", 2400),
        ],
    ),
    (
        "Limpieza",
        "LIM",
        &[
            ("Lavandina 2L", 1300),
            ("Detergente 750ml", 1900),
            ("Jabón en Polvo 800g", 2800),
            ("Esponja Doble Uso", 450),
        ],
    ),
    (
        "Lácteos",
        "LAC",
        &[
            ("Leche Entera 1L", 1100),
            ("Yogur Natural 1kg", 2300),
            ("Queso Cremoso 1kg", 9800),
            ("Manteca 200g", 1750),
        ],
    ),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Ana Gómez", "ana.gomez@example.com"),
    ("Luis Fernández", "luis.fernandez@example.com"),
    ("Marta Ríos", "marta.rios@example.com"),
];

/// Margins in basis points, cycled through the catalog.
const MARGINS_BPS: &[i64] = &[1500, 2500, 3000, 3500, 4500];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./tienda_dev.db");
    let mut print_report = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--report" | "-r" => print_report = true,
            "--help" | "-h" => {
                println!("Tienda POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tienda_dev.db)");
                println!("  -r, --report       Print the resulting profit analysis as JSON");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(database = %db_path, "Seeding database");
    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products; delete the file to regenerate");
        return Ok(());
    }

    let operator = db.users().create("admin", "Administrador", UserRole::Admin).await?;
    info!(user_id = %operator.id, "Operator created");

    let mut generated = 0usize;
    for (category_name, prefix, products) in CATEGORIES {
        let category = db.categories().create(category_name, None).await?;

        for (index, (name, cost_cents)) in products.iter().enumerate() {
            let seed = generated * 7 + index;
            let product = NewProduct {
                category_id: Some(category.id.clone()),
                sku: Some(format!("{}-{:03}", prefix, index + 1)),
                name: name.to_string(),
                description: None,
                cost_price_cents: *cost_cents,
                profit_margin_bps: MARGINS_BPS[seed % MARGINS_BPS.len()],
                manual_price_cents: None,
                stock: (seed % 61) as i64,
                min_stock: 5,
            }
            .build(Utc::now())?;

            if let Err(e) = db.products().insert(&product).await {
                warn!(sku = ?product.sku, error = %e, "Failed to insert product");
                continue;
            }
            generated += 1;
        }
    }
    info!(products = generated, categories = CATEGORIES.len(), "Catalog seeded");

    for (name, email) in CUSTOMERS {
        db.customers().create(name, Some(*email), None).await?;
    }
    info!(customers = CUSTOMERS.len(), "Customers seeded");

    let analysis = db.pricing_service(tienda_db::DEFAULT_MAX_RETRIES).profit_analysis().await?;
    info!(
        inventory_value = %analysis.total_inventory_value,
        profit_value = %analysis.total_profit_value,
        average_margin = analysis.average_margin_percentage,
        "Seed complete"
    );
    if print_report {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    }

    Ok(())
}
