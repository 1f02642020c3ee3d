//! # Tienda Back Office CLI
//!
//! Operator tasks that don't need the HTTP layer.
//!
//! ## Usage
//! ```bash
//! # Create or upgrade the database at TIENDA_DB_PATH
//! tienda-backoffice migrate
//!
//! # Print the profit report as JSON
//! tienda-backoffice profit-analysis
//!
//! # Ledger totals and the newest movements of one product
//! tienda-backoffice ledger <product_id> [limit]
//!
//! # One sale by invoice number
//! tienda-backoffice sale INV-20260312-000042
//! ```

use serde::Serialize;
use std::env;
use std::process::ExitCode;
use tracing::{error, info};

use tienda_backoffice::commands::{inventory, pricing, sale};
use tienda_backoffice::{init_tracing, ApiError, AppConfig, Backoffice};

const USAGE: &str = "Usage: tienda-backoffice <migrate | profit-analysis | ledger <product_id> [limit] | sale <invoice_number>>";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LedgerReport {
    summary: inventory::StockSummaryDto,
    movements: Vec<inventory::LedgerEntryDto>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(code = ?err.code, status = err.status, "{}", err.message);
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<(), ApiError> {
    let config = AppConfig::from_env()?;
    let app = Backoffice::open(config).await?;

    let result = match args[0].as_str() {
        "migrate" => {
            app.db().run_migrations().await?;
            info!("Database is up to date");
            Ok(())
        }
        "profit-analysis" => print_json(&pricing::profit_analysis(&app).await?),
        "ledger" => {
            let product_id = args
                .get(1)
                .ok_or_else(|| ApiError::validation("ledger needs a product id"))?;
            let limit = match args.get(2) {
                Some(raw) => Some(
                    raw.parse::<u32>()
                        .map_err(|_| ApiError::validation("limit must be a positive number"))?,
                ),
                None => None,
            };
            let report = LedgerReport {
                summary: inventory::stock_summary(&app, product_id).await?,
                movements: inventory::inventory_history(&app, product_id, limit).await?,
            };
            print_json(&report)
        }
        "sale" => {
            let invoice = args
                .get(1)
                .ok_or_else(|| ApiError::validation("sale needs an invoice number"))?;
            print_json(&sale::get_sale_by_invoice(&app, invoice).await?)
        }
        other => Err(ApiError::validation(format!(
            "Unknown command '{}'. {}",
            other, USAGE
        ))),
    };

    app.close().await;
    result
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ApiError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| ApiError::internal(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
