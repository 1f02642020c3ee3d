//! # Back Office Commands
//!
//! One async function per logical operation, each mapping to one REST
//! endpoint of the HTTP layer.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs       ◄─── You are here (exports, shared conversions)
//! ├── sale.rs      ◄─── create_sale, get_sale, cancel_sale, update_sale
//! ├── pricing.rs   ◄─── recalculate_price, set_manual_price, bulk margins
//! ├── inventory.rs ◄─── ledger history, stock summary, receive, adjust
//! └── customer.rs  ◄─── loyalty balance and redemption
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP handler                                                           │
//! │  ────────────                                                           │
//! │  POST /sales/{id}/cancel  { "reason": "wrong item", "userId": "u-1" }   │
//! │         │                                                               │
//! │         │ (serde_json, camelCase)                                       │
//! │         ▼                                                               │
//! │  commands::sale::cancel_sale(                                           │
//! │      app: &Backoffice,          ◄── shared handle (pool + config)       │
//! │      request: CancelSaleRequest,                                        │
//! │  ) -> Result<CancelSaleResponse, ApiError>                              │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  200 + response JSON, or ApiError.status + ApiError JSON                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Amounts cross the boundary as integer cents. Margins cross as percents
//! (`30.0`) and are converted to basis points here.

pub mod customer;
pub mod inventory;
pub mod pricing;
pub mod sale;

use crate::error::ApiError;

/// Converts a percent such as `27.5` into basis points (`2750`).
///
/// Margins are stored at 0.01% granularity, so a percent with more than two
/// decimals is rejected rather than rounded. Range checks belong to the
/// pricing rules.
pub(crate) fn percent_to_bps(field: &str, percent: f64) -> Result<i64, ApiError> {
    if !percent.is_finite() || percent.abs() > 1_000_000.0 {
        return Err(ApiError::validation(format!("{} must be a finite percentage", field)));
    }
    let scaled = percent * 100.0;
    let bps = scaled.round();
    if (scaled - bps).abs() > 1e-6 {
        return Err(ApiError::validation(format!(
            "{} allows at most two decimal places, got {}",
            field, percent
        )));
    }
    Ok(bps as i64)
}

/// Basis points back to a display percent.
pub(crate) fn bps_to_percent(bps: i64) -> f64 {
    bps as f64 / 100.0
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_to_bps() {
        assert_eq!(percent_to_bps("profitMargin", 30.0).unwrap(), 3000);
        assert_eq!(percent_to_bps("profitMargin", 27.25).unwrap(), 2725);
        assert_eq!(percent_to_bps("marginIncrease", -5.0).unwrap(), -500);
        assert!(percent_to_bps("profitMargin", f64::NAN).is_err());
        assert!(percent_to_bps("profitMargin", f64::INFINITY).is_err());
        assert_eq!(bps_to_percent(2750), 27.5);
    }

    #[test]
    fn test_percent_to_bps_keeps_two_decimals() {
        assert_eq!(percent_to_bps("profitMargin", 0.07).unwrap(), 7);
        assert_eq!(percent_to_bps("profitMargin", 99.99).unwrap(), 9999);
        assert_eq!(percent_to_bps("marginIncrease", -0.01).unwrap(), -1);

        let err = percent_to_bps("profitMargin", 99.996).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
        assert!(err.message.contains("profitMargin"));
        assert!(percent_to_bps("newMargin", 27.555).is_err());
        assert!(percent_to_bps("marginIncrease", 0.001).is_err());
    }
}
