//! # Customer Commands
//!
//! Loyalty balance lookups and redemption at the register.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::Backoffice;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemPointsRequest {
    pub customer_id: String,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyBalanceDto {
    pub customer_id: String,
    pub loyalty_points: i64,
}

pub async fn loyalty_balance(app: &Backoffice, customer_id: &str) -> Result<LoyaltyBalanceDto, ApiError> {
    let loyalty_points = app.loyalty().balance(customer_id).await?;
    Ok(LoyaltyBalanceDto {
        customer_id: customer_id.to_string(),
        loyalty_points,
    })
}

/// Spends points; fails with `INSUFFICIENT_LOYALTY_POINTS` on overdraw.
pub async fn redeem_loyalty_points(
    app: &Backoffice,
    request: RedeemPointsRequest,
) -> Result<LoyaltyBalanceDto, ApiError> {
    debug!(customer_id = %request.customer_id, points = request.points, "redeem_loyalty_points");
    let loyalty_points = app
        .loyalty()
        .redeem_points(&request.customer_id, request.points)
        .await?;
    Ok(LoyaltyBalanceDto {
        customer_id: request.customer_id,
        loyalty_points,
    })
}
