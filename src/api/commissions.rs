use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{CommissionType, Decimal, PartnerId};
use crate::engine;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateCommissionRequest {
    /// "referral" | "reseller" | "msp" | "custom" | "tiered". Defaults to
    /// "referral". Ignored when `partnerId` is given.
    pub commission_type: Option<String>,
    pub amount: f64,
    /// Explicit rate override; required for "custom".
    pub rate: Option<f64>,
    /// Compute with this partner's negotiated rate (falling back to the
    /// standard referral rate).
    pub partner_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateCommissionResponse {
    pub commission: Decimal,
}

pub async fn calculate_commission(
    State(state): State<AppState>,
    Json(req): Json<CalculateCommissionRequest>,
) -> Result<Json<CalculateCommissionResponse>, AppError> {
    let commission = if let Some(partner_id) = req.partner_id {
        let book = state.repo.load_partner_rate_book().await?;
        engine::partner_commission(req.amount, &PartnerId::new(partner_id), &book)?
    } else {
        let kind_str = req.commission_type.as_deref().unwrap_or("referral");
        match kind_str {
            "tiered" => engine::tiered_commission(req.amount)?,
            _ => {
                let kind = CommissionType::from_wire(kind_str).ok_or_else(|| {
                    AppError::BadRequest(format!("Unknown commission type: {}", kind_str))
                })?;
                engine::commission(kind, req.amount, req.rate)?
            }
        }
    };

    Ok(Json(CalculateCommissionResponse { commission }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitCommissionRequest {
    pub total: f64,
    /// Even split across this many partners.
    pub partner_count: Option<usize>,
    /// Custom split; takes precedence over `partnerCount`.
    pub percentages: Option<Vec<f64>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitCommissionResponse {
    pub shares: Vec<Decimal>,
}

pub async fn split_commission(
    State(_state): State<AppState>,
    Json(req): Json<SplitCommissionRequest>,
) -> Result<Json<SplitCommissionResponse>, AppError> {
    let shares = match (req.percentages, req.partner_count) {
        (Some(percentages), _) => engine::split_commission_custom(req.total, &percentages)?,
        (None, Some(count)) => engine::split_commission(req.total, count)?,
        (None, None) => {
            return Err(AppError::BadRequest(
                "Either partnerCount or percentages is required".to_string(),
            ))
        }
    };

    Ok(Json(SplitCommissionResponse { shares }))
}
