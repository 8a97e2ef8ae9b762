use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::db::StageSummary;
use crate::domain::{
    ActorId, Decimal, Opportunity, OpportunityId, PipelineStage, StageHistoryEntry, TimeMs,
};
use crate::engine;
use crate::error::AppError;

fn parse_opportunity_id(input: &str) -> Result<OpportunityId, AppError> {
    OpportunityId::parse(input)
        .map_err(|_| AppError::BadRequest("Invalid opportunity id".to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOpportunityRequest {
    pub name: String,
    pub amount: f64,
    /// Defaults to "lead".
    pub stage: Option<String>,
    /// Defaults to the stage's default probability.
    pub probability: Option<i64>,
    pub actor_id: String,
}

pub async fn create_opportunity(
    State(state): State<AppState>,
    Json(req): Json<CreateOpportunityRequest>,
) -> Result<Json<Opportunity>, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name must not be empty".to_string()));
    }

    let stage_str = req.stage.as_deref().unwrap_or("lead");
    let stage = PipelineStage::from_wire(stage_str)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown pipeline stage: {}", stage_str)))?;

    let probability_raw = req
        .probability
        .unwrap_or_else(|| i64::from(stage.default_probability()));

    // Validates amount and probability together and yields the forecast
    // value; the raw probability fits u8 once this passes.
    let weighted_value = engine::weighted_value(req.amount, probability_raw)?;
    let amount = engine::validate_amount(req.amount)?;
    let probability = probability_raw as u8;

    let now = TimeMs::now();
    let opportunity = Opportunity {
        id: OpportunityId::generate(),
        name: req.name,
        amount,
        stage,
        probability,
        weighted_value,
        actual_close_ms: if stage.is_terminal() { Some(now) } else { None },
        created_ms: now,
        updated_ms: now,
    };

    let first_entry = StageHistoryEntry {
        opportunity_id: opportunity.id,
        previous_stage: None,
        new_stage: stage,
        actor: ActorId::new(req.actor_id),
        note: None,
        time_ms: now,
    };

    state
        .repo
        .create_opportunity(&opportunity, &first_entry)
        .await?;

    Ok(Json(opportunity))
}

pub async fn list_opportunities(
    State(state): State<AppState>,
) -> Result<Json<Vec<Opportunity>>, AppError> {
    Ok(Json(state.repo.list_opportunities().await?))
}

pub async fn get_opportunity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Opportunity>, AppError> {
    let id = parse_opportunity_id(&id)?;
    let opportunity = state
        .repo
        .get_opportunity(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Opportunity {}", id)))?;
    Ok(Json(opportunity))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageChangeRequest {
    pub stage: String,
    pub actor_id: String,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageChangeResponse {
    pub opportunity: Opportunity,
    pub history: StageHistoryEntry,
}

pub async fn change_stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StageChangeRequest>,
) -> Result<Json<StageChangeResponse>, AppError> {
    let id = parse_opportunity_id(&id)?;
    let opportunity = state
        .repo
        .get_opportunity(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Opportunity {}", id)))?;

    let transition = engine::apply_stage_change(
        &opportunity,
        &req.stage,
        ActorId::new(req.actor_id),
        req.note,
        state.config.probability_policy,
        TimeMs::now(),
    )?;

    state.repo.apply_stage_change(&transition).await?;

    Ok(Json(StageChangeResponse {
        opportunity: transition.opportunity,
        history: transition.history,
    }))
}

pub async fn get_stage_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StageHistoryEntry>>, AppError> {
    let id = parse_opportunity_id(&id)?;
    // 404 for an unknown opportunity rather than an empty history.
    state
        .repo
        .get_opportunity(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Opportunity {}", id)))?;

    Ok(Json(state.repo.list_stage_history(id).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummaryDto {
    pub stage: PipelineStage,
    pub count: i64,
    pub total_amount: Decimal,
    pub total_weighted_value: Decimal,
}

impl From<StageSummary> for StageSummaryDto {
    fn from(s: StageSummary) -> Self {
        StageSummaryDto {
            stage: s.stage,
            count: s.count,
            total_amount: s.total_amount,
            total_weighted_value: s.total_weighted_value,
        }
    }
}

pub async fn pipeline_summary(
    State(state): State<AppState>,
) -> Result<Json<Vec<StageSummaryDto>>, AppError> {
    let summary = state.repo.pipeline_summary().await?;
    Ok(Json(summary.into_iter().map(Into::into).collect()))
}
