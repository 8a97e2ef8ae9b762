//! Opportunity record and its append-only stage history entry.

use crate::domain::{ActorId, Decimal, OpportunityId, PipelineStage, TimeMs};
use serde::{Deserialize, Serialize};

/// A sales opportunity as seen by the business-logic core.
///
/// `weighted_value` is derived (amount × probability / 100) and is
/// recomputed whenever amount or probability changes; it is never trusted
/// from input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub id: OpportunityId,
    pub name: String,
    pub amount: Decimal,
    pub stage: PipelineStage,
    /// Win probability in percent, 0-100. May diverge from the stage
    /// default if manually overridden.
    pub probability: u8,
    pub weighted_value: Decimal,
    /// Set when the opportunity enters a terminal stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_close_ms: Option<TimeMs>,
    pub created_ms: TimeMs,
    pub updated_ms: TimeMs,
}

/// Immutable record of one accepted stage transition.
///
/// `previous_stage` is None only for the entry written when the opportunity
/// is created. Entries are appended exactly once per transition and never
/// mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageHistoryEntry {
    pub opportunity_id: OpportunityId,
    pub previous_stage: Option<PipelineStage>,
    pub new_stage: PipelineStage,
    pub actor: ActorId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub time_ms: TimeMs,
}
