//! Opportunity Stage Engine: transition bookkeeping and derived-value
//! consistency.
//!
//! The engine is deliberately not a workflow gate: any recognized stage may
//! move to any other, including backward and repeated moves. Its contract is
//! that every accepted transition yields exactly one updated opportunity and
//! exactly one history entry, produced together; persisting the pair
//! atomically is the repository's transaction.

use crate::domain::{ActorId, Decimal, Opportunity, PipelineStage, StageHistoryEntry, TimeMs};
use crate::engine::EngineError;

/// What happens to a stored probability when the stage changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbabilityPolicy {
    /// Always set the new stage's default probability. This matches the
    /// source system's observable behavior and is the default.
    #[default]
    OverwriteWithStageDefault,
    /// Keep a probability that was manually moved away from the old stage's
    /// default; only untouched probabilities follow the new stage.
    PreserveManualOverride,
}

impl ProbabilityPolicy {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "overwrite" => Some(ProbabilityPolicy::OverwriteWithStageDefault),
            "preserve" => Some(ProbabilityPolicy::PreserveManualOverride),
            _ => None,
        }
    }
}

/// Result of one accepted stage change: the updated opportunity and the
/// single history entry recording it.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTransition {
    pub opportunity: Opportunity,
    pub history: StageHistoryEntry,
}

/// Apply a stage change to an opportunity.
///
/// Rejects unrecognized stage values with `UnknownStage` before producing
/// anything. On success:
/// - probability follows `policy`
/// - weighted value is recomputed from amount × probability
/// - entering a terminal stage sets the actual-close marker, leaving one
///   clears it
/// - the history entry's `previous_stage` is the opportunity's stage as it
///   was immediately before this call
pub fn apply_stage_change(
    opportunity: &Opportunity,
    new_stage: &str,
    actor: ActorId,
    note: Option<String>,
    policy: ProbabilityPolicy,
    now: TimeMs,
) -> Result<StageTransition, EngineError> {
    let new_stage = parse_stage(new_stage)?;

    let probability = match policy {
        ProbabilityPolicy::OverwriteWithStageDefault => new_stage.default_probability(),
        ProbabilityPolicy::PreserveManualOverride => {
            if opportunity.probability == opportunity.stage.default_probability() {
                new_stage.default_probability()
            } else {
                opportunity.probability
            }
        }
    };

    // Amount was validated at creation and probability is 0-100 by
    // construction, so the recomputation is infallible here.
    let weighted = recompute_weighted_value(opportunity.amount, probability);

    let history = StageHistoryEntry {
        opportunity_id: opportunity.id,
        previous_stage: Some(opportunity.stage),
        new_stage,
        actor,
        note,
        time_ms: now,
    };

    let updated = Opportunity {
        stage: new_stage,
        probability,
        weighted_value: weighted,
        actual_close_ms: if new_stage.is_terminal() {
            Some(now)
        } else {
            None
        },
        updated_ms: now,
        ..opportunity.clone()
    };

    Ok(StageTransition {
        opportunity: updated,
        history,
    })
}

/// Weighted value over an already-validated amount and probability.
///
/// The f64 boundary variant lives in `engine::commission::weighted_value`;
/// this one works directly on the stored Decimal amount.
pub fn recompute_weighted_value(amount: Decimal, probability: u8) -> Decimal {
    amount * Decimal::new(rust_decimal::Decimal::from(probability)) / Decimal::hundred()
}

/// Default win probability for a stage given as a wire string.
///
/// # Errors
/// `UnknownStage` if the value is not one of the six recognized stages.
pub fn stage_default_probability(stage: &str) -> Result<u8, EngineError> {
    Ok(parse_stage(stage)?.default_probability())
}

/// Whether a stage given as a wire string is terminal.
///
/// # Errors
/// `UnknownStage` if the value is not one of the six recognized stages.
pub fn is_terminal_stage(stage: &str) -> Result<bool, EngineError> {
    Ok(parse_stage(stage)?.is_terminal())
}

fn parse_stage(s: &str) -> Result<PipelineStage, EngineError> {
    PipelineStage::from_wire(s).ok_or_else(|| EngineError::UnknownStage(s.to_string()))
}
