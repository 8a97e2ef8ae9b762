//! Pure computation engines for commission and pipeline-stage logic.
//!
//! Both engines are stateless: every function is a synchronous computation
//! over its explicit inputs, and every invalid input is rejected with an
//! [`EngineError`] before any value is produced. Nothing here touches the
//! database or logs; propagation to HTTP status codes happens in the API
//! layer.

pub mod commission;
pub mod stage;

pub use commission::{
    aggregate_commissions, commission, partner_commission, split_commission,
    split_commission_custom, tiered_commission, validate_amount, weighted_value,
};
pub use stage::{
    apply_stage_change, is_terminal_stage, recompute_weighted_value, stage_default_probability,
    ProbabilityPolicy, StageTransition,
};

use thiserror::Error;

/// Validation failure raised by the commission or stage engine.
///
/// All variants are local input errors, never systemic or retriable faults;
/// values are rejected, never clamped or coerced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Amount is not a number")]
    InvalidAmount,
    #[error("Amount must be finite")]
    InfiniteAmount,
    #[error("Amount must not be negative")]
    NegativeAmount,
    #[error("Rate must be between 0 and 1")]
    InvalidRate,
    #[error("Probability must be between 0 and 100")]
    InvalidProbability,
    #[error("Split percentages must sum to 1.0")]
    InvalidSplitPercentages,
    #[error("Partner count must be at least 1")]
    InvalidPartnerCount,
    #[error("Unknown pipeline stage: {0}")]
    UnknownStage(String),
}
