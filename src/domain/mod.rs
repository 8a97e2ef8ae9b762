//! Domain types for the partner/opportunity core.
//!
//! This module provides:
//! - Lossless money handling via the Decimal wrapper
//! - Domain primitives: OpportunityId, PartnerId, ActorId, TimeMs
//! - Commission types, the standard tier schedule, partner rate overrides
//! - Pipeline stages with default probabilities
//! - Opportunity and stage-history records

pub mod commission;
pub mod decimal;
pub mod opportunity;
pub mod primitives;
pub mod stage;

pub use commission::{
    standard_tier_schedule, CommissionType, PartnerRateBook, Tier, STANDARD_REFERRAL_RATE,
};
pub use decimal::Decimal;
pub use opportunity::{Opportunity, StageHistoryEntry};
pub use primitives::{ActorId, OpportunityId, PartnerId, TimeMs};
pub use stage::PipelineStage;
