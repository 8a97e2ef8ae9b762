pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    ActorId, CommissionType, Decimal, Opportunity, OpportunityId, PartnerId, PartnerRateBook,
    PipelineStage, StageHistoryEntry, TimeMs,
};
pub use engine::{EngineError, ProbabilityPolicy, StageTransition};
pub use error::AppError;
