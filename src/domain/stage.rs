//! Pipeline stage enum: ordering, default win probability, terminal check.

use serde::{Deserialize, Serialize};

/// A named phase of a sales opportunity's lifecycle.
///
/// Declaration order is the conventional forward path; the stage engine does
/// not enforce it, any stage may move to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Lead,
    Demo,
    Poc,
    Proposal,
    ClosedWon,
    ClosedLost,
}

impl PipelineStage {
    /// All stages in pipeline order.
    pub const ALL: [PipelineStage; 6] = [
        PipelineStage::Lead,
        PipelineStage::Demo,
        PipelineStage::Poc,
        PipelineStage::Proposal,
        PipelineStage::ClosedWon,
        PipelineStage::ClosedLost,
    ];

    /// Default win probability (percent) assigned when entering this stage.
    pub fn default_probability(&self) -> u8 {
        match self {
            PipelineStage::Lead => 10,
            PipelineStage::Demo => 25,
            PipelineStage::Poc => 50,
            PipelineStage::Proposal => 75,
            PipelineStage::ClosedWon => 100,
            PipelineStage::ClosedLost => 0,
        }
    }

    /// True for the two closed stages; further transitions are meaningless
    /// but not blocked.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::ClosedWon | PipelineStage::ClosedLost)
    }

    /// Wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Lead => "lead",
            PipelineStage::Demo => "demo",
            PipelineStage::Poc => "poc",
            PipelineStage::Proposal => "proposal",
            PipelineStage::ClosedWon => "closed_won",
            PipelineStage::ClosedLost => "closed_lost",
        }
    }

    /// Parse the wire/storage representation. None for anything outside the
    /// six recognized stages.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "lead" => Some(PipelineStage::Lead),
            "demo" => Some(PipelineStage::Demo),
            "poc" => Some(PipelineStage::Poc),
            "proposal" => Some(PipelineStage::Proposal),
            "closed_won" => Some(PipelineStage::ClosedWon),
            "closed_lost" => Some(PipelineStage::ClosedLost),
            _ => None,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
