//! Conversation phases

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named stage in the context-gathering conversation.
///
/// The first five variants form an ordered progression. `Error` sits outside
/// it and is only entered on an unrecoverable upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Initial,
    GenreExploration,
    EducationalClarification,
    CulturalResearch,
    ReadyForGeneration,
    Error,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Initial,
        Phase::GenreExploration,
        Phase::EducationalClarification,
        Phase::CulturalResearch,
        Phase::ReadyForGeneration,
        Phase::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Initial => "initial",
            Phase::GenreExploration => "genre_exploration",
            Phase::EducationalClarification => "educational_clarification",
            Phase::CulturalResearch => "cultural_research",
            Phase::ReadyForGeneration => "ready_for_generation",
            Phase::Error => "error",
        }
    }

    /// Position in the normal progression; `None` for `Error`.
    pub fn rank(self) -> Option<u8> {
        match self {
            Phase::Initial => Some(0),
            Phase::GenreExploration => Some(1),
            Phase::EducationalClarification => Some(2),
            Phase::CulturalResearch => Some(3),
            Phase::ReadyForGeneration => Some(4),
            Phase::Error => None,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, Phase::Error)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown phase: {0}")]
pub struct UnknownPhase(pub String);

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}
