//! Context extraction from user messages
//!
//! Each phase has its own `Extractor` strategy. Extraction is pure and
//! total: unrecognised text yields an empty delta, never an error. The
//! default strategies are keyword based; any of them can be swapped for a
//! richer implementation through [`PhaseExtractors::with`] without touching
//! the state machine.

mod vocabulary;

use crate::state_machine::{ContextDelta, Phase, SkillLevel, TargetAudience};
use vocabulary::{
    CONFIRMATION, CULTURAL_FOCUS, CULTURAL_SENSITIVITY, GENRES, GENRE_INTEREST,
    LEARNING_OBJECTIVES, SKILL_LEVELS, TARGET_AUDIENCE, THEORY_CONCEPTS,
};

/// Maps one user message to a context delta.
///
/// Implementations must be deterministic and free of side effects.
pub trait Extractor: Send + Sync {
    fn extract(&self, message: &str) -> ContextDelta;
}

fn labels(found: Vec<&'static str>) -> Vec<String> {
    found.into_iter().map(String::from).collect()
}

fn skill_level(message: &str) -> Option<SkillLevel> {
    match SKILL_LEVELS.first(message)? {
        "beginner" => Some(SkillLevel::Beginner),
        "intermediate" => Some(SkillLevel::Intermediate),
        "advanced" => Some(SkillLevel::Advanced),
        _ => None,
    }
}

fn target_audience(message: &str) -> Option<TargetAudience> {
    match TARGET_AUDIENCE.first(message)? {
        "higher_education" => Some(TargetAudience::HigherEducation),
        "k12" => Some(TargetAudience::K12),
        _ => None,
    }
}

fn flag(present: bool) -> Option<bool> {
    present.then_some(true)
}

// ============================================================================
// Keyword strategies
// ============================================================================

/// First contact: goals, audience and any genres already named.
pub struct InitialExtractor;

impl Extractor for InitialExtractor {
    fn extract(&self, message: &str) -> ContextDelta {
        ContextDelta {
            target_audience: target_audience(message),
            genre_interest: flag(GENRE_INTEREST.any(message)),
            genres: labels(GENRES.matches(message)),
            learning_objectives: labels(LEARNING_OBJECTIVES.matches(message)),
            ..ContextDelta::default()
        }
    }
}

/// Genre exploration: more genres and the cultural angles mentioned with them.
pub struct GenreExtractor;

impl Extractor for GenreExtractor {
    fn extract(&self, message: &str) -> ContextDelta {
        ContextDelta {
            genre_interest: flag(GENRE_INTEREST.any(message)),
            genres: labels(GENRES.matches(message)),
            cultural_focus: labels(CULTURAL_FOCUS.matches(message)),
            ..ContextDelta::default()
        }
    }
}

/// Educational clarification: skill level, objectives, audience, theory.
pub struct EducationalExtractor;

impl Extractor for EducationalExtractor {
    fn extract(&self, message: &str) -> ContextDelta {
        ContextDelta {
            skill_level: skill_level(message),
            target_audience: target_audience(message),
            learning_objectives: labels(LEARNING_OBJECTIVES.matches(message)),
            theory_concepts: labels(THEORY_CONCEPTS.matches(message)),
            ..ContextDelta::default()
        }
    }
}

/// Cultural research: cultural focus and sensitivity markers.
pub struct CulturalExtractor;

impl Extractor for CulturalExtractor {
    fn extract(&self, message: &str) -> ContextDelta {
        ContextDelta {
            cultural_sensitivity: flag(CULTURAL_SENSITIVITY.any(message)),
            cultural_focus: labels(CULTURAL_FOCUS.matches(message)),
            theory_concepts: labels(THEORY_CONCEPTS.matches(message)),
            ..ContextDelta::default()
        }
    }
}

/// Ready for generation: only listens for confirmation.
pub struct ConfirmationExtractor;

impl Extractor for ConfirmationExtractor {
    fn extract(&self, message: &str) -> ContextDelta {
        ContextDelta {
            generation_confirmed: flag(CONFIRMATION.any(message)),
            ..ContextDelta::default()
        }
    }
}

/// Extracts nothing. Used while a conversation is in `Error`.
pub struct NullExtractor;

impl Extractor for NullExtractor {
    fn extract(&self, _message: &str) -> ContextDelta {
        ContextDelta::default()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// One extractor per phase
pub struct PhaseExtractors {
    initial: Box<dyn Extractor>,
    genre_exploration: Box<dyn Extractor>,
    educational_clarification: Box<dyn Extractor>,
    cultural_research: Box<dyn Extractor>,
    ready_for_generation: Box<dyn Extractor>,
    error: Box<dyn Extractor>,
}

impl Default for PhaseExtractors {
    fn default() -> Self {
        Self {
            initial: Box::new(InitialExtractor),
            genre_exploration: Box::new(GenreExtractor),
            educational_clarification: Box::new(EducationalExtractor),
            cultural_research: Box::new(CulturalExtractor),
            ready_for_generation: Box::new(ConfirmationExtractor),
            error: Box::new(NullExtractor),
        }
    }
}

impl PhaseExtractors {
    /// Replace the strategy used for `phase`
    #[allow(dead_code)] // Extension point, exercised in tests
    pub fn with(mut self, phase: Phase, extractor: Box<dyn Extractor>) -> Self {
        *self.slot_mut(phase) = extractor;
        self
    }

    pub fn for_phase(&self, phase: Phase) -> &dyn Extractor {
        match phase {
            Phase::Initial => self.initial.as_ref(),
            Phase::GenreExploration => self.genre_exploration.as_ref(),
            Phase::EducationalClarification => self.educational_clarification.as_ref(),
            Phase::CulturalResearch => self.cultural_research.as_ref(),
            Phase::ReadyForGeneration => self.ready_for_generation.as_ref(),
            Phase::Error => self.error.as_ref(),
        }
    }

    fn slot_mut(&mut self, phase: Phase) -> &mut Box<dyn Extractor> {
        match phase {
            Phase::Initial => &mut self.initial,
            Phase::GenreExploration => &mut self.genre_exploration,
            Phase::EducationalClarification => &mut self.educational_clarification,
            Phase::CulturalResearch => &mut self.cultural_research,
            Phase::ReadyForGeneration => &mut self.ready_for_generation,
            Phase::Error => &mut self.error,
        }
    }

    pub fn extract(&self, phase: Phase, message: &str) -> ContextDelta {
        self.for_phase(phase).extract(message)
    }
}
