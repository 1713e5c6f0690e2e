//! Pure phase transition function
//!
//! `next_phase` is total over every `(Phase, ConversationContext)` pair and
//! performs no I/O.

use super::context::ConversationContext;
use super::phase::Phase;
use serde::Serialize;

/// Distinct genres required before a mashup can be discussed educationally
pub const MIN_GENRES: usize = 2;

/// Outcome of evaluating the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseDecision {
    pub phase: Phase,
    pub ready_for_generation: bool,
}

impl PhaseDecision {
    fn settled(phase: Phase) -> Self {
        Self {
            phase,
            ready_for_generation: phase == Phase::ReadyForGeneration,
        }
    }
}

fn has_genre_signal(ctx: &ConversationContext) -> bool {
    ctx.genre_interest == Some(true) || !ctx.genres.is_empty()
}

fn has_genre_breadth(ctx: &ConversationContext) -> bool {
    ctx.genres.len() >= MIN_GENRES
}

fn has_educational_basis(ctx: &ConversationContext) -> bool {
    ctx.skill_level.is_some() && !ctx.learning_objectives.is_empty()
}

fn has_cultural_focus(ctx: &ConversationContext) -> bool {
    !ctx.cultural_focus.is_empty()
}

/// Single step of the transition table. Returns the input phase when its
/// exit guard does not hold.
fn step(current: Phase, ctx: &ConversationContext) -> Phase {
    match current {
        Phase::Initial if has_genre_signal(ctx) => Phase::GenreExploration,
        Phase::GenreExploration if has_genre_breadth(ctx) => Phase::EducationalClarification,
        Phase::EducationalClarification if has_educational_basis(ctx) => Phase::CulturalResearch,
        Phase::CulturalResearch
            if has_cultural_focus(ctx) && has_educational_basis(ctx) && has_genre_breadth(ctx) =>
        {
            Phase::ReadyForGeneration
        }
        // No progress: stay put. Error is never left automatically.
        Phase::Initial
        | Phase::GenreExploration
        | Phase::EducationalClarification
        | Phase::CulturalResearch
        | Phase::ReadyForGeneration
        | Phase::Error => current,
    }
}

/// Decide the next phase from the accumulated context.
///
/// Steps are applied until a fixed point, so a single message carrying
/// enough context can advance several phases at once. Absence of new
/// information re-enters the same phase; it never produces `Error`.
pub fn next_phase(current: Phase, ctx: &ConversationContext) -> PhaseDecision {
    let mut phase = current;
    loop {
        let next = step(phase, ctx);
        if next == phase {
            return PhaseDecision::settled(phase);
        }
        phase = next;
    }
}

/// Decision for an unrecoverable upstream failure, valid from any phase.
pub fn upstream_failure(current: Phase) -> PhaseDecision {
    tracing::debug!(from = %current, "Entering error phase");
    PhaseDecision::settled(Phase::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::context::{ContextDelta, SkillLevel};

    fn ctx_with(delta: ContextDelta) -> ConversationContext {
        let mut ctx = ConversationContext::default();
        ctx.apply(&delta);
        ctx
    }

    fn genres(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_empty_context_stays_initial() {
        let decision = next_phase(Phase::Initial, &ConversationContext::default());
        assert_eq!(decision.phase, Phase::Initial);
        assert!(!decision.ready_for_generation);
    }

    #[test]
    fn test_single_genre_moves_to_exploration() {
        let ctx = ctx_with(ContextDelta {
            genres: genres(&["jazz"]),
            ..ContextDelta::default()
        });
        assert_eq!(next_phase(Phase::Initial, &ctx).phase, Phase::GenreExploration);
    }

    #[test]
    fn test_two_genres_cascade_to_clarification() {
        let ctx = ctx_with(ContextDelta {
            genres: genres(&["jazz", "blues"]),
            ..ContextDelta::default()
        });
        assert_eq!(
            next_phase(Phase::Initial, &ctx).phase,
            Phase::EducationalClarification
        );
    }

    #[test]
    fn test_educational_basis_needs_skill_and_objective() {
        let mut ctx = ctx_with(ContextDelta {
            genres: genres(&["jazz", "blues"]),
            skill_level: Some(SkillLevel::Beginner),
            ..ContextDelta::default()
        });
        assert_eq!(
            next_phase(Phase::EducationalClarification, &ctx).phase,
            Phase::EducationalClarification
        );

        ctx.learning_objectives.insert("teaching");
        assert_eq!(
            next_phase(Phase::EducationalClarification, &ctx).phase,
            Phase::CulturalResearch
        );
    }

    #[test]
    fn test_complete_context_is_ready() {
        let ctx = ctx_with(ContextDelta {
            genres: genres(&["jazz", "blues"]),
            skill_level: Some(SkillLevel::Intermediate),
            learning_objectives: genres(&["teaching"]),
            cultural_focus: genres(&["history"]),
            ..ContextDelta::default()
        });
        let decision = next_phase(Phase::Initial, &ctx);
        assert_eq!(decision.phase, Phase::ReadyForGeneration);
        assert!(decision.ready_for_generation);

        // Ready is terminal for the progression
        assert_eq!(next_phase(Phase::ReadyForGeneration, &ctx), decision);
    }

    #[test]
    fn test_cultural_research_waits_for_focus() {
        let ctx = ctx_with(ContextDelta {
            genres: genres(&["jazz", "blues"]),
            skill_level: Some(SkillLevel::Advanced),
            learning_objectives: genres(&["music_theory"]),
            ..ContextDelta::default()
        });
        let decision = next_phase(Phase::CulturalResearch, &ctx);
        assert_eq!(decision.phase, Phase::CulturalResearch);
        assert!(!decision.ready_for_generation);
    }

    #[test]
    fn test_error_is_sticky() {
        let ctx = ctx_with(ContextDelta {
            genres: genres(&["jazz", "blues"]),
            skill_level: Some(SkillLevel::Advanced),
            learning_objectives: genres(&["teaching"]),
            cultural_focus: genres(&["heritage"]),
            ..ContextDelta::default()
        });
        let decision = next_phase(Phase::Error, &ctx);
        assert_eq!(decision.phase, Phase::Error);
        assert!(!decision.ready_for_generation);
    }

    #[test]
    fn test_upstream_failure_from_any_phase() {
        for phase in Phase::ALL {
            let decision = upstream_failure(phase);
            assert_eq!(decision.phase, Phase::Error);
            assert!(!decision.ready_for_generation);
        }
    }
}
