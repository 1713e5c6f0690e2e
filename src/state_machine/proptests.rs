//! Property-based tests for the phase state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::context::*;
use super::phase::Phase;
use super::transition::*;
use proptest::prelude::*;
use std::collections::BTreeSet;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_phase() -> impl Strategy<Value = Phase> {
    prop::sample::select(Phase::ALL.to_vec())
}

fn arb_skill_level() -> impl Strategy<Value = Option<SkillLevel>> {
    prop_oneof![
        Just(None),
        Just(Some(SkillLevel::Beginner)),
        Just(Some(SkillLevel::Intermediate)),
        Just(Some(SkillLevel::Advanced)),
    ]
}

fn arb_audience() -> impl Strategy<Value = Option<TargetAudience>> {
    prop_oneof![
        Just(None),
        Just(Some(TargetAudience::K12)),
        Just(Some(TargetAudience::HigherEducation)),
    ]
}

fn arb_labels(pool: &'static [&'static str]) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop::sample::select(pool), 0..4)
        .prop_map(|v| v.into_iter().map(String::from).collect())
}

const GENRES: &[&str] = &["jazz", "blues", "rock", "folk", "reggae", "funk"];
const OBJECTIVES: &[&str] = &["teaching", "music_theory", "listening"];
const CULTURE: &[&str] = &["history", "tradition", "heritage", "origin"];
const CONCEPTS: &[&str] = &["rhythm", "harmony", "scale"];
const URLS: &[&str] = &[
    "https://en.wikipedia.org/wiki/Jazz",
    "https://www.britannica.com/art/blues",
    "http://example.com/folk",
];

fn arb_delta() -> impl Strategy<Value = ContextDelta> {
    (
        arb_skill_level(),
        arb_audience(),
        prop::option::of(Just(true)),
        prop::option::of(Just(true)),
        arb_labels(GENRES),
        arb_labels(OBJECTIVES),
        arb_labels(CULTURE),
        arb_labels(CONCEPTS),
        arb_labels(URLS),
    )
        .prop_map(
            |(
                skill_level,
                target_audience,
                genre_interest,
                cultural_sensitivity,
                genres,
                learning_objectives,
                cultural_focus,
                theory_concepts,
                web_research,
            )| ContextDelta {
                skill_level,
                target_audience,
                genre_interest,
                cultural_sensitivity,
                generation_confirmed: None,
                genres,
                learning_objectives,
                cultural_focus,
                theory_concepts,
                web_research,
            },
        )
}

fn arb_context() -> impl Strategy<Value = ConversationContext> {
    prop::collection::vec(arb_delta(), 0..4).prop_map(|deltas| fold(&deltas))
}

fn fold(deltas: &[ContextDelta]) -> ConversationContext {
    let mut ctx = ConversationContext::default();
    for delta in deltas {
        ctx.apply(delta);
    }
    ctx
}

fn as_set(set: &AppendOnlySet) -> BTreeSet<String> {
    set.iter().map(String::from).collect()
}

fn rank_or_max(phase: Phase) -> u8 {
    phase.rank().unwrap_or(u8::MAX)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn next_phase_is_deterministic(phase in arb_phase(), ctx in arb_context()) {
        let first = next_phase(phase, &ctx);
        let second = next_phase(phase, &ctx.clone());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn next_phase_never_regresses(phase in arb_phase(), ctx in arb_context()) {
        let decision = next_phase(phase, &ctx);
        prop_assert!(rank_or_max(decision.phase) >= rank_or_max(phase));
    }

    #[test]
    fn next_phase_is_a_fixed_point(phase in arb_phase(), ctx in arb_context()) {
        let decision = next_phase(phase, &ctx);
        prop_assert_eq!(next_phase(decision.phase, &ctx), decision);
    }

    #[test]
    fn ready_iff_ready_phase(phase in arb_phase(), ctx in arb_context()) {
        let decision = next_phase(phase, &ctx);
        prop_assert_eq!(
            decision.ready_for_generation,
            decision.phase == Phase::ReadyForGeneration
        );
    }

    #[test]
    fn error_is_never_entered_or_left(phase in arb_phase(), ctx in arb_context()) {
        let decision = next_phase(phase, &ctx);
        prop_assert_eq!(decision.phase == Phase::Error, phase == Phase::Error);
    }

    #[test]
    fn more_context_never_lowers_the_outcome(
        phase in arb_phase(),
        base in prop::collection::vec(arb_delta(), 0..3),
        extra in prop::collection::vec(arb_delta(), 0..3),
    ) {
        let smaller = fold(&base);
        let mut larger = smaller.clone();
        for delta in &extra {
            larger.apply(delta);
        }
        let a = next_phase(phase, &smaller);
        let b = next_phase(phase, &larger);
        prop_assert!(rank_or_max(b.phase) >= rank_or_max(a.phase));
        prop_assert!(b.ready_for_generation || !a.ready_for_generation);
    }

    #[test]
    fn merge_order_does_not_change_sets(
        deltas in prop::collection::vec(arb_delta(), 1..5),
        seed in any::<u64>(),
    ) {
        let forward = fold(&deltas);
        let mut shuffled = deltas.clone();
        shuffled.reverse();
        let split = usize::try_from(seed % deltas.len() as u64).unwrap_or(0);
        shuffled.rotate_left(split);
        let permuted = fold(&shuffled);

        prop_assert_eq!(as_set(&forward.genres), as_set(&permuted.genres));
        prop_assert_eq!(
            as_set(&forward.learning_objectives),
            as_set(&permuted.learning_objectives)
        );
        prop_assert_eq!(as_set(&forward.cultural_focus), as_set(&permuted.cultural_focus));
        prop_assert_eq!(as_set(&forward.theory_concepts), as_set(&permuted.theory_concepts));
        prop_assert_eq!(as_set(&forward.web_research), as_set(&permuted.web_research));
    }

    #[test]
    fn sets_never_shrink_or_duplicate(
        deltas in prop::collection::vec(arb_delta(), 1..6),
    ) {
        let mut ctx = ConversationContext::default();
        for delta in &deltas {
            let before = ctx.genres.len();
            ctx.apply(delta);
            prop_assert!(ctx.genres.len() >= before);
            prop_assert_eq!(as_set(&ctx.genres).len(), ctx.genres.len());
            prop_assert_eq!(as_set(&ctx.web_research).len(), ctx.web_research.len());
        }
    }

    #[test]
    fn novel_delta_reapplied_is_empty(ctx in arb_context(), delta in arb_delta()) {
        let mut ctx = ctx;
        ctx.apply(&delta);
        let novel = ctx.apply(&delta);
        prop_assert!(novel.is_empty());
    }
}
