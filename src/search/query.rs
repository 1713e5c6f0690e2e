//! Search query construction
//!
//! Queries are derived from what a turn newly learned, then enhanced with
//! the accumulated context so results lean toward educational sources.

use crate::state_machine::{ContextDelta, ConversationContext, SkillLevel};

/// Appended to every enhanced query
const EDUCATIONAL_SUFFIX: &str = "educational content music education";

/// How many cultural elements and genres are folded into a query
const CONTEXT_TERMS: usize = 2;

/// Build the provider-facing query from the user-facing one.
pub fn enhance_query(query: &str, context: &ConversationContext) -> String {
    let mut parts = vec![query.to_string()];

    match context.skill_level {
        Some(SkillLevel::Beginner) => parts.push("music theory basics".to_string()),
        Some(SkillLevel::Intermediate | SkillLevel::Advanced) => {
            parts.push("advanced music theory".to_string());
        }
        None => {}
    }

    parts.extend(
        context
            .cultural_focus
            .iter()
            .take(CONTEXT_TERMS)
            .map(|element| format!("cultural significance {element}")),
    );
    parts.extend(
        context
            .genres
            .iter()
            .take(CONTEXT_TERMS)
            .map(|genre| format!("{genre} music history")),
    );
    parts.push(EDUCATIONAL_SUFFIX.to_string());

    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Research queries for the entries a turn newly recorded.
///
/// Entries already known before the turn generate nothing, so repeating a
/// genre does not repeat its research. Duplicate queries are dropped.
pub fn derive_queries(novel: &ContextDelta) -> Vec<String> {
    let candidates = novel
        .genres
        .iter()
        .map(|genre| format!("{genre} music history cultural significance educational"))
        .chain(
            novel
                .cultural_focus
                .iter()
                .map(|element| format!("{element} music culture history significance")),
        )
        .chain(
            novel
                .theory_concepts
                .iter()
                .map(|concept| format!("{concept} music theory lesson")),
        );

    let mut queries: Vec<String> = Vec::new();
    for query in candidates {
        if !queries.contains(&query) {
            queries.push(query);
        }
    }
    queries
}
