//! Prompt construction for assistant replies and content generation
//!
//! Each phase has its own system prompt steering what the assistant asks
//! next, and a canned fallback reply used when no model answers.

use crate::llm::ContentType;
use crate::orchestrator::SearchSummary;
use crate::state_machine::{ConversationContext, Phase, SkillLevel};
use std::fmt::Write;

/// Shared preamble of every phase prompt
const BASE_PROMPT: &str = r"You are an educational AI assistant specializing in music theory and cultural music education. You help educators create educational music mashups that combine different genres and cultural elements.

Be encouraging, educational, and culturally sensitive. Keep replies short and end with one or two focused questions.";

const INITIAL_PROMPT: &str = r"In the initial phase, your role is to:
1. Welcome the user warmly and explain your capabilities
2. Ask about their educational goals and target audience
3. Gather basic information about their interests in music
4. Set expectations for the conversation flow";

const GENRE_EXPLORATION_PROMPT: &str = r"You are in the genre exploration phase. Your role is to:
1. Help the user identify and explore different music genres
2. Discuss the cultural origins and significance of genres
3. Understand how genres can be combined educationally
4. Gather specific genre preferences, at least two genres to combine";

const EDUCATIONAL_CLARIFICATION_PROMPT: &str = r"You are in the educational clarification phase. Your role is to:
1. Determine the appropriate skill level (beginner, intermediate, advanced)
2. Clarify specific educational objectives
3. Understand the target audience (age, experience, context)
4. Identify key music theory concepts to include";

const CULTURAL_RESEARCH_PROMPT: &str = r"You are in the cultural research phase. Your role is to:
1. Deepen understanding of cultural elements in the chosen genres
2. Discuss historical and contemporary significance
3. Plan how to incorporate cultural context into the mashup
4. Consider cultural sensitivity and representation";

const READY_FOR_GENERATION_PROMPT: &str = r"You are in the ready for generation phase. Your role is to:
1. Summarize all gathered information
2. Confirm the educational approach and objectives
3. Outline what will be generated
4. Ask for any final clarifications or adjustments";

const ERROR_PROMPT: &str = r"A previous request in this conversation failed and it can no longer advance. Answer the user politely and suggest starting over with a reset.";

/// System prompt for the content generator
pub const GENERATION_SYSTEM_PROMPT: &str = r"You are an expert music educator creating educational content for the Lit Music Mashup platform. Generate accurate, culturally sensitive material with practical examples and clear explanations.";

/// Most research sources mentioned in a prompt
const MAX_SOURCES: usize = 5;

pub fn phase_prompt(phase: Phase) -> &'static str {
    match phase {
        Phase::Initial => INITIAL_PROMPT,
        Phase::GenreExploration => GENRE_EXPLORATION_PROMPT,
        Phase::EducationalClarification => EDUCATIONAL_CLARIFICATION_PROMPT,
        Phase::CulturalResearch => CULTURAL_RESEARCH_PROMPT,
        Phase::ReadyForGeneration => READY_FOR_GENERATION_PROMPT,
        Phase::Error => ERROR_PROMPT,
    }
}

/// Reply used when the language model is unavailable or fails
pub fn fallback_reply(phase: Phase) -> &'static str {
    match phase {
        Phase::Initial => "I'd love to help you create an educational music mashup! Could you tell me a bit about your goals and what kind of music interests you?",
        Phase::GenreExploration => "That's interesting! What genres of music are you most interested in exploring? We can combine different styles to create something educational and engaging.",
        Phase::EducationalClarification => "Great! What's the skill level of your students or audience? Are they beginners, intermediate, or more advanced?",
        Phase::CulturalResearch => "Excellent! What cultural elements would you like to explore? We can research the history and significance of different musical traditions.",
        Phase::ReadyForGeneration => "Perfect! Are you ready to proceed with creating the educational mashup based on what we've discussed?",
        Phase::Error => "Something went wrong with this conversation. Please reset it to start over.",
    }
}

fn join(values: impl Iterator<Item = impl AsRef<str>>) -> String {
    values
        .map(|v| v.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Human-readable summary of what has been gathered
pub fn context_summary(ctx: &ConversationContext) -> String {
    let mut out = String::new();
    if !ctx.genres.is_empty() {
        let _ = writeln!(out, "Genres: {}", join(ctx.genres.iter()));
    }
    if let Some(skill) = ctx.skill_level {
        let _ = writeln!(out, "Skill level: {skill}");
    }
    if let Some(audience) = ctx.target_audience {
        let _ = writeln!(out, "Target audience: {audience}");
    }
    if !ctx.learning_objectives.is_empty() {
        let _ = writeln!(out, "Learning objectives: {}", join(ctx.learning_objectives.iter()));
    }
    if !ctx.theory_concepts.is_empty() {
        let _ = writeln!(out, "Theory concepts: {}", join(ctx.theory_concepts.iter()));
    }
    if !ctx.cultural_focus.is_empty() {
        let _ = writeln!(out, "Cultural focus: {}", join(ctx.cultural_focus.iter()));
    }
    if ctx.cultural_sensitivity == Some(true) {
        let _ = writeln!(out, "Cultural sensitivity requested: yes");
    }
    if out.is_empty() {
        out.push_str("Nothing gathered yet.\n");
    }
    out
}

/// Numbered list of the sources found this turn
pub fn sources_digest(summary: &SearchSummary) -> Option<String> {
    if summary.results.is_empty() {
        return None;
    }
    let mut out = String::new();
    for (i, result) in summary.results.iter().take(MAX_SOURCES).enumerate() {
        let _ = writeln!(out, "{}. {} ({})", i + 1, result.title, result.url);
    }
    Some(out)
}

/// System prompt for an assistant reply in `phase`
pub fn reply_system_prompt(
    phase: Phase,
    ctx: &ConversationContext,
    research: &SearchSummary,
) -> String {
    let mut prompt = format!(
        "{BASE_PROMPT}\n\n{}\n\nWhat you know so far:\n{}",
        phase_prompt(phase),
        context_summary(ctx)
    );
    if let Some(digest) = sources_digest(research) {
        let _ = write!(prompt, "\nSources found for this message:\n{digest}");
    }
    prompt
}

fn skill_guidance(skill: SkillLevel) -> &'static str {
    match skill {
        SkillLevel::Beginner => "Explain in simple terms suitable for beginners with no prior music theory knowledge.",
        SkillLevel::Intermediate => "Provide intermediate-level explanations with some technical depth and practical examples.",
        SkillLevel::Advanced => "Offer advanced-level content with detailed technical analysis and sophisticated concepts.",
    }
}

fn content_guidance(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::TheoryLesson => "Create an educational music theory lesson that covers fundamental concepts.",
        ContentType::CulturalContext => "Provide cultural and historical context for the musical concepts discussed.",
        ContentType::PracticalExercise => "Design practical exercises and activities for hands-on learning.",
        ContentType::HistoricalBackground => "Present historical background and evolution of musical concepts.",
        ContentType::CompositionGuide => "Offer guidance on composition techniques and creative approaches.",
        ContentType::Analysis => "Provide detailed analysis of musical works or concepts.",
        ContentType::TeachingNotes => "Create comprehensive teaching notes for educators.",
    }
}

/// Build the context-enhanced prompt handed to the content generator.
pub fn build_generation_prompt(
    request: &str,
    content_type: ContentType,
    skill: SkillLevel,
    ctx: &ConversationContext,
) -> String {
    let mut prompt = format!(
        "USER REQUEST: {request}\nCONTENT TYPE: {content_type}\nSKILL LEVEL: {skill}\n\n{}\n{}\n\nCONTEXT INFORMATION:\n{}",
        skill_guidance(skill),
        content_guidance(content_type),
        context_summary(ctx),
    );

    prompt.push_str("\nWEB SOURCES:\n");
    if ctx.web_research.is_empty() {
        prompt.push_str("No web sources available.\n");
    } else {
        for (i, url) in ctx.web_research.iter().take(MAX_SOURCES).enumerate() {
            let _ = writeln!(prompt, "{}. {url}", i + 1);
        }
    }

    prompt.push_str(
        "\nINSTRUCTIONS:
1. Generate content appropriate for the specified skill level
2. Incorporate the context and web sources naturally
3. Ensure cultural sensitivity and accuracy
4. Structure the content for easy comprehension
5. Include teaching notes where appropriate",
    );
    prompt
}
