//! Common types for LLM interactions

use crate::state_machine::{ConversationContext, SkillLevel};
use serde::{Deserialize, Serialize};
use std::fmt;

/// LLM request
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: String,
    pub messages: Vec<LlmMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Message author as seen by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq)]
pub struct LlmMessage {
    pub role: ChatRole,
    pub content: String,
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// LLM response
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Usage,
}

impl LlmResponse {
    #[allow(dead_code)] // Used by mocks
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: Usage::default(),
        }
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

// ============================================================================
// Content generation
// ============================================================================

/// Kind of educational material to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    TheoryLesson,
    CulturalContext,
    PracticalExercise,
    HistoricalBackground,
    CompositionGuide,
    Analysis,
    TeachingNotes,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::TheoryLesson => "theory_lesson",
            ContentType::CulturalContext => "cultural_context",
            ContentType::PracticalExercise => "practical_exercise",
            ContentType::HistoricalBackground => "historical_background",
            ContentType::CompositionGuide => "composition_guide",
            ContentType::Analysis => "analysis",
            ContentType::TeachingNotes => "teaching_notes",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the content generator, built once a conversation is ready
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Context-enhanced prompt
    pub prompt: String,
    pub content_type: ContentType,
    pub skill_level: SkillLevel,
    pub context: ConversationContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedContent {
    pub content: String,
    pub content_type: ContentType,
    pub skill_level: SkillLevel,
    pub model: String,
}
