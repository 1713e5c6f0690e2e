//! API request and response types

use crate::db::Conversation;
use crate::llm::ContentType;
use serde::{Deserialize, Serialize};

/// Request to process one user message
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

/// Request to generate content for a ready conversation
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub content_type: ContentType,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub search_available: bool,
    pub model: String,
}

/// Response with a single conversation
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation: Conversation,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
