//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the coordinator with mock implementations.

use crate::db::{
    Conversation, Database, DbError, Message, ToolCall, ToolCallOutcome, ToolStats,
};
use crate::llm::{
    ChatRole, GeneratedContent, GenerationRequest, LlmError, LlmMessage, LlmRequest, LlmResponse,
    LlmService,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

/// Failure of the conversation store. Always fatal to the current turn.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("conversation not found: {0}")]
    NotFound(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ConversationNotFound(id) => StoreError::NotFound(id),
            DbError::Corrupt(msg) => StoreError::Corrupt(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Storage for conversations and their message history
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load a conversation, `None` if it was never created
    async fn get(&self, id: &str) -> Result<Option<Conversation>, StoreError>;

    /// Create a conversation in its initial state; existing ones are returned as-is
    async fn create(&self, id: &str) -> Result<Conversation, StoreError>;

    /// Persist the mutable fields of a conversation
    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError>;

    /// Append a message to the history
    #[allow(dead_code)] // Single-message path; turns use commit_turn
    async fn append_message(&self, message: &Message) -> Result<(), StoreError>;

    /// Save the conversation and append messages as one atomic write
    async fn commit_turn(
        &self,
        conversation: &Conversation,
        messages: &[Message],
    ) -> Result<(), StoreError>;

    /// Last `limit` messages, oldest first
    async fn recent_messages(&self, id: &str, limit: usize) -> Result<Vec<Message>, StoreError>;

    async fn message_count(&self, id: &str) -> Result<usize, StoreError>;
}

/// Storage for tool call audit records
#[async_trait]
pub trait ToolCallStore: Send + Sync {
    /// Record a dispatched call (status `pending`)
    async fn append_tool_call(&self, call: &ToolCall) -> Result<(), StoreError>;

    /// Finalise a pending call exactly once
    async fn finish_tool_call(&self, id: &str, outcome: &ToolCallOutcome) -> Result<(), StoreError>;

    async fn tool_calls(&self, conversation_id: &str) -> Result<Vec<ToolCall>, StoreError>;

    async fn tool_stats(&self, conversation_id: &str) -> Result<ToolStats, StoreError> {
        Ok(ToolStats::from_calls(&self.tool_calls(conversation_id).await?))
    }
}

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete an LLM request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Produces educational content once a conversation is ready
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedContent, LlmError>;
}

/// Combined storage trait for convenience
pub trait Storage: ConversationStore + ToolCallStore {}
impl<T: ConversationStore + ToolCallStore> Storage for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn get(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        (**self).get(id).await
    }

    async fn create(&self, id: &str) -> Result<Conversation, StoreError> {
        (**self).create(id).await
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        (**self).save(conversation).await
    }

    async fn append_message(&self, message: &Message) -> Result<(), StoreError> {
        (**self).append_message(message).await
    }

    async fn commit_turn(
        &self,
        conversation: &Conversation,
        messages: &[Message],
    ) -> Result<(), StoreError> {
        (**self).commit_turn(conversation, messages).await
    }

    async fn recent_messages(&self, id: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
        (**self).recent_messages(id, limit).await
    }

    async fn message_count(&self, id: &str) -> Result<usize, StoreError> {
        (**self).message_count(id).await
    }
}

#[async_trait]
impl<T: ToolCallStore + ?Sized> ToolCallStore for Arc<T> {
    async fn append_tool_call(&self, call: &ToolCall) -> Result<(), StoreError> {
        (**self).append_tool_call(call).await
    }

    async fn finish_tool_call(&self, id: &str, outcome: &ToolCallOutcome) -> Result<(), StoreError> {
        (**self).finish_tool_call(id, outcome).await
    }

    async fn tool_calls(&self, conversation_id: &str) -> Result<Vec<ToolCall>, StoreError> {
        (**self).tool_calls(conversation_id).await
    }

    async fn tool_stats(&self, conversation_id: &str) -> Result<ToolStats, StoreError> {
        (**self).tool_stats(conversation_id).await
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

#[async_trait]
impl<T: ContentGenerator + ?Sized> ContentGenerator for Arc<T> {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedContent, LlmError> {
        (**self).generate(request).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as Storage
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationStore for DatabaseStore {
    async fn get(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.db.find_conversation(id)?)
    }

    async fn create(&self, id: &str) -> Result<Conversation, StoreError> {
        Ok(self.db.create_conversation(id)?)
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        Ok(self.db.save_conversation(conversation)?)
    }

    async fn append_message(&self, message: &Message) -> Result<(), StoreError> {
        Ok(self.db.add_message(message)?)
    }

    async fn commit_turn(
        &self,
        conversation: &Conversation,
        messages: &[Message],
    ) -> Result<(), StoreError> {
        Ok(self.db.commit_turn(conversation, messages)?)
    }

    async fn recent_messages(&self, id: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
        Ok(self.db.recent_messages(id, limit)?)
    }

    async fn message_count(&self, id: &str) -> Result<usize, StoreError> {
        Ok(self.db.message_count(id)?)
    }
}

#[async_trait]
impl ToolCallStore for DatabaseStore {
    async fn append_tool_call(&self, call: &ToolCall) -> Result<(), StoreError> {
        Ok(self.db.add_tool_call(call)?)
    }

    async fn finish_tool_call(&self, id: &str, outcome: &ToolCallOutcome) -> Result<(), StoreError> {
        Ok(self.db.finish_tool_call(id, outcome, Utc::now())?)
    }

    async fn tool_calls(&self, conversation_id: &str) -> Result<Vec<ToolCall>, StoreError> {
        Ok(self.db.get_tool_calls(conversation_id)?)
    }

    async fn tool_stats(&self, conversation_id: &str) -> Result<ToolStats, StoreError> {
        Ok(self.db.tool_stats(conversation_id)?)
    }
}

/// LLM client over an optional configured service
#[derive(Clone)]
pub struct ConfiguredLlmClient {
    service: Option<Arc<dyn LlmService>>,
}

impl ConfiguredLlmClient {
    pub fn new(service: Option<Arc<dyn LlmService>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LlmClient for ConfiguredLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match &self.service {
            Some(service) => service.complete(request).await,
            None => Err(LlmError::unavailable("No language model configured")),
        }
    }

    fn model_id(&self) -> &str {
        self.service.as_ref().map_or("none", |s| s.model_id())
    }
}

/// Content generator backed by an LLM client
pub struct LlmContentGenerator<L: LlmClient> {
    llm: L,
    max_tokens: u32,
}

impl<L: LlmClient> LlmContentGenerator<L> {
    pub fn new(llm: L) -> Self {
        Self {
            llm,
            max_tokens: 2000,
        }
    }
}

#[async_trait]
impl<L: LlmClient> ContentGenerator for LlmContentGenerator<L> {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedContent, LlmError> {
        let llm_request = LlmRequest {
            system: crate::system_prompt::GENERATION_SYSTEM_PROMPT.to_string(),
            messages: vec![LlmMessage {
                role: ChatRole::User,
                content: request.prompt.clone(),
            }],
            max_tokens: Some(self.max_tokens),
            temperature: Some(0.7),
        };
        let response = self.llm.complete(&llm_request).await?;
        Ok(GeneratedContent {
            content: response.text,
            content_type: request.content_type,
            skill_level: request.skill_level,
            model: self.llm.model_id().to_string(),
        })
    }
}
