//! Database schema and types

use crate::state_machine::{ConversationContext, Phase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    phase TEXT NOT NULL DEFAULT 'initial',
    context TEXT NOT NULL DEFAULT '{}',
    ready_for_generation BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_updated ON conversations(updated_at DESC);

CREATE TABLE IF NOT EXISTS messages (
    sequence_id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id TEXT NOT NULL UNIQUE,
    conversation_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    tool_calls TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, sequence_id);

CREATE TABLE IF NOT EXISTS tool_calls (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    query TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    result_summary TEXT,
    error TEXT,
    started_at TEXT NOT NULL,
    completed_at TEXT,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_tool_calls_conversation ON tool_calls(conversation_id, started_at);
CREATE INDEX IF NOT EXISTS idx_tool_calls_status ON tool_calls(status);
";

/// Conversation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub phase: Phase,
    pub context: ConversationContext,
    pub ready_for_generation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            phase: Phase::Initial,
            context: ConversationContext::default(),
            ready_for_generation: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            "system" => Some(MessageRole::System),
            _ => None,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference from a message to a tool call made during its turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRef {
    pub id: String,
    pub query: String,
}

/// Immutable conversation history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRef>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(conversation_id: &str, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn user(conversation_id: &str, content: impl Into<String>) -> Self {
        Self::new(conversation_id, MessageRole::User, content)
    }

    pub fn assistant(
        conversation_id: &str,
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRef>,
    ) -> Self {
        Self {
            tool_calls,
            ..Self::new(conversation_id, MessageRole::Assistant, content)
        }
    }

    #[allow(dead_code)] // Constructor for API completeness
    pub fn system(conversation_id: &str, content: impl Into<String>) -> Self {
        Self::new(conversation_id, MessageRole::System, content)
    }
}

/// Lifecycle of a dispatched search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Completed,
    Failed,
}

impl ToolCallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolCallStatus::Pending => "pending",
            ToolCallStatus::Completed => "completed",
            ToolCallStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ToolCallStatus::Pending),
            "completed" => Some(ToolCallStatus::Completed),
            "failed" => Some(ToolCallStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ToolCallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of one search dispatched during a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub conversation_id: String,
    pub query: String,
    pub status: ToolCallStatus,
    pub result_summary: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ToolCall {
    pub fn pending(conversation_id: &str, query: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            query: query.into(),
            status: ToolCallStatus::Pending,
            result_summary: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn to_ref(&self) -> ToolCallRef {
        ToolCallRef {
            id: self.id.clone(),
            query: self.query.clone(),
        }
    }
}

/// Final state of a tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCallOutcome {
    Completed { result_summary: String },
    Failed { error: String },
}

impl ToolCallOutcome {
    pub fn status(&self) -> ToolCallStatus {
        match self {
            ToolCallOutcome::Completed { .. } => ToolCallStatus::Completed,
            ToolCallOutcome::Failed { .. } => ToolCallStatus::Failed,
        }
    }
}

/// Per-conversation tool usage counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub pending: usize,
    pub success_rate: f64,
}

impl ToolStats {
    pub fn from_calls(calls: &[ToolCall]) -> Self {
        let count = |status| calls.iter().filter(|c| c.status == status).count();
        let successful = count(ToolCallStatus::Completed);
        let failed = count(ToolCallStatus::Failed);
        let pending = count(ToolCallStatus::Pending);
        let total = calls.len();
        #[allow(clippy::cast_precision_loss)] // Counts stay far below 2^52
        let success_rate = if total == 0 {
            0.0
        } else {
            successful as f64 / total as f64
        };
        Self {
            total,
            successful,
            failed,
            pending,
            success_rate,
        }
    }
}
