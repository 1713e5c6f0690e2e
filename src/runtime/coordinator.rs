//! Conversation coordinator
//!
//! Runs one turn end to end: validate, serialize on the session, extract,
//! research, transition, reply, commit. The store sees either the whole
//! turn or nothing of it.

use super::locks::SessionLocks;
use super::traits::{ContentGenerator, LlmClient, Storage, StoreError};
use super::validation::{sanitize_message, validate_session_id, ValidationError};
use crate::config::TurnSettings;
use crate::db::{Conversation, Message, MessageRole, ToolCallRef, ToolStats};
use crate::extractor::PhaseExtractors;
use crate::llm::{
    ContentType, GeneratedContent, GenerationRequest, LlmError, LlmMessage, LlmRequest,
};
use crate::orchestrator::{
    summarize, SearchBatch, SearchSummary, ToolCallResult, ToolOrchestrator, TurnBudget,
};
use crate::search::derive_queries;
use crate::state_machine::{
    next_phase, upstream_failure, ContextDelta, ConversationContext, Phase, SkillLevel,
};
use crate::system_prompt::{build_generation_prompt, fallback_reply, reply_system_prompt};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Token budget for conversational replies
const REPLY_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
    #[error("storage failure: {0}")]
    Storage(StoreError),
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("conversation not found: {0}")]
    NotFound(String),
    #[error("conversation {0} is not ready for generation")]
    NotReady(String),
    #[error("content generation failed: {0}")]
    Generation(LlmError),
    #[error("turn cancelled")]
    Cancelled,
}

impl From<StoreError> for TurnError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Corrupt(msg) => TurnError::Invariant(msg),
            other => TurnError::Storage(other),
        }
    }
}

/// Outcome of a successful turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub session_id: String,
    pub response: String,
    pub phase: Phase,
    pub previous_phase: Phase,
    pub ready_for_generation: bool,
    pub context: ConversationContext,
    pub tool_call_results: Vec<ToolCallResult>,
    pub search_summary: SearchSummary,
    /// The reply is canned because no model answered
    pub fallback_reply: bool,
}

/// Read-only snapshot of a conversation
#[derive(Debug, Clone, Serialize)]
pub struct ConversationView {
    pub conversation: Conversation,
    pub message_count: usize,
    pub tool_call_count: usize,
    pub recent_messages: Vec<Message>,
    pub tool_stats: ToolStats,
}

#[derive(Debug, Clone)]
pub struct GenerateInput {
    pub prompt: String,
    pub content_type: ContentType,
}

struct Reply {
    text: String,
    fallback: bool,
}

pub struct ConversationCoordinator<S: Storage, L: LlmClient, G: ContentGenerator> {
    store: S,
    llm: L,
    generator: G,
    orchestrator: ToolOrchestrator,
    extractors: PhaseExtractors,
    locks: SessionLocks,
    settings: TurnSettings,
}

impl<S: Storage, L: LlmClient, G: ContentGenerator> ConversationCoordinator<S, L, G> {
    pub fn new(
        store: S,
        llm: L,
        generator: G,
        orchestrator: ToolOrchestrator,
        settings: TurnSettings,
    ) -> Self {
        Self {
            store,
            llm,
            generator,
            orchestrator,
            extractors: PhaseExtractors::default(),
            locks: SessionLocks::new(),
            settings,
        }
    }

    /// Swap the per-phase extraction strategies
    #[allow(dead_code)] // Extension point, exercised in tests
    pub fn with_extractors(mut self, extractors: PhaseExtractors) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn search_available(&self) -> bool {
        self.orchestrator.gateway().is_available()
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }
}

impl<S, L, G> ConversationCoordinator<S, L, G>
where
    S: Storage + 'static,
    L: LlmClient + 'static,
    G: ContentGenerator + 'static,
{
    /// Process one user message.
    ///
    /// Turns on the same session are serialized. The turn runs on its own
    /// task: dropping the returned future cancels searches still in flight,
    /// finalises their records and discards the turn without committing.
    pub async fn process_turn(
        self: &Arc<Self>,
        session_id: &str,
        user_message: &str,
    ) -> Result<TurnResult, TurnError> {
        validate_session_id(session_id)?;
        let message = sanitize_message(user_message, self.settings.max_message_chars)?;

        let cancel = CancellationToken::new();
        let _cancel_on_drop = cancel.clone().drop_guard();
        let this = Arc::clone(self);
        let session = session_id.to_string();
        let turn = tokio::spawn(async move { this.locked_turn(&session, &message, cancel).await });

        match turn.await {
            Ok(result) => result,
            Err(e) => Err(TurnError::Invariant(format!("turn task failed: {e}"))),
        }
    }

    async fn locked_turn(
        &self,
        session_id: &str,
        message: &str,
        cancel: CancellationToken,
    ) -> Result<TurnResult, TurnError> {
        let _session = self.locks.acquire(session_id).await;
        if cancel.is_cancelled() {
            tracing::info!(conv_id = %session_id, "Turn cancelled while queued");
            return Err(TurnError::Cancelled);
        }
        let budget = TurnBudget {
            cancel,
            deadline: self.settings.timeout.map(|t| Instant::now() + t),
        };

        let started = Instant::now();
        let result = self.run_turn(session_id, message, &budget).await;
        match &result {
            Ok(turn) => tracing::info!(
                conv_id = %session_id,
                from = %turn.previous_phase,
                to = %turn.phase,
                ready = turn.ready_for_generation,
                searches = turn.tool_call_results.len(),
                duration_ms = %started.elapsed().as_millis(),
                "Turn completed"
            ),
            Err(TurnError::Cancelled) => tracing::warn!(
                conv_id = %session_id,
                duration_ms = %started.elapsed().as_millis(),
                "Turn cancelled, nothing committed"
            ),
            Err(e) => tracing::error!(conv_id = %session_id, error = %e, "Turn aborted"),
        }
        result
    }
}

impl<S: Storage, L: LlmClient, G: ContentGenerator> ConversationCoordinator<S, L, G> {
    async fn run_turn(
        &self,
        session_id: &str,
        message: &str,
        budget: &TurnBudget,
    ) -> Result<TurnResult, TurnError> {
        let mut conversation = match self.store.get(session_id).await? {
            Some(conversation) => conversation,
            None => {
                tracing::info!(conv_id = %session_id, "Creating conversation");
                self.store.create(session_id).await?
            }
        };
        let previous_phase = conversation.phase;
        let was_ready = conversation.ready_for_generation;
        let history = self
            .store
            .recent_messages(session_id, self.settings.history_window)
            .await?;

        let delta = self.extractors.extract(previous_phase, message);
        let novel = conversation.context.apply(&delta);
        tracing::debug!(conv_id = %session_id, phase = %previous_phase, ?novel, "Context extracted");

        let batch = SearchBatch {
            conversation_id: session_id,
            queries: derive_queries(&novel),
            context: conversation.context.clone(),
        };
        let tool_call_results = self
            .orchestrator
            .run_searches(&self.store, batch, budget)
            .await?;
        let search_summary = summarize(&tool_call_results);
        conversation
            .context
            .apply(&ContextDelta::research(search_summary.urls()));

        let decision = next_phase(previous_phase, &conversation.context);
        if decision.phase != previous_phase {
            tracing::info!(
                conv_id = %session_id,
                from = %previous_phase,
                to = %decision.phase,
                "Phase changed"
            );
        }
        conversation.phase = decision.phase;
        conversation.ready_for_generation = was_ready || decision.ready_for_generation;
        conversation.updated_at = Utc::now();

        let reply = self
            .reply(&conversation, &search_summary, &history, message, budget)
            .await;

        let refs: Vec<ToolCallRef> = tool_call_results
            .iter()
            .map(|r| ToolCallRef {
                id: r.tool_call_id.clone(),
                query: r.query.clone(),
            })
            .collect();
        if budget.cancel.is_cancelled() {
            return Err(TurnError::Cancelled);
        }
        let messages = [
            Message::user(session_id, message),
            Message::assistant(session_id, reply.text.clone(), refs),
        ];
        self.store.commit_turn(&conversation, &messages).await?;

        Ok(TurnResult {
            session_id: session_id.to_string(),
            response: reply.text,
            phase: conversation.phase,
            previous_phase,
            ready_for_generation: conversation.ready_for_generation,
            context: conversation.context,
            tool_call_results,
            search_summary,
            fallback_reply: reply.fallback,
        })
    }

    /// Ask the model for a reply; any failure yields the phase's fallback.
    async fn reply(
        &self,
        conversation: &Conversation,
        research: &SearchSummary,
        history: &[Message],
        message: &str,
        budget: &TurnBudget,
    ) -> Reply {
        let mut messages: Vec<LlmMessage> = history
            .iter()
            .filter_map(|m| match m.role {
                MessageRole::User => Some(LlmMessage::user(m.content.as_str())),
                MessageRole::Assistant => Some(LlmMessage::assistant(m.content.as_str())),
                MessageRole::System => None,
            })
            .collect();
        messages.push(LlmMessage::user(message));

        let request = LlmRequest {
            system: reply_system_prompt(conversation.phase, &conversation.context, research),
            messages,
            max_tokens: Some(REPLY_MAX_TOKENS),
            temperature: Some(0.7),
        };

        let call = async {
            match budget.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, self.llm.complete(&request))
                    .await
                    .unwrap_or_else(|_| Err(LlmError::network("turn deadline reached"))),
                None => self.llm.complete(&request).await,
            }
        };
        let outcome = tokio::select! {
            biased;
            () = budget.cancel.cancelled() => Err(LlmError::unavailable("turn cancelled")),
            outcome = call => outcome,
        };

        match outcome {
            Ok(response) if !response.text.trim().is_empty() => Reply {
                text: response.text.trim().to_string(),
                fallback: false,
            },
            Ok(_) => Reply {
                text: fallback_reply(conversation.phase).to_string(),
                fallback: true,
            },
            Err(e) => {
                tracing::warn!(
                    conv_id = %conversation.id,
                    model = self.llm.model_id(),
                    error = %e,
                    "Reply generation failed, using fallback"
                );
                Reply {
                    text: fallback_reply(conversation.phase).to_string(),
                    fallback: true,
                }
            }
        }
    }

    /// Read-only snapshot. Takes no session lock.
    pub async fn get_session(&self, session_id: &str) -> Result<ConversationView, TurnError> {
        validate_session_id(session_id)?;
        let conversation = self
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| TurnError::NotFound(session_id.to_string()))?;
        let message_count = self.store.message_count(session_id).await?;
        let recent_messages = self
            .store
            .recent_messages(session_id, self.settings.history_window)
            .await?;
        let tool_stats = self.store.tool_stats(session_id).await?;

        Ok(ConversationView {
            conversation,
            message_count,
            tool_call_count: tool_stats.total,
            recent_messages,
            tool_stats,
        })
    }

    /// Forget gathered context and start over from `Initial`.
    ///
    /// Message and tool call history are kept. This is the only way out of
    /// `Error` and the only way readiness is cleared.
    pub async fn reset_session(&self, session_id: &str) -> Result<Conversation, TurnError> {
        validate_session_id(session_id)?;
        let _session = self.locks.acquire(session_id).await;

        let mut conversation = self
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| TurnError::NotFound(session_id.to_string()))?;
        let previous_phase = conversation.phase;
        conversation.phase = Phase::Initial;
        conversation.context = ConversationContext::default();
        conversation.ready_for_generation = false;
        conversation.updated_at = Utc::now();
        self.store.save(&conversation).await?;

        tracing::info!(conv_id = %session_id, from = %previous_phase, "Conversation reset");
        Ok(conversation)
    }

    /// Generate educational content for a ready conversation.
    ///
    /// An unrecoverable generator failure moves the conversation to `Error`.
    /// Transient failures leave it untouched.
    pub async fn generate(
        &self,
        session_id: &str,
        input: GenerateInput,
    ) -> Result<GeneratedContent, TurnError> {
        validate_session_id(session_id)?;
        let prompt = sanitize_message(&input.prompt, self.settings.max_message_chars)?;
        let _session = self.locks.acquire(session_id).await;

        let mut conversation = self
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| TurnError::NotFound(session_id.to_string()))?;
        if !conversation.ready_for_generation || conversation.phase.is_error() {
            return Err(TurnError::NotReady(session_id.to_string()));
        }

        let skill_level = conversation
            .context
            .skill_level
            .unwrap_or(SkillLevel::Beginner);
        let request = GenerationRequest {
            prompt: build_generation_prompt(
                &prompt,
                input.content_type,
                skill_level,
                &conversation.context,
            ),
            content_type: input.content_type,
            skill_level,
            context: conversation.context.clone(),
        };

        let started = Instant::now();
        match self.generator.generate(&request).await {
            Ok(content) => {
                tracing::info!(
                    conv_id = %session_id,
                    content_type = %content.content_type,
                    model = %content.model,
                    duration_ms = %started.elapsed().as_millis(),
                    "Content generated"
                );
                Ok(content)
            }
            Err(e) if e.kind.is_unrecoverable() => {
                let decision = upstream_failure(conversation.phase);
                conversation.phase = decision.phase;
                conversation.updated_at = Utc::now();
                self.store.save(&conversation).await?;
                tracing::error!(conv_id = %session_id, error = %e, "Generation failed permanently");
                Err(TurnError::Generation(e))
            }
            Err(e) => {
                tracing::warn!(conv_id = %session_id, error = %e, "Generation failed");
                Err(TurnError::Generation(e))
            }
        }
    }
}
