//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::db::{Conversation, Message, ToolCall, ToolCallOutcome, ToolCallStatus};
use crate::llm::{GeneratedContent, GenerationRequest, LlmError, LlmRequest, LlmResponse};
use crate::search::{RawSearchResult, SearchError, SearchOptions, SearchProvider};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
#[allow(dead_code)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

#[allow(dead_code)]
impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, text: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(LlmResponse::from_text(text)));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::unavailable("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Content Generator
// ============================================================================

/// Content generator that echoes the prompt or returns queued errors
#[allow(dead_code)]
pub struct MockContentGenerator {
    errors: Mutex<VecDeque<LlmError>>,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

#[allow(dead_code)]
impl MockContentGenerator {
    pub fn new() -> Self {
        Self {
            errors: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next generation with `error`
    pub fn queue_error(&self, error: LlmError) {
        self.errors.lock().unwrap().push_back(error);
    }

    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockContentGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentGenerator for MockContentGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedContent, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(error) = self.errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(GeneratedContent {
            content: format!("Lesson: {}", request.prompt.lines().next().unwrap_or_default()),
            content_type: request.content_type,
            skill_level: request.skill_level,
            model: "mock-generator".to_string(),
        })
    }
}

// ============================================================================
// Mock Search Provider
// ============================================================================

#[derive(Default)]
struct SearchRule {
    delay: Option<Duration>,
    response: Option<Result<Vec<RawSearchResult>, SearchError>>,
}

/// Search provider scripted by query prefix.
///
/// Queries with no matching rule answer immediately with no results.
#[allow(dead_code)]
pub struct MockSearchProvider {
    rules: Vec<(String, SearchRule)>,
    queries: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl MockSearchProvider {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            queries: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn rule(&mut self, prefix: &str) -> &mut SearchRule {
        let index = match self.rules.iter().position(|(p, _)| p == prefix) {
            Some(index) => index,
            None => {
                self.rules.push((prefix.to_string(), SearchRule::default()));
                self.rules.len() - 1
            }
        };
        &mut self.rules[index].1
    }

    /// Answer queries starting with `prefix` with `results`
    pub fn with_results(mut self, prefix: &str, results: Vec<RawSearchResult>) -> Self {
        self.rule(prefix).response = Some(Ok(results));
        self
    }

    /// Delay answers to queries starting with `prefix`
    pub fn with_delay(mut self, prefix: &str, delay: Duration) -> Self {
        self.rule(prefix).delay = Some(delay);
        self
    }

    /// Fail queries starting with `prefix`
    pub fn with_error(mut self, prefix: &str, error: SearchError) -> Self {
        self.rule(prefix).response = Some(Err(error));
        self
    }

    /// Queries received, in arrival order
    pub fn recorded_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Highest number of searches observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(
        &self,
        query: &str,
        _options: &SearchOptions,
    ) -> Result<Vec<RawSearchResult>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let rule = self
            .rules
            .iter()
            .find(|(prefix, _)| query.starts_with(prefix.as_str()))
            .map(|(_, rule)| rule);
        if let Some(delay) = rule.and_then(|r| r.delay) {
            tokio::time::sleep(delay).await;
        }
        rule.and_then(|r| r.response.clone())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// In-memory store with switchable failures
#[allow(dead_code)]
pub struct InMemoryStore {
    conversations: Mutex<HashMap<String, Conversation>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
    tool_calls: Mutex<Vec<ToolCall>>,
    fail_commits: AtomicBool,
    fail_tool_call_writes: AtomicBool,
}

#[allow(dead_code)]
impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            messages: Mutex::new(HashMap::new()),
            tool_calls: Mutex::new(Vec::new()),
            fail_commits: AtomicBool::new(false),
            fail_tool_call_writes: AtomicBool::new(false),
        }
    }

    /// Insert a fresh conversation
    pub fn seed(&self, id: &str) {
        self.conversations
            .lock()
            .unwrap()
            .insert(id.to_string(), Conversation::new(id));
    }

    /// Replace a stored conversation wholesale
    pub fn put(&self, conversation: Conversation) {
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation.id.clone(), conversation);
    }

    pub fn conversation(&self, id: &str) -> Option<Conversation> {
        self.conversations.lock().unwrap().get(id).cloned()
    }

    pub fn all_messages(&self, id: &str) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_tool_call_writes(&self, fail: bool) {
        self.fail_tool_call_writes.store(fail, Ordering::SeqCst);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.conversation(id))
    }

    async fn create(&self, id: &str) -> Result<Conversation, StoreError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id))
            .clone())
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let mut conversations = self.conversations.lock().unwrap();
        if !conversations.contains_key(&conversation.id) {
            return Err(StoreError::NotFound(conversation.id.clone()));
        }
        let mut saved = conversation.clone();
        saved.updated_at = Utc::now();
        conversations.insert(saved.id.clone(), saved);
        Ok(())
    }

    async fn append_message(&self, message: &Message) -> Result<(), StoreError> {
        self.messages
            .lock()
            .unwrap()
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn commit_turn(
        &self,
        conversation: &Conversation,
        messages: &[Message],
    ) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }
        self.save(conversation).await?;
        for message in messages {
            self.append_message(message).await?;
        }
        Ok(())
    }

    async fn recent_messages(&self, id: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
        let all = self.all_messages(id);
        let skip = all.len().saturating_sub(limit);
        Ok(all.into_iter().skip(skip).collect())
    }

    async fn message_count(&self, id: &str) -> Result<usize, StoreError> {
        Ok(self.all_messages(id).len())
    }
}

#[async_trait]
impl ToolCallStore for InMemoryStore {
    async fn append_tool_call(&self, call: &ToolCall) -> Result<(), StoreError> {
        if self.fail_tool_call_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected tool call failure".to_string()));
        }
        self.tool_calls.lock().unwrap().push(call.clone());
        Ok(())
    }

    async fn finish_tool_call(&self, id: &str, outcome: &ToolCallOutcome) -> Result<(), StoreError> {
        let mut calls = self.tool_calls.lock().unwrap();
        let call = calls
            .iter_mut()
            .find(|c| c.id == id && c.status == ToolCallStatus::Pending)
            .ok_or_else(|| StoreError::Backend(format!("tool call not pending: {id}")))?;
        call.status = outcome.status();
        call.completed_at = Some(Utc::now());
        match outcome {
            ToolCallOutcome::Completed { result_summary } => {
                call.result_summary = Some(result_summary.clone());
            }
            ToolCallOutcome::Failed { error } => call.error = Some(error.clone()),
        }
        Ok(())
    }

    async fn tool_calls(&self, conversation_id: &str) -> Result<Vec<ToolCall>, StoreError> {
        Ok(self
            .tool_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.conversation_id == conversation_id)
            .cloned()
            .collect())
    }
}
