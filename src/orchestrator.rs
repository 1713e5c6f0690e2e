//! Tool orchestrator
//!
//! Runs the searches of one turn concurrently under a shared semaphore and
//! waits for every branch to finish, fail or time out. Failures are data:
//! each query yields a `ToolCallResult` and a finalised `ToolCall` record.
//! The only error this module returns is a store failure while recording.

use crate::db::{ToolCall, ToolCallOutcome};
use crate::runtime::{StoreError, ToolCallStore};
use crate::search::{ScoredResult, SearchError, SearchErrorKind, SearchGateway, SearchResults, SearchStatus};
use crate::state_machine::ConversationContext;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Outcome of one search in a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_query: Option<String>,
    pub results: Vec<ScoredResult>,
    pub success: bool,
    /// False when the gateway had no provider configured
    pub service_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<SearchErrorKind>,
    pub duration_ms: u64,
}

impl ToolCallResult {
    fn from_outcome(
        call: &ToolCall,
        outcome: Result<SearchResults, SearchError>,
        elapsed: Duration,
    ) -> Self {
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(found) => Self {
                tool_call_id: call.id.clone(),
                query: call.query.clone(),
                enhanced_query: Some(found.enhanced_query),
                results: found.results,
                success: true,
                service_available: found.status == SearchStatus::Available,
                error: None,
                error_kind: None,
                duration_ms,
            },
            Err(e) => Self::failed(call, &e, duration_ms),
        }
    }

    fn failed(call: &ToolCall, error: &SearchError, duration_ms: u64) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            query: call.query.clone(),
            enhanced_query: None,
            results: Vec::new(),
            success: false,
            service_available: true,
            error: Some(error.message.clone()),
            error_kind: Some(error.kind),
            duration_ms,
        }
    }

    /// How the audit record for this call is finalised
    pub fn outcome(&self) -> ToolCallOutcome {
        if self.success {
            let mut result_summary = format!("{} results", self.results.len());
            if !self.service_available {
                result_summary.push_str(" (search unavailable)");
            }
            ToolCallOutcome::Completed { result_summary }
        } else {
            let kind = self.error_kind.map_or("unknown", SearchErrorKind::as_str);
            let message = self.error.as_deref().unwrap_or_default();
            ToolCallOutcome::Failed {
                error: format!("{kind}: {message}"),
            }
        }
    }
}

/// Queries to run for one conversation turn
#[derive(Debug, Clone)]
pub struct SearchBatch<'a> {
    pub conversation_id: &'a str,
    pub queries: Vec<String>,
    /// Context snapshot used to enhance the queries
    pub context: ConversationContext,
}

/// Cancellation and overall deadline of the owning turn
#[derive(Debug, Clone, Default)]
pub struct TurnBudget {
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
}

pub struct ToolOrchestrator {
    gateway: Arc<SearchGateway>,
    permits: Arc<Semaphore>,
}

impl ToolOrchestrator {
    pub fn new(gateway: Arc<SearchGateway>, max_concurrent: usize) -> Self {
        Self {
            gateway,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn gateway(&self) -> &SearchGateway {
        &self.gateway
    }

    /// Run all queries of a batch concurrently.
    ///
    /// Returns one result per query in query order, after every branch has
    /// completed, failed, timed out, or been cut off by the turn budget.
    /// Every query gets a `ToolCall` record, finalised before returning.
    pub async fn run_searches<S: ToolCallStore + ?Sized>(
        &self,
        store: &S,
        batch: SearchBatch<'_>,
        budget: &TurnBudget,
    ) -> Result<Vec<ToolCallResult>, StoreError> {
        if batch.queries.is_empty() {
            return Ok(Vec::new());
        }

        let calls = record_pending(store, batch.conversation_id, &batch.queries).await?;

        let context = Arc::new(batch.context);
        let mut tasks = JoinSet::new();
        for (index, call) in calls.iter().enumerate() {
            let gateway = Arc::clone(&self.gateway);
            let permits = Arc::clone(&self.permits);
            let context = Arc::clone(&context);
            let cancel = budget.cancel.clone();
            let query = call.query.clone();

            tasks.spawn(async move {
                let started = Instant::now();
                let outcome = tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(SearchError::cancelled()),
                    permit = permits.acquire_owned() => match permit {
                        Ok(_permit) => gateway.search(&query, &context, &cancel).await,
                        Err(_) => Err(SearchError::provider("search pool closed")),
                    },
                };
                (index, outcome, started.elapsed())
            });
        }

        let mut slots: Vec<Option<ToolCallResult>> = calls.iter().map(|_| None).collect();
        loop {
            let next = match budget.deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(
                            conv_id = %batch.conversation_id,
                            pending = tasks.len(),
                            "Turn deadline reached with searches in flight"
                        );
                        break;
                    }
                },
                None => tasks.join_next().await,
            };
            let Some(joined) = next else { break };

            let (index, outcome, elapsed) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(conv_id = %batch.conversation_id, error = %e, "Search task failed");
                    continue;
                }
            };

            let result = ToolCallResult::from_outcome(&calls[index], outcome, elapsed);
            if !result.success {
                tracing::warn!(
                    conv_id = %batch.conversation_id,
                    query = %result.query,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Search failed"
                );
            }
            if let Err(e) = store.finish_tool_call(&result.tool_call_id, &result.outcome()).await {
                tasks.abort_all();
                slots[index] = Some(result);
                abandon_unfinished(store, &calls, &slots).await;
                return Err(e);
            }
            slots[index] = Some(result);
        }
        tasks.abort_all();

        // Branches cut off by the deadline, cancellation or a crashed task
        let cutoff = if budget.cancel.is_cancelled() {
            SearchError::cancelled()
        } else {
            SearchError::timeout("turn deadline reached before search completed")
        };
        let mut results = Vec::with_capacity(calls.len());
        for (call, slot) in calls.iter().zip(slots) {
            let result = match slot {
                Some(result) => result,
                None => {
                    let result = ToolCallResult::failed(call, &cutoff, 0);
                    store.finish_tool_call(&call.id, &result.outcome()).await?;
                    result
                }
            };
            results.push(result);
        }

        let successful = results.iter().filter(|r| r.success).count();
        tracing::info!(
            conv_id = %batch.conversation_id,
            total = results.len(),
            successful,
            failed = results.len() - successful,
            "Search batch finished"
        );
        Ok(results)
    }
}

async fn record_pending<S: ToolCallStore + ?Sized>(
    store: &S,
    conversation_id: &str,
    queries: &[String],
) -> Result<Vec<ToolCall>, StoreError> {
    let mut calls: Vec<ToolCall> = Vec::with_capacity(queries.len());
    for query in queries {
        let call = ToolCall::pending(conversation_id, query.as_str());
        if let Err(e) = store.append_tool_call(&call).await {
            let aborted = ToolCallOutcome::Failed {
                error: format!("batch aborted: {e}"),
            };
            for recorded in &calls {
                let _ = store.finish_tool_call(&recorded.id, &aborted).await;
            }
            return Err(e);
        }
        calls.push(call);
    }
    Ok(calls)
}

/// Best-effort finalisation after the store already failed once
async fn abandon_unfinished<S: ToolCallStore + ?Sized>(
    store: &S,
    calls: &[ToolCall],
    slots: &[Option<ToolCallResult>],
) {
    let aborted = ToolCallOutcome::Failed {
        error: "batch aborted: store failure".to_string(),
    };
    for (call, slot) in calls.iter().zip(slots) {
        if slot.is_none() {
            let _ = store.finish_tool_call(&call.id, &aborted).await;
        }
    }
}

// ============================================================================
// Result synthesis
// ============================================================================

/// Merged view of a batch, deduplicated by source URL
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchSummary {
    pub successful: usize,
    pub failed: usize,
    pub total_results: usize,
    pub results: Vec<ScoredResult>,
    pub errors: Vec<String>,
}

impl SearchSummary {
    /// Source URLs in first-seen order
    pub fn urls(&self) -> Vec<String> {
        self.results.iter().map(|r| r.url.clone()).collect()
    }
}

/// Merge a batch. When several queries return the same URL, the occurrence
/// from the earliest query wins.
pub fn summarize(results: &[ToolCallResult]) -> SearchSummary {
    let mut seen = HashSet::new();
    let mut summary = SearchSummary::default();
    for result in results {
        if result.success {
            summary.successful += 1;
        } else {
            summary.failed += 1;
            if let Some(error) = &result.error {
                summary.errors.push(format!("{}: {error}", result.query));
            }
        }
        for found in &result.results {
            if seen.insert(found.url.clone()) {
                summary.results.push(found.clone());
            }
        }
    }
    summary.total_results = summary.results.len();
    summary
}
