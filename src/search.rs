//! Search gateway
//!
//! Wraps a single external search call. The gateway enhances the query with
//! conversation context, bounds the call with a timeout, and turns raw
//! provider output into a short list of quality-scored results. It never
//! retries; that decision belongs to the caller.

mod quality;
mod query;
mod tavily;

pub use quality::{QualityTier, ScoredResult};
pub use query::{derive_queries, enhance_query};
pub use tavily::TavilyProvider;

use crate::state_machine::ConversationContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Hard cap on results returned per search
pub const MAX_RESULTS: usize = 3;

/// Search failure with classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct SearchError {
    pub kind: SearchErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchErrorKind {
    /// Empty or unusable query - not retryable
    InvalidQuery,
    /// Provider did not answer in time - retryable
    Timeout,
    /// Connection problems - retryable
    Network,
    /// Credentials rejected (401, 403) - not retryable
    Auth,
    /// Rate limited (429) - retryable with backoff
    RateLimit,
    /// Any other provider-side failure
    Provider,
    /// The owning turn was cancelled
    Cancelled,
}

impl SearchErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidQuery => "invalid_query",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::Provider => "provider",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(dead_code)] // Consulted by callers that choose to retry
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Network | Self::RateLimit)
    }
}

impl fmt::Display for SearchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SearchError {
    pub fn new(kind: SearchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::new(SearchErrorKind::InvalidQuery, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SearchErrorKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SearchErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(SearchErrorKind::Auth, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(SearchErrorKind::RateLimit, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(SearchErrorKind::Provider, message)
    }

    pub fn cancelled() -> Self {
        Self::new(SearchErrorKind::Cancelled, "search cancelled")
    }
}

/// Unprocessed result as returned by a provider
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawSearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub max_results: usize,
}

/// External search backend
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RawSearchResult>, SearchError>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: SearchProvider + ?Sized> SearchProvider for Arc<T> {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RawSearchResult>, SearchError> {
        (**self).search(query, options).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Whether the search backend could be consulted at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Available,
    /// No credentials configured; treated as "found nothing"
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub enhanced_query: String,
    pub status: SearchStatus,
    pub results: Vec<ScoredResult>,
}

/// Gateway settings
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    pub timeout: Duration,
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_results: MAX_RESULTS,
        }
    }
}

pub struct SearchGateway {
    provider: Option<Arc<dyn SearchProvider>>,
    timeout: Duration,
    max_results: usize,
}

impl SearchGateway {
    pub fn new(provider: Option<Arc<dyn SearchProvider>>, config: SearchConfig) -> Self {
        Self {
            provider,
            timeout: config.timeout,
            max_results: config.max_results.clamp(1, MAX_RESULTS),
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.name())
    }

    /// Run one search.
    ///
    /// An unconfigured gateway answers with an empty `Unavailable` result
    /// instead of an error. The provider call is bounded by the configured
    /// timeout and abandoned as soon as `cancel` fires.
    pub async fn search(
        &self,
        query: &str,
        context: &ConversationContext,
        cancel: &CancellationToken,
    ) -> Result<SearchResults, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::invalid_query("query must not be empty"));
        }
        let enhanced_query = enhance_query(query, context);

        let Some(provider) = &self.provider else {
            tracing::debug!(query = %query, "Search unavailable, returning empty results");
            return Ok(SearchResults {
                query: query.to_string(),
                enhanced_query,
                status: SearchStatus::Unavailable,
                results: Vec::new(),
            });
        };

        let options = SearchOptions {
            max_results: self.max_results,
        };
        let call = tokio::time::timeout(self.timeout, provider.search(&enhanced_query, &options));

        let raw = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SearchError::cancelled()),
            outcome = call => match outcome {
                Ok(result) => result?,
                Err(_) => {
                    return Err(SearchError::timeout(format!(
                        "no answer within {}s",
                        self.timeout.as_secs_f64()
                    )))
                }
            },
        };

        let fetched = raw.len();
        let results = quality::rank(raw, self.max_results);
        tracing::debug!(
            query = %query,
            provider = provider.name(),
            fetched,
            kept = results.len(),
            "Search completed"
        );

        Ok(SearchResults {
            query: query.to_string(),
            enhanced_query,
            status: SearchStatus::Available,
            results,
        })
    }
}
