//! Tavily search provider

use super::{RawSearchResult, SearchError, SearchOptions, SearchProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const TAVILY_URL: &str = "https://api.tavily.com/search";

pub struct TavilyProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TavilyProvider {
    pub fn new(api_key: String) -> Result<Self, SearchError> {
        // Time bounds are enforced by the gateway
        let client = Client::builder()
            .build()
            .map_err(|e| SearchError::provider(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            base_url: TAVILY_URL.to_string(),
        })
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> SearchError {
        let message = serde_json::from_str::<TavilyErrorResponse>(body)
            .ok()
            .and_then(|e| e.detail.map(|d| d.error).or(e.error))
            .unwrap_or_else(|| body.to_string());
        match status.as_u16() {
            401 | 403 => SearchError::auth(format!("Authentication failed: {message}")),
            429 => SearchError::rate_limit(format!("Rate limited: {message}")),
            400 | 422 => SearchError::invalid_query(format!("Invalid request: {message}")),
            500..=599 => SearchError::provider(format!("Server error: {message}")),
            _ => SearchError::provider(format!("HTTP {status}: {message}")),
        }
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<RawSearchResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyErrorResponse {
    detail: Option<TavilyErrorDetail>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TavilyErrorDetail {
    error: String,
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<RawSearchResult>, SearchError> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: "basic",
            max_results: options.max_results,
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::timeout(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    SearchError::network(format!("Connection failed: {e}"))
                } else {
                    SearchError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let parsed: TavilyResponse = serde_json::from_str(&body)
            .map_err(|e| SearchError::provider(format!("Failed to parse response: {e}")))?;
        Ok(parsed.results)
    }

    fn name(&self) -> &str {
        "tavily"
    }
}
