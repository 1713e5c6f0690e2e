//! Runtime configuration
//!
//! Every tunable is read from the environment with a default, so the
//! service starts with no configuration at all (search unavailable, local
//! Ollama for replies).

use crate::search::{SearchConfig, MAX_RESULTS};
use std::time::Duration;

const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const OLLAMA_MODEL: &str = "llama3.1:8b-instruct";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-4o-mini";

/// Language-model settings
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub disabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout: Duration,
}

/// Per-turn limits applied by the coordinator
#[derive(Debug, Clone, Copy)]
pub struct TurnSettings {
    /// Overall budget for one turn; `None` means unbounded
    pub timeout: Option<Duration>,
    pub max_message_chars: usize,
    /// Messages of history handed to the model
    pub history_window: usize,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            timeout: None,
            max_message_chars: 4000,
            history_window: 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub port: u16,
    pub tavily_api_key: Option<String>,
    pub search: SearchConfig,
    pub max_concurrent_searches: usize,
    pub turn: TurnSettings,
    pub llm: LlmSettings,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| non_empty(key).and_then(|v| v.trim().parse::<u64>().ok());

        let db_path = non_empty("MASHUP_DB_PATH").unwrap_or_else(|| {
            let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
            format!("{home}/.lit-mashup/conversations.db")
        });

        let port = non_empty("MASHUP_PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(8000);

        let search = SearchConfig {
            timeout: Duration::from_secs(parsed("WEB_SEARCH_TIMEOUT_SECONDS").unwrap_or(10).max(1)),
            max_results: parsed("WEB_SEARCH_MAX_RESULTS")
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(MAX_RESULTS)
                .clamp(1, MAX_RESULTS),
        };

        let max_concurrent_searches = parsed("MAX_CONCURRENT_SEARCHES")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(3)
            .max(1);

        let defaults = TurnSettings::default();
        let turn = TurnSettings {
            timeout: parsed("TURN_TIMEOUT_SECONDS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            max_message_chars: parsed("MAX_MESSAGE_CHARS")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_message_chars),
            history_window: defaults.history_window,
        };

        let api_key = non_empty("OPENAI_API_KEY");
        let (default_url, default_model) = if api_key.is_some() {
            (OPENAI_BASE_URL, OPENAI_MODEL)
        } else {
            (OLLAMA_BASE_URL, OLLAMA_MODEL)
        };
        let llm = LlmSettings {
            disabled: non_empty("LLM_DISABLED")
                .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
            base_url: non_empty("LLM_BASE_URL").unwrap_or_else(|| default_url.to_string()),
            model: non_empty("LLM_MODEL").unwrap_or_else(|| default_model.to_string()),
            api_key,
            request_timeout: Duration::from_secs(120),
        };

        Self {
            db_path,
            port,
            tavily_api_key: non_empty("TAVILY_API_KEY"),
            search,
            max_concurrent_searches,
            turn,
            llm,
        }
    }
}
