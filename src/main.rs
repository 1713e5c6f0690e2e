//! Lit Music Mashup - staged conversations for educational music mashups
//!
//! Guides an educator through genre, educational and cultural questions,
//! researching along the way, until there is enough context to generate
//! teaching material.

mod api;
mod config;
mod db;
mod extractor;
mod llm;
mod orchestrator;
mod runtime;
mod search;
mod state_machine;
mod system_prompt;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use search::{SearchGateway, SearchProvider, TavilyProvider};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lit_mashup=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&config.db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path, "Opening database");
    let db = Database::open(&config.db_path)?;

    // Searches interrupted by a previous shutdown can never finish
    let interrupted = db.fail_interrupted_tool_calls()?;
    if interrupted > 0 {
        tracing::warn!(count = interrupted, "Marked interrupted tool calls as failed");
    }

    let provider: Option<Arc<dyn SearchProvider>> = match &config.tavily_api_key {
        Some(key) => Some(Arc::new(TavilyProvider::new(key.clone())?)),
        None => {
            tracing::warn!("TAVILY_API_KEY not set; web search unavailable");
            None
        }
    };
    let gateway = SearchGateway::new(provider, config.search);

    let llm = match llm::service_from_settings(&config.llm) {
        Ok(Some(service)) => {
            tracing::info!(model = %config.llm.model, base_url = %config.llm.base_url, "LLM configured");
            Some(service)
        }
        Ok(None) => {
            tracing::warn!("LLM disabled; using fallback replies");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client unavailable; using fallback replies");
            None
        }
    };

    let coordinator = runtime::production_coordinator(db, gateway, llm, &config);
    let app = create_router(AppState::new(coordinator));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Lit Mashup server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
