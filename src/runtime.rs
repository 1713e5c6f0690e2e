//! Conversation runtime
//!
//! Wires storage, search and the language model into the turn coordinator.

mod coordinator;
mod locks;
pub mod traits;
mod validation;

#[cfg(test)]
pub mod testing;

pub use coordinator::{
    ConversationCoordinator, ConversationView, GenerateInput, TurnError, TurnResult,
};
pub use traits::*;
pub use validation::ValidationError;

use crate::config::AppConfig;
use crate::db::Database;
use crate::llm::LlmService;
use crate::orchestrator::ToolOrchestrator;
use crate::search::SearchGateway;
use std::sync::Arc;

/// Type alias for production coordinator with concrete implementations
pub type ProductionCoordinator =
    ConversationCoordinator<DatabaseStore, ConfiguredLlmClient, LlmContentGenerator<ConfiguredLlmClient>>;

/// Assemble the production coordinator
pub fn production_coordinator(
    db: Database,
    gateway: SearchGateway,
    llm: Option<Arc<dyn LlmService>>,
    config: &AppConfig,
) -> ProductionCoordinator {
    let client = ConfiguredLlmClient::new(llm);
    ConversationCoordinator::new(
        DatabaseStore::new(db),
        client.clone(),
        LlmContentGenerator::new(client),
        ToolOrchestrator::new(Arc::new(gateway), config.max_concurrent_searches),
        config.turn,
    )
}
