//! HTTP API
//!
//! A thin axum surface over the conversation coordinator.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::ProductionCoordinator;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ProductionCoordinator>,
}

impl AppState {
    pub fn new(coordinator: ProductionCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }
}
